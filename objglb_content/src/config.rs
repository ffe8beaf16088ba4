use std::{fmt, fs::File, path::Path, str::FromStr};

use objglb_shared::serde_yaml;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Width and height of a thumbnail in pixels. Written as `WIDTHxHEIGHT`, e.g. `512x512`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self::new(512, 512)
    }
}

impl FromStr for ThumbnailSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidFormat(format!("Invalid thumbnail size '{s}'. Use WIDTHxHEIGHT (e.g., 512x512)"));
        let (width, height) = s.trim().split_once(|c: char| c == 'x' || c == 'X').ok_or_else(invalid)?;
        let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self::new(width, height))
    }
}

impl TryFrom<String> for ThumbnailSize {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ThumbnailSize> for String {
    fn from(value: ThumbnailSize) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ThumbnailSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Options of a conversion. Missing fields in a configuration file take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Replace existing output files.
    pub overwrite: bool,
    /// Write a PNG thumbnail next to every GLB file.
    pub thumbnail: bool,
    pub thumbnail_size: ThumbnailSize,
    /// Write an HTML preview next to every GLB file.
    pub preview: bool,
    /// Search sub-directories in batch conversions.
    pub recursive: bool,
    /// Search the directory tree of the OBJ file for textures that aren't found otherwise.
    pub recursive_texture_search: bool,
    pub embed_textures: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            thumbnail: false,
            thumbnail_size: ThumbnailSize::default(),
            preview: false,
            recursive: false,
            recursive_texture_search: false,
            embed_textures: true,
        }
    }
}

impl ConversionConfig {
    /// Import a configuration from the YAML file at `path`.
    pub fn import(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_owned()));
        }
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use objglb_shared::indoc::indoc;
    use objglb_test::write_text_file;
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn thumbnail_size_parsing() {
        assert_eq!("256x128".parse::<ThumbnailSize>().unwrap(), ThumbnailSize::new(256, 128));
        assert_eq!("64X64".parse::<ThumbnailSize>().unwrap(), ThumbnailSize::new(64, 64));
        assert_eq!(ThumbnailSize::new(32, 16).to_string(), "32x16");
        for invalid in ["", "512", "0x512", "512x", "axb", "-1x5", "512x512x512"] {
            assert!(invalid.parse::<ThumbnailSize>().is_err(), "'{invalid}' was accepted");
        }
    }

    #[test]
    fn defaults() {
        let config = ConversionConfig::default();
        assert!(!config.overwrite);
        assert!(config.embed_textures);
        assert_eq!(config.thumbnail_size, ThumbnailSize::new(512, 512));
    }

    #[test]
    fn import_partial_file() {
        let root = TempDir::new("config").unwrap();
        let path = write_text_file(
            root.path().join("objglb.yaml"),
            indoc! {"
                overwrite: true
                thumbnail_size: 128x64
            "},
        );
        let config = ConversionConfig::import(path).unwrap();
        assert!(config.overwrite);
        assert_eq!(config.thumbnail_size, ThumbnailSize::new(128, 64));
        assert!(!config.preview);
        assert!(config.embed_textures);
    }

    #[test]
    fn import_invalid_file() {
        let root = TempDir::new("config").unwrap();
        let path = write_text_file(root.path().join("objglb.yaml"), "thumbnail_size: huge\n");
        assert!(matches!(ConversionConfig::import(path), Err(Error::Config(_))));
        assert!(matches!(ConversionConfig::import(root.path().join("missing.yaml")), Err(Error::NotFound(_))));
    }
}
