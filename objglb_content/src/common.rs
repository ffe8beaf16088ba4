use std::{
    fmt, io,
    path::{Path, PathBuf},
    result,
};

use objglb_shared::{serde_json, serde_yaml, thiserror};

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Output file already exists: {0}. Enable overwrite to replace it.")]
    AlreadyExists(PathBuf),
    #[error("No valid geometry found in {0}")]
    EmptyGeometry(PathBuf),
    #[error("Failed to parse the OBJ file: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("IoError: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to encode or decode an image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to write the GLB container: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("Failed to serialize the glTF document: {0}")]
    FailedSerialization(#[from] serde_json::Error),
    #[error("Failed to read the configuration: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Coarse classification of an [`Error`] so that callers can tally failures without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureCategory {
    NotFound,
    InvalidFormat,
    AlreadyExists,
    EmptyGeometry,
    Io,
    Export,
    Config,
}

impl Error {
    pub fn category(&self) -> FailureCategory {
        match self {
            Error::NotFound(_) => FailureCategory::NotFound,
            Error::InvalidFormat(_) | Error::Obj(_) => FailureCategory::InvalidFormat,
            Error::AlreadyExists(_) => FailureCategory::AlreadyExists,
            Error::EmptyGeometry(_) => FailureCategory::EmptyGeometry,
            Error::IoError(_) => FailureCategory::Io,
            Error::Image(_) | Error::Gltf(_) | Error::FailedSerialization(_) => FailureCategory::Export,
            Error::Config(_) => FailureCategory::Config,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::NotFound => "NotFound",
            FailureCategory::InvalidFormat => "InvalidFormat",
            FailureCategory::AlreadyExists => "AlreadyExists",
            FailureCategory::EmptyGeometry => "EmptyGeometry",
            FailureCategory::Io => "Io",
            FailureCategory::Export => "Export",
            FailureCategory::Config => "Config",
        };
        f.write_str(name)
    }
}

/// Returns the lowercase extension of the path or an empty string when there is none.
pub(crate) fn extract_extension_from_path(path: &Path) -> String {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_lowercase())
        .unwrap_or_default()
}

pub(crate) fn extract_file_stem_from_path(path: &Path) -> Result<String> {
    Ok(path
        .file_stem()
        .and_then(|file_stem| file_stem.to_str())
        .ok_or(Error::InvalidFormat(format!("Path has no file name: {}", path.display())))?
        .to_owned())
}

/// Directory that contains the given file. Paths without a parent resolve to the current directory.
pub(crate) fn parent_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
        _ => PathBuf::from("."),
    }
}

/// Splits a line of a Wavefront file into the command and the trimmed remainder.
pub(crate) fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((command, value)) => (command, value.trim()),
        None => (line, ""),
    }
}
