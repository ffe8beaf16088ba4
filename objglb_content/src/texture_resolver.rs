//! Resolution of texture references from MTL files.
//!
//! MTL files are often exported on another machine and contain paths that don't exist
//! locally. A reference is therefore tried at a fixed list of candidate locations:
//!
//! 1. the reference as written (absolute or relative to the working directory)
//! 2. the reference relative to the directory of the source file
//! 3. only the file name of the reference inside the directory of the source file
//!
//! The first candidate that exists and decodes wins. When enabled, the directory tree of the
//! source file is searched for the file name as a last resort.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use image::{io::Reader as ImageReader, DynamicImage};
use objglb_shared::walkdir::WalkDir;

use crate::{
    material_table::{MaterialTable, TextureSlot},
    observer::{Event, Observer},
};

/// Maximum directory depth of the recursive texture search.
const RECURSIVE_SEARCH_MAX_DEPTH: usize = 8;

/// Decoded texture that belongs to a slot of a material.
#[derive(Debug, Clone)]
pub struct ResolvedTexture {
    pub material: String,
    pub slot: TextureSlot,
    /// The file that the image was decoded from.
    pub path: PathBuf,
    /// Either RGB8 or RGBA8.
    pub image: DynamicImage,
}

/// Resolved textures by material name and slot. Slots that couldn't be resolved are absent.
#[derive(Debug, Clone, Default)]
pub struct TextureSet {
    textures: BTreeMap<String, BTreeMap<TextureSlot, ResolvedTexture>>,
}

impl TextureSet {
    pub fn insert(&mut self, texture: ResolvedTexture) {
        self.textures
            .entry(texture.material.clone())
            .or_default()
            .insert(texture.slot, texture);
    }

    pub fn get(&self, material: &str, slot: TextureSlot) -> Option<&ResolvedTexture> {
        self.textures.get(material).and_then(|slots| slots.get(&slot))
    }

    /// Returns the resolved slots of the given material.
    pub fn material(&self, material: &str) -> Option<&BTreeMap<TextureSlot, ResolvedTexture>> {
        self.textures.get(material)
    }

    /// Number of materials that have at least one resolved texture.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTexture> {
        self.textures.values().flat_map(|slots| slots.values())
    }
}

pub struct TextureResolver {
    source_dir: PathBuf,
    recursive_search: bool,
}

impl TextureResolver {
    /// Creates a [`TextureResolver`] for a source file located in `source_dir`.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            recursive_search: false,
        }
    }

    /// Enables the recursive search in the directory tree of the source file.
    pub fn with_recursive_search(mut self, enabled: bool) -> Self {
        self.recursive_search = enabled;
        self
    }

    /// Returns the candidate paths for `reference` in the order in which they are tried.
    pub fn candidates(&self, reference: &str) -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(reference), self.source_dir.join(reference)];
        if let Some(file_name) = file_name_of_reference(reference) {
            candidates.push(self.source_dir.join(file_name));
        }
        candidates.dedup();
        candidates
    }

    /// Loads the image for the given `reference` from the first candidate that decodes.
    pub fn load_texture(&self, reference: &str, observer: &dyn Observer) -> Option<(PathBuf, DynamicImage)> {
        let candidates = self.candidates(reference);
        let found = candidates
            .into_iter()
            .find_map(|candidate| try_decode(candidate, observer))
            .or_else(|| self.search_recursively(reference, observer));
        if found.is_none() {
            observer.notify(Event::TextureNotFound {
                reference: reference.to_owned(),
            });
        }
        found
    }

    /// Loads the textures of all materials in the `materials` table.
    pub fn load_all(&self, materials: &MaterialTable, observer: &dyn Observer) -> TextureSet {
        let mut texture_set = TextureSet::default();
        for (material, properties) in materials.iter() {
            for (slot, reference) in &properties.textures {
                let Some((path, image)) = self.load_texture(reference, observer) else {
                    continue;
                };
                observer.notify(Event::TextureLoaded {
                    material: material.to_owned(),
                    slot: *slot,
                    path: path.clone(),
                });
                texture_set.insert(ResolvedTexture {
                    material: material.to_owned(),
                    slot: *slot,
                    path,
                    image,
                });
            }
        }
        texture_set
    }

    fn search_recursively(&self, reference: &str, observer: &dyn Observer) -> Option<(PathBuf, DynamicImage)> {
        if !self.recursive_search {
            return None;
        }
        let file_name = file_name_of_reference(reference)?;
        WalkDir::new(&self.source_dir)
            .max_depth(RECURSIVE_SEARCH_MAX_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && entry.file_name().to_str() == Some(file_name))
            .find_map(|entry| try_decode(entry.into_path(), observer))
    }
}

/// The last component of a reference. Both separators are accepted because MTL files
/// are moved between platforms.
fn file_name_of_reference(reference: &str) -> Option<&str> {
    reference
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .map(str::trim)
        .filter(|file_name| !file_name.is_empty())
}

fn try_decode(candidate: PathBuf, observer: &dyn Observer) -> Option<(PathBuf, DynamicImage)> {
    if !candidate.is_file() {
        return None;
    }
    match decode(&candidate) {
        Ok(image) => Some((candidate, normalize_color_mode(image))),
        Err(message) => {
            observer.notify(Event::TextureCandidateFailed { candidate, message });
            None
        }
    }
}

fn decode(path: &Path) -> Result<DynamicImage, String> {
    ImageReader::open(path)
        .map_err(|err| err.to_string())?
        .with_guessed_format()
        .map_err(|err| err.to_string())?
        .decode()
        .map_err(|err| err.to_string())
}

/// Keeps RGB8 and RGBA8 images. Color images with alpha become RGBA8, everything else RGB8.
pub fn normalize_color_mode(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        other if other.color().has_color() && other.color().has_alpha() => DynamicImage::ImageRgba8(other.into_rgba8()),
        other => DynamicImage::ImageRgb8(other.into_rgb8()),
    }
}
