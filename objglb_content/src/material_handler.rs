use std::path::{Path, PathBuf};

use crate::{
    common::parent_directory,
    material_table::MaterialTable,
    observer::{Event, Observer},
    texture_resolver::{TextureResolver, TextureSet},
};

/// Materials of a source file together with the textures that could be decoded.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMaterials {
    pub materials: MaterialTable,
    pub textures: TextureSet,
}

impl ResolvedMaterials {
    /// Only the `"default"` material and no textures.
    pub fn default_only() -> Self {
        Self {
            materials: MaterialTable::with_default_material(),
            textures: TextureSet::default(),
        }
    }
}

/// Finds the MTL file of an OBJ file and resolves its materials and textures.
pub struct MaterialHandler {
    source_path: PathBuf,
    material_libraries: Vec<String>,
    recursive_texture_search: bool,
}

impl MaterialHandler {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            material_libraries: Vec::new(),
            recursive_texture_search: false,
        }
    }

    /// Names of the `mtllib` declarations of the source file. They are consulted when there
    /// is no MTL file with the same stem as the source file.
    pub fn with_material_libraries(mut self, material_libraries: impl IntoIterator<Item = String>) -> Self {
        self.material_libraries = material_libraries.into_iter().collect();
        self
    }

    pub fn with_recursive_texture_search(mut self, enabled: bool) -> Self {
        self.recursive_texture_search = enabled;
        self
    }

    /// The MTL file next to the source file that has the same stem.
    pub fn sibling_material_path(&self) -> PathBuf {
        self.source_path.with_extension("mtl")
    }

    /// Returns the MTL file that will be parsed, if there is any.
    pub fn material_path(&self) -> Option<PathBuf> {
        let sibling = self.sibling_material_path();
        if sibling.is_file() {
            return Some(sibling);
        }
        let source_dir = parent_directory(&self.source_path);
        self.material_libraries
            .iter()
            .map(|name| source_dir.join(name.trim()))
            .find(|path| path.is_file())
    }

    /// Never fails. When no materials can be found, the result contains exactly the
    /// `"default"` material and no textures.
    pub fn process_materials(&self, observer: &dyn Observer) -> ResolvedMaterials {
        match self.material_path() {
            Some(path) => {
                let materials = MaterialTable::parse(&path, observer);
                if !materials.is_empty() {
                    let textures = self.texture_resolver().load_all(&materials, observer);
                    return ResolvedMaterials { materials, textures };
                }
            }
            None => observer.notify(Event::MaterialFileMissing(self.sibling_material_path())),
        }
        observer.notify(Event::DefaultMaterialUsed);
        ResolvedMaterials::default_only()
    }

    fn texture_resolver(&self) -> TextureResolver {
        TextureResolver::new(parent_directory(&self.source_path)).with_recursive_search(self.recursive_texture_search)
    }
}

/// Shorthand for [`MaterialHandler::process_materials`] without `mtllib` declarations.
pub fn process_materials(source_path: impl AsRef<Path>, observer: &dyn Observer) -> ResolvedMaterials {
    MaterialHandler::new(source_path.as_ref()).process_materials(observer)
}
