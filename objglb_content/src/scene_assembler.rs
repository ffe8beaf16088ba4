use std::path::PathBuf;

use objglb_shared::aabb::AABB;

use crate::{
    geometry::{GeometryGroup, VisualMaterial},
    material_handler::ResolvedMaterials,
    observer::{Event, Observer},
    texture_resolver::TextureSet,
    Error, Result,
};

/// Groups that are ready to be exported. Every group carries a material and at least one
/// group has vertices.
#[derive(Debug, Clone)]
pub struct AssembledScene {
    pub groups: Vec<GeometryGroup>,
    pub textures: TextureSet,
}

impl AssembledScene {
    pub fn vertex_count(&self) -> usize {
        self.groups.iter().map(GeometryGroup::vertex_count).sum()
    }

    pub fn aabb(&self) -> AABB {
        let mut aabb = AABB::empty();
        for group in &self.groups {
            aabb.include_aabb(&group.aabb());
        }
        aabb
    }

    /// Materials of the groups in the order of first use. Materials are compared by value, so a
    /// material from the MTL file named `"default"` and the synthesized default stay apart.
    pub fn materials(&self) -> Vec<&VisualMaterial> {
        let mut materials: Vec<&VisualMaterial> = Vec::new();
        for material in self.groups.iter().filter_map(|group| group.material.as_ref()) {
            if !materials.contains(&material) {
                materials.push(material);
            }
        }
        materials
    }
}

/// Attaches materials to geometry groups and checks that there is something to export.
pub struct SceneAssembler {
    source_path: PathBuf,
}

impl SceneAssembler {
    /// `source_path` is only used to describe the source in errors.
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }

    /// Keeps the materials that the groups already carry and assigns the default material to
    /// all other groups. Fails with [`Error::EmptyGeometry`] when no group has vertices.
    pub fn assemble(
        &self,
        groups: Vec<GeometryGroup>,
        resolved: ResolvedMaterials,
        observer: &dyn Observer,
    ) -> Result<AssembledScene> {
        if groups.iter().all(|group| group.vertex_count() == 0) {
            return Err(Error::EmptyGeometry(self.source_path.clone()));
        }

        let groups = groups
            .into_iter()
            .map(|mut group| {
                match group.material.as_ref().map(|material| material.name.clone()) {
                    Some(material) => observer.notify(Event::ExistingMaterialKept {
                        group: group.name.clone(),
                        material,
                    }),
                    None => {
                        observer.notify(Event::DefaultMaterialAssigned { group: group.name.clone() });
                        group.material = Some(VisualMaterial::default_material());
                    }
                }
                group
            })
            .collect();

        Ok(AssembledScene {
            groups,
            textures: resolved.textures,
        })
    }
}
