use objglb_shared::{
    aabb::AABB,
    nalgebra::{Vector2, Vector3},
};

use crate::material_table::{MaterialProperties, DEFAULT_MATERIAL_NAME};

/// Material that is attached to a [`GeometryGroup`].
#[derive(Debug, Clone, PartialEq)]
pub struct VisualMaterial {
    pub name: String,
    pub properties: MaterialProperties,
}

impl VisualMaterial {
    pub fn new(name: impl Into<String>, properties: MaterialProperties) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    /// Opaque material with default properties named `"default"`.
    pub fn default_material() -> Self {
        Self::new(DEFAULT_MATERIAL_NAME, MaterialProperties::default())
    }
}

/// A single mesh with a triangle list.
///
/// `normals` and `texcoords` are either empty or have exactly one entry per position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryGroup {
    pub name: String,
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub texcoords: Vec<Vector2<f32>>,
    pub indices: Vec<u32>,
    pub material: Option<VisualMaterial>,
}

impl GeometryGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    pub fn has_texcoords(&self) -> bool {
        !self.texcoords.is_empty() && self.texcoords.len() == self.positions.len()
    }

    /// Iterates over the triangles as position triples. Incomplete triangles and indices out of
    /// range are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Vector3<f32>; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|triangle| {
            let position = |index: u32| self.positions.get(index as usize).copied();
            Some([position(triangle[0])?, position(triangle[1])?, position(triangle[2])?])
        })
    }

    pub fn aabb(&self) -> AABB {
        AABB::from_points(self.positions.iter())
    }
}
