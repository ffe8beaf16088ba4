//! Loading of Wavefront OBJ files into [`GeometryGroup`]s.
//!
//! Parsing is done by `tobj`. Polygons are triangulated and every distinct combination of
//! position, texture coordinate and normal index becomes one vertex of the group. A new group
//! starts at every `o`, `g` and at every `usemtl` that changes the material.

use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
};

use objglb_shared::nalgebra::{Vector2, Vector3};

use crate::{
    common::{extract_file_stem_from_path, parent_directory},
    geometry::{GeometryGroup, VisualMaterial},
    material_table::MaterialTable,
    Result,
};

/// Name of groups that appear before any `o` or `g` directive when no better name is known.
pub const DEFAULT_GROUP_NAME: &str = "mesh";

/// Names that `tobj` gives to geometry without an `o` or `g` name.
const UNNAMED_MODEL_NAMES: [&str; 2] = ["unnamed_object", "unnamed"];

/// A group of the OBJ file together with the material name from its `usemtl` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjGroup {
    pub geometry: GeometryGroup,
    /// Only set when the material was found in one of the `mtllib` files.
    pub material_name: Option<String>,
}

/// Parsed content of an OBJ file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjDocument {
    /// File names from the `mtllib` directives in the order in which they appear.
    pub material_libraries: Vec<String>,
    /// Groups that contain at least one triangle.
    pub groups: Vec<ObjGroup>,
}

impl ObjDocument {
    /// Loads the OBJ file at `path`. Geometry before the first `o` or `g` is named after the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let default_name = extract_file_stem_from_path(path).unwrap_or_else(|_| DEFAULT_GROUP_NAME.to_owned());
        Self::parse(&String::from_utf8_lossy(&bytes), &default_name, parent_directory(path))
    }

    /// Parses the contents of an OBJ file. `mtllib` files are loaded from `material_dir`.
    pub fn parse(contents: &str, default_name: &str, material_dir: impl Into<PathBuf>) -> Result<Self> {
        let material_dir = material_dir.into();
        let material_libraries = RefCell::new(Vec::new());
        let material_names = RefCell::new(Vec::new());
        let load_options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };

        // `tobj` appends the materials of every library in load order, so `material_id`s index into
        // the names collected here even when one of the libraries fails to load.
        let mut reader = contents.as_bytes();
        let (models, _) = tobj::load_obj_buf(&mut reader, &load_options, |library| {
            material_libraries
                .borrow_mut()
                .push(library.to_string_lossy().into_owned());
            let loaded = tobj::load_mtl(material_dir.join(library))?;
            material_names
                .borrow_mut()
                .extend(loaded.0.iter().map(|material| material.name.clone()));
            Ok(loaded)
        })?;

        let material_names = material_names.into_inner();
        let groups = models
            .into_iter()
            .filter_map(|model| group_from_model(model, default_name, &material_names))
            .collect();

        Ok(Self {
            material_libraries: material_libraries.into_inner(),
            groups,
        })
    }

    /// Converts the groups into [`GeometryGroup`]s and attaches the materials from `materials`
    /// that are named by `usemtl`. Groups with unknown material names stay without material.
    pub fn into_geometry_groups(self, materials: &MaterialTable) -> Vec<GeometryGroup> {
        self.groups
            .into_iter()
            .map(|group| {
                let mut geometry = group.geometry;
                geometry.material = group
                    .material_name
                    .and_then(|name| materials.get(&name).map(|properties| VisualMaterial::new(name.clone(), properties.clone())));
                geometry
            })
            .collect()
    }
}

fn group_from_model(model: tobj::Model, default_name: &str, material_names: &[String]) -> Option<ObjGroup> {
    let mesh = model.mesh;
    if mesh.indices.is_empty() {
        return None;
    }
    let name = if model.name.is_empty() || UNNAMED_MODEL_NAMES.contains(&model.name.as_str()) {
        default_name.to_owned()
    } else {
        model.name
    };

    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|position| Vector3::new(position[0], position[1], position[2]))
        .collect::<Vec<_>>();
    let normals = complete_stream(&mesh.normals, 3, positions.len(), |normal| {
        Vector3::new(normal[0], normal[1], normal[2])
    });
    let texcoords = complete_stream(&mesh.texcoords, 2, positions.len(), |texcoord| {
        Vector2::new(texcoord[0], texcoord[1])
    });

    Some(ObjGroup {
        geometry: GeometryGroup {
            positions,
            normals,
            texcoords,
            indices: mesh.indices,
            ..GeometryGroup::new(name)
        },
        material_name: mesh.material_id.and_then(|id| material_names.get(id)).cloned(),
    })
}

/// `tobj` skips attributes that a face corner doesn't reference. Streams that don't cover every
/// vertex can't be used and are dropped.
fn complete_stream<T>(values: &[f32], width: usize, vertex_count: usize, convert: impl Fn(&[f32]) -> T) -> Vec<T> {
    if values.len() != width * vertex_count {
        return Vec::new();
    }
    values.chunks_exact(width).map(convert).collect()
}
