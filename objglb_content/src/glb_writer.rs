//! Serialization of an [`AssembledScene`] into a binary glTF 2.0 container.
//!
//! The JSON chunk is built from the typed document model of [`gltf::json`]. The binary chunk
//! holds all vertex data, indices and the embedded PNG images. Every buffer view starts at a
//! multiple of four bytes.
//!
//! The material model of MTL is mapped onto the metallic-roughness model:
//!
//! * `Kd` and the transparency become the base color factor
//! * `Ns` becomes the roughness factor (the material is never metallic)
//! * the diffuse texture becomes the base color texture
//! * the normal texture becomes the normal texture
//!
//! Specular and ambient textures have no counterpart and are not exported.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Cursor, Write},
    path::Path,
};

use gltf::{
    binary::{Glb, Header},
    json::{
        self,
        accessor::{ComponentType, GenericComponentType, Type},
        buffer::Target,
        material::{AlphaMode, EmissiveFactor, NormalTexture, PbrBaseColorFactor, PbrMetallicRoughness, StrengthFactor},
        mesh::{Mode, Primitive, Semantic},
        texture::{MagFilter, MinFilter, WrappingMode},
        validation::{Checked, USize64},
        Index,
    },
};
use image::ImageOutputFormat;
use objglb_shared::{
    aabb::AABB,
    nalgebra::{Vector2, Vector3},
    serde_json::{self, json},
};

use crate::{
    geometry::{GeometryGroup, VisualMaterial},
    material_table::TextureSlot,
    scene_assembler::AssembledScene,
    texture_resolver::ResolvedTexture,
    Result,
};

const GENERATOR: &str = concat!("objglb ", env!("CARGO_PKG_VERSION"));

/// Size of the GLB header and of the two chunk headers.
const GLB_HEADER_SIZE: usize = 12;
const GLB_CHUNK_HEADER_SIZE: usize = 8;

pub struct GlbWriter {
    embed_textures: bool,
}

impl Default for GlbWriter {
    fn default() -> Self {
        Self { embed_textures: true }
    }
}

impl GlbWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// When disabled, materials only carry their color factors.
    pub fn with_embedded_textures(mut self, enabled: bool) -> Self {
        self.embed_textures = enabled;
        self
    }

    /// Writes the GLB file and returns its size in bytes.
    pub fn write(&self, scene: &AssembledScene, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let bytes = self.to_vec(scene)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(bytes.len() as u64)
    }

    pub fn to_vec(&self, scene: &AssembledScene) -> Result<Vec<u8>> {
        let (root, bin) = self.build_root(scene)?;
        let json = serde_json::to_vec(&root)?;
        let length = GLB_HEADER_SIZE
            + GLB_CHUNK_HEADER_SIZE
            + align_to_four(json.len())
            + if bin.is_empty() { 0 } else { GLB_CHUNK_HEADER_SIZE + align_to_four(bin.len()) };
        let glb = Glb {
            header: Header {
                magic: *b"glTF",
                version: 2,
                length: length as u32,
            },
            json: Cow::Owned(json),
            bin: (!bin.is_empty()).then_some(Cow::Owned(bin)),
        };
        let mut bytes = Vec::with_capacity(length);
        glb.to_writer(&mut bytes)?;
        Ok(bytes)
    }

    fn build_root(&self, scene: &AssembledScene) -> Result<(json::Root, Vec<u8>)> {
        let mut builder = RootBuilder::default();

        // Materials are compared by value because a material from the MTL file may have the same
        // name as the synthesized default material.
        let materials = scene.materials();
        let mut material_indices = Vec::with_capacity(materials.len());
        for material in &materials {
            material_indices.push(builder.push_material(material, scene, self.embed_textures)?);
        }

        for group in &scene.groups {
            let material = group
                .material
                .as_ref()
                .and_then(|material| materials.iter().position(|known| *known == material))
                .map(|position| material_indices[position]);
            builder.push_group(group, material);
        }

        Ok(builder.finish())
    }
}

#[derive(Default)]
struct RootBuilder {
    bin: Vec<u8>,
    root: json::Root,
    images: BTreeMap<(String, TextureSlot), Index<json::Image>>,
}

impl RootBuilder {
    fn finish(mut self) -> (json::Root, Vec<u8>) {
        self.root.asset = json::Asset {
            version: "2.0".to_owned(),
            generator: Some(GENERATOR.to_owned()),
            ..Default::default()
        };
        self.root.scenes = vec![json::Scene {
            nodes: (0..self.root.nodes.len() as u32).map(Index::new).collect(),
            name: None,
            extensions: None,
            extras: Default::default(),
        }];
        self.root.scene = Some(Index::new(0));
        if !self.bin.is_empty() {
            pad_to_four(&mut self.bin);
            self.root.buffers.push(json::Buffer {
                byte_length: USize64(self.bin.len() as u64),
                name: None,
                uri: None,
                extensions: None,
                extras: Default::default(),
            });
        }
        (self.root, self.bin)
    }

    fn push_view(&mut self, bytes: &[u8], target: Option<Target>) -> Index<json::buffer::View> {
        pad_to_four(&mut self.bin);
        let byte_offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.root.buffer_views.push(json::buffer::View {
            buffer: Index::new(0),
            byte_length: USize64(bytes.len() as u64),
            byte_offset: Some(USize64(byte_offset as u64)),
            byte_stride: None,
            name: None,
            target: target.map(Checked::Valid),
            extensions: None,
            extras: Default::default(),
        });
        Index::new(self.root.buffer_views.len() as u32 - 1)
    }

    fn push_accessor(
        &mut self,
        bytes: &[u8],
        target: Target,
        component_type: ComponentType,
        kind: Type,
        count: usize,
        bounds: Option<AABB>,
    ) -> Index<json::Accessor> {
        let buffer_view = self.push_view(bytes, Some(target));
        let (min, max) = match bounds {
            Some(aabb) => (
                Some(json!([aabb.min.x, aabb.min.y, aabb.min.z])),
                Some(json!([aabb.max.x, aabb.max.y, aabb.max.z])),
            ),
            None => (None, None),
        };
        self.root.accessors.push(json::Accessor {
            buffer_view: Some(buffer_view),
            byte_offset: None,
            count: USize64(count as u64),
            component_type: Checked::Valid(GenericComponentType(component_type)),
            extensions: None,
            extras: Default::default(),
            type_: Checked::Valid(kind),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        });
        Index::new(self.root.accessors.len() as u32 - 1)
    }

    /// Positions carry their bounds, which glTF requires for the `POSITION` attribute.
    fn push_vec3(&mut self, values: &[Vector3<f32>], with_bounds: bool) -> Index<json::Accessor> {
        let bytes = values
            .iter()
            .flat_map(|value| value.iter().flat_map(|component| component.to_le_bytes()))
            .collect::<Vec<u8>>();
        let bounds = with_bounds.then(|| AABB::from_points(values));
        self.push_accessor(&bytes, Target::ArrayBuffer, ComponentType::F32, Type::Vec3, values.len(), bounds)
    }

    /// OBJ places the origin of the texture space in the lower left corner, glTF in the upper left.
    fn push_texcoords(&mut self, values: &[Vector2<f32>]) -> Index<json::Accessor> {
        let bytes = values
            .iter()
            .flat_map(|value| [value.x, 1.0 - value.y])
            .flat_map(f32::to_le_bytes)
            .collect::<Vec<u8>>();
        self.push_accessor(&bytes, Target::ArrayBuffer, ComponentType::F32, Type::Vec2, values.len(), None)
    }

    fn push_indices(&mut self, indices: &[u32]) -> Index<json::Accessor> {
        let bytes = indices.iter().flat_map(|index| index.to_le_bytes()).collect::<Vec<u8>>();
        self.push_accessor(
            &bytes,
            Target::ElementArrayBuffer,
            ComponentType::U32,
            Type::Scalar,
            indices.len(),
            None,
        )
    }

    /// Groups without a valid triangle are not exported.
    fn push_group(&mut self, group: &GeometryGroup, material: Option<Index<json::Material>>) {
        let vertex_count = group.vertex_count() as u32;
        let indices = group
            .indices
            .chunks_exact(3)
            .filter(|triangle| triangle.iter().all(|index| *index < vertex_count))
            .flatten()
            .copied()
            .collect::<Vec<u32>>();
        if indices.is_empty() {
            return;
        }

        let mut attributes = BTreeMap::new();
        attributes.insert(Checked::Valid(Semantic::Positions), self.push_vec3(&group.positions, true));
        if group.has_normals() {
            attributes.insert(Checked::Valid(Semantic::Normals), self.push_vec3(&group.normals, false));
        }
        if group.has_texcoords() {
            attributes.insert(Checked::Valid(Semantic::TexCoords(0)), self.push_texcoords(&group.texcoords));
        }
        let indices = self.push_indices(&indices);

        self.root.meshes.push(json::Mesh {
            name: Some(group.name.clone()),
            primitives: vec![Primitive {
                attributes,
                indices: Some(indices),
                material,
                mode: Checked::Valid(Mode::Triangles),
                targets: None,
                extensions: None,
                extras: Default::default(),
            }],
            weights: None,
            extensions: None,
            extras: Default::default(),
        });
        self.root.nodes.push(json::Node {
            name: Some(group.name.clone()),
            mesh: Some(Index::new(self.root.meshes.len() as u32 - 1)),
            ..Default::default()
        });
    }

    fn push_material(
        &mut self,
        material: &VisualMaterial,
        scene: &AssembledScene,
        embed_textures: bool,
    ) -> Result<Index<json::Material>> {
        let properties = &material.properties;
        let alpha = properties.transparency.clamp(0.0, 1.0);
        let diffuse = properties.diffuse.map(|channel| channel.clamp(0.0, 1.0));

        // Only slots that the material references itself are looked up in the texture set.
        let texture = |builder: &mut Self, slot: TextureSlot| -> Result<Option<Index<json::Texture>>> {
            if !embed_textures || !properties.textures.contains_key(&slot) {
                return Ok(None);
            }
            match scene.textures.get(&material.name, slot) {
                Some(resolved) => Ok(Some(builder.push_texture(resolved)?)),
                None => Ok(None),
            }
        };
        let base_color_texture = texture(self, TextureSlot::Diffuse)?.map(|index| json::texture::Info {
            index,
            tex_coord: 0,
            extensions: None,
            extras: Default::default(),
        });
        let normal_texture = texture(self, TextureSlot::Normal)?.map(|index| NormalTexture {
            index,
            scale: 1.0,
            tex_coord: 0,
            extensions: None,
            extras: Default::default(),
        });

        self.root.materials.push(json::Material {
            alpha_cutoff: None,
            alpha_mode: Checked::Valid(if alpha < 1.0 { AlphaMode::Blend } else { AlphaMode::Opaque }),
            double_sided: false,
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: PbrBaseColorFactor([diffuse.x, diffuse.y, diffuse.z, alpha]),
                base_color_texture,
                metallic_factor: StrengthFactor(0.0),
                roughness_factor: StrengthFactor(roughness_from_shininess(properties.shininess)),
                metallic_roughness_texture: None,
                extensions: None,
                extras: Default::default(),
            },
            normal_texture,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: EmissiveFactor([0.0, 0.0, 0.0]),
            name: Some(material.name.clone()),
            extensions: None,
            extras: Default::default(),
        });
        Ok(Index::new(self.root.materials.len() as u32 - 1))
    }

    fn push_texture(&mut self, resolved: &ResolvedTexture) -> Result<Index<json::Texture>> {
        let key = (resolved.material.clone(), resolved.slot);
        let source = match self.images.get(&key) {
            Some(image) => *image,
            None => {
                let mut png = Vec::new();
                resolved.image.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
                let buffer_view = self.push_view(&png, None);
                self.root.images.push(json::Image {
                    buffer_view: Some(buffer_view),
                    mime_type: Some(json::image::MimeType("image/png".to_owned())),
                    name: None,
                    uri: None,
                    extensions: None,
                    extras: Default::default(),
                });
                let image = Index::new(self.root.images.len() as u32 - 1);
                self.images.insert(key, image);
                image
            }
        };
        if self.root.samplers.is_empty() {
            self.root.samplers.push(json::texture::Sampler {
                mag_filter: Some(Checked::Valid(MagFilter::Linear)),
                min_filter: Some(Checked::Valid(MinFilter::LinearMipmapLinear)),
                wrap_s: Checked::Valid(WrappingMode::Repeat),
                wrap_t: Checked::Valid(WrappingMode::Repeat),
                ..Default::default()
            });
        }
        self.root.textures.push(json::Texture {
            sampler: Some(Index::new(0)),
            source,
            name: None,
            extensions: None,
            extras: Default::default(),
        });
        Ok(Index::new(self.root.textures.len() as u32 - 1))
    }
}

/// Maps the Phong exponent onto a roughness in [0, 1].
fn roughness_from_shininess(shininess: f32) -> f32 {
    let shininess = shininess.max(0.0);
    (2.0 / (shininess + 2.0)).powf(0.25).clamp(0.0, 1.0)
}

fn align_to_four(length: usize) -> usize {
    (length + 3) & !3
}

fn pad_to_four(bytes: &mut Vec<u8>) {
    bytes.resize(align_to_four(bytes.len()), 0);
}
