//! # Overview
//!
//! Crate for [converting](convert_file) Wavefront OBJ models into binary glTF (GLB) files.
//!
//! A model consists of the OBJ file with the geometry and an optional MTL file with the
//! materials. The MTL file is expected next to the OBJ file with the same stem or is named by a
//! `mtllib` directive. Textures referenced by the materials are searched in a fixed list of
//! locations and embedded into the GLB file as PNG images.
//!
//! ## Example:
//!
//! **Source Directory:**
//!
//! ```text
//! furniture/
//! ├─ chair.obj
//! ├─ chair.mtl
//! ├─ wood.png
//! ├─ lamps/
//! │  ├─ desk_lamp.obj
//! ```
//!
//! **Target Directory** (recursive batch conversion with thumbnails):
//!
//! ```text
//! glb/
//! ├─ chair.glb
//! ├─ chair.png
//! ├─ lamps/
//! │  ├─ desk_lamp.glb
//! │  ├─ desk_lamp.png
//! ```
//!
//! # Components
//!
//! The conversion runs through the following steps:
//!
//! 1. [`ObjDocument`] reads the geometry groups with `tobj` together with their `usemtl` material names and the `mtllib` files.
//! 2. [`MaterialHandler`] parses the [`MaterialTable`] and decodes the textures with the
//!    [`TextureResolver`]. Without materials the result contains only the default material.
//! 3. [`SceneAssembler`] attaches a material to every group.
//! 4. [`GlbWriter`] serializes the [`AssembledScene`].
//!
//! Nothing is logged directly. Every step reports [`Event`]s to an [`Observer`] that is passed
//! in by the caller.

mod common;

pub mod color;
pub mod config;
pub mod conversion;
pub mod geometry;
pub mod glb_writer;
pub mod material_handler;
pub mod material_table;
pub mod obj_loader;
pub mod observer;
pub mod preview;
pub mod scene_assembler;
pub mod texture_resolver;
pub mod thumbnail;

pub use common::{Error, FailureCategory, Result};
pub use config::{ConversionConfig, ThumbnailSize};
pub use conversion::{
    convert_batch, convert_file, find_obj_files, format_file_size, output_path_for, validate_input_file, validate_output_file,
    BatchReport, ConversionOutcome,
};
pub use geometry::{GeometryGroup, VisualMaterial};
pub use glb_writer::GlbWriter;
pub use material_handler::{MaterialHandler, ResolvedMaterials};
pub use material_table::{MaterialProperties, MaterialTable, TextureSlot};
pub use obj_loader::ObjDocument;
pub use observer::{Event, LogObserver, Observer};
pub use scene_assembler::{AssembledScene, SceneAssembler};
pub use texture_resolver::{ResolvedTexture, TextureResolver, TextureSet};
