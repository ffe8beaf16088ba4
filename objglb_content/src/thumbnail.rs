//! PNG thumbnails for converted models.
//!
//! A thumbnail is taken from the first source that works:
//!
//! 1. An image with the same stem as the OBJ file (`.png`, `.jpg` or `.jpeg` in any case) in the
//!    directory of the OBJ file, in its parent directory or anywhere below the parent directory.
//!    The image is scaled down to fit and centered on a white background.
//! 2. A software rendering of the scene from a fixed three-quarter view with flat shading.
//! 3. A light grey placeholder.

use std::path::{Path, PathBuf};

use image::{imageops, imageops::FilterType, DynamicImage, ImageFormat, Rgb, RgbImage};
use objglb_shared::{
    nalgebra::{Vector2, Vector3},
    walkdir::WalkDir,
};

use crate::{common::parent_directory, config::ThumbnailSize, scene_assembler::AssembledScene, Result};

const MATCHING_IMAGE_EXTENSIONS: [&str; 6] = ["png", "PNG", "jpg", "JPG", "jpeg", "JPEG"];
const MATCHING_IMAGE_SEARCH_DEPTH: usize = 8;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const PLACEHOLDER: Rgb<u8> = Rgb([240, 240, 240]);

/// Direction from the center of the scene towards the camera.
const VIEW_DIRECTION: [f32; 3] = [1.0, 0.8, 1.4];
/// Share of the shorter image side that the scene covers.
const FILL_FACTOR: f32 = 0.85;
const AMBIENT_LIGHT: f32 = 0.3;

/// Where the pixels of a thumbnail came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailSource {
    MatchingImage(PathBuf),
    Rendered,
    Placeholder,
}

/// The thumbnail of `model.glb` is `model.png`.
pub fn thumbnail_path_for(glb_path: impl AsRef<Path>) -> PathBuf {
    glb_path.as_ref().with_extension("png")
}

/// Writes a PNG thumbnail of the `scene` to `output`.
pub fn generate_thumbnail(
    scene: &AssembledScene,
    output: impl AsRef<Path>,
    size: ThumbnailSize,
    source_path: Option<&Path>,
) -> Result<ThumbnailSource> {
    let (image, source) = create_thumbnail(scene, size, source_path);
    DynamicImage::ImageRgb8(image).save_with_format(output.as_ref(), ImageFormat::Png)?;
    Ok(source)
}

fn create_thumbnail(scene: &AssembledScene, size: ThumbnailSize, source_path: Option<&Path>) -> (RgbImage, ThumbnailSource) {
    if let Some(image_path) = source_path.and_then(find_matching_image) {
        if let Ok(image) = image::open(&image_path) {
            return (fit_onto_background(image, size), ThumbnailSource::MatchingImage(image_path));
        }
    }
    if let Some(image) = render_scene(scene, size) {
        return (image, ThumbnailSource::Rendered);
    }
    (RgbImage::from_pixel(size.width, size.height, PLACEHOLDER), ThumbnailSource::Placeholder)
}

/// Searches for an image that has the same stem as the OBJ file at `obj_path`.
pub fn find_matching_image(obj_path: &Path) -> Option<PathBuf> {
    let stem = obj_path.file_stem()?.to_str()?;
    let obj_dir = parent_directory(obj_path);
    let parent_dir = parent_directory(&obj_dir);

    let file_names = MATCHING_IMAGE_EXTENSIONS
        .iter()
        .map(|extension| format!("{stem}.{extension}"))
        .collect::<Vec<_>>();

    let direct = [&obj_dir, &parent_dir]
        .into_iter()
        .flat_map(|directory| file_names.iter().map(move |file_name| directory.join(file_name)))
        .find(|path| path.is_file());
    if direct.is_some() {
        return direct;
    }

    file_names.iter().find_map(|file_name| {
        WalkDir::new(&parent_dir)
            .max_depth(MATCHING_IMAGE_SEARCH_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.file_type().is_file() && entry.file_name().to_str() == Some(file_name.as_str()))
            .map(|entry| entry.into_path())
    })
}

/// Scales the image down so that it fits into `size` and centers it on a white background.
fn fit_onto_background(image: DynamicImage, size: ThumbnailSize) -> RgbImage {
    let image = if image.width() > size.width || image.height() > size.height {
        image.resize(size.width, size.height, FilterType::Lanczos3)
    } else {
        image
    };
    let image = image.into_rgb8();
    let mut canvas = RgbImage::from_pixel(size.width, size.height, BACKGROUND);
    let x = (size.width - image.width()) / 2;
    let y = (size.height - image.height()) / 2;
    imageops::overlay(&mut canvas, &image, x as i64, y as i64);
    canvas
}

/// Orthographic camera that looks at the center of the scene.
struct Camera {
    center: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
    forward: Vector3<f32>,
    scale: f32,
    size: Vector2<f32>,
}

impl Camera {
    fn new(scene: &AssembledScene, size: ThumbnailSize) -> Option<Self> {
        let aabb = scene.aabb();
        if aabb.is_empty() {
            return None;
        }
        let forward = -Vector3::from(VIEW_DIRECTION).normalize();
        let right = forward.cross(&Vector3::y()).normalize();
        let up = right.cross(&forward);
        let center = aabb.center();

        let extent = scene
            .groups
            .iter()
            .flat_map(|group| group.positions.iter())
            .map(|position| {
                let relative = position - center;
                relative.dot(&right).abs().max(relative.dot(&up).abs())
            })
            .fold(0.0f32, f32::max);
        let size = Vector2::new(size.width as f32, size.height as f32);
        let scale = if extent > f32::EPSILON {
            FILL_FACTOR * 0.5 * size.min() / extent
        } else {
            1.0
        };

        Some(Self {
            center,
            right,
            up,
            forward,
            scale,
            size,
        })
    }

    /// Returns the pixel coordinates and the depth of the `position`.
    fn project(&self, position: &Vector3<f32>) -> Vector3<f32> {
        let relative = position - self.center;
        Vector3::new(
            self.size.x * 0.5 + relative.dot(&self.right) * self.scale,
            self.size.y * 0.5 - relative.dot(&self.up) * self.scale,
            relative.dot(&self.forward),
        )
    }
}

/// Renders the triangles of the scene with flat Lambert shading. Returns `None` when nothing
/// was drawn.
fn render_scene(scene: &AssembledScene, size: ThumbnailSize) -> Option<RgbImage> {
    let camera = Camera::new(scene, size)?;
    let mut image = RgbImage::from_pixel(size.width, size.height, BACKGROUND);
    let mut depth_buffer = vec![f32::INFINITY; size.width as usize * size.height as usize];
    let light = -camera.forward + camera.up * 0.5;
    let light = light.normalize();
    let mut drawn = false;

    for group in &scene.groups {
        let diffuse = group
            .material
            .as_ref()
            .map(|material| material.properties.diffuse.map(|channel| channel.clamp(0.0, 1.0)))
            .unwrap_or_else(|| Vector3::repeat(0.8));

        for [a, b, c] in group.triangles() {
            let normal = (b - a).cross(&(c - a));
            if normal.norm() <= f32::EPSILON {
                continue;
            }
            let intensity = AMBIENT_LIGHT + (1.0 - AMBIENT_LIGHT) * normal.normalize().dot(&light).abs();
            let color = diffuse * intensity * 255.0;
            let color = Rgb([color.x as u8, color.y as u8, color.z as u8]);

            let triangle = [camera.project(&a), camera.project(&b), camera.project(&c)];
            drawn |= rasterize(&triangle, color, &mut image, &mut depth_buffer);
        }
    }

    drawn.then_some(image)
}

/// Fills the triangle with the depth test. Returns `true` when at least one pixel was written.
fn rasterize(triangle: &[Vector3<f32>; 3], color: Rgb<u8>, image: &mut RgbImage, depth_buffer: &mut [f32]) -> bool {
    let [a, b, c] = triangle;
    let area = edge(a, b, c);
    if area.abs() <= f32::EPSILON {
        return false;
    }

    let (width, height) = image.dimensions();
    let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
    let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
    let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).min(width as i64 - 1);
    let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).min(height as i64 - 1);

    let mut written = false;
    for y in min_y as i64..=max_y {
        for x in min_x as i64..=max_x {
            let p = Vector3::new(x as f32 + 0.5, y as f32 + 0.5, 0.0);
            let w0 = edge(b, c, &p) / area;
            let w1 = edge(c, a, &p) / area;
            let w2 = edge(a, b, &p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let depth = w0 * a.z + w1 * b.z + w2 * c.z;
            let index = y as usize * width as usize + x as usize;
            if depth < depth_buffer[index] {
                depth_buffer[index] = depth;
                image.put_pixel(x as u32, y as u32, color);
                written = true;
            }
        }
    }
    written
}

/// Signed area of the parallelogram spanned by `a->b` and `a->p` in screen space.
fn edge(a: &Vector3<f32>, b: &Vector3<f32>, p: &Vector3<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}
