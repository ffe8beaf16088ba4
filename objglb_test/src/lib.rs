use std::{
    fs,
    path::{Path, PathBuf},
    sync::Once,
};

use chrono::Utc;
use image::{DynamicImage, ImageError, Rgb, RgbImage, Rgba, RgbaImage};
use objglb_shared::log::LevelFilter;
use simple_logger::SimpleLogger;

pub use spectral;

const TEST_RESULT_FOLDER: &str = "test_results";

static LOGGER: Once = Once::new();

/// Installs a logger for the test process. Can be called from every test.
pub fn setup_logger() {
    LOGGER.call_once(|| {
        if let Err(err) = SimpleLogger::new().with_level(LevelFilter::Trace).init() {
            eprintln!("Failed to install the test logger: {err}");
        }
    });
}

/// Creates a folder named after the test function in which files for debugging can be written.
pub fn create_test_result_folder_for_function(function_name: &str) -> PathBuf {
    let folder_name = function_name.replace("::", ".");
    let path = PathBuf::from(TEST_RESULT_FOLDER).join(folder_name);
    fs::create_dir_all(&path).unwrap_or_else(|err| panic!("Failed to create the test result folder {}: {err}", path.display()));
    path
}

/// Returns a file name that is unique for the current test run.
pub fn timestamped_file_name(stem: &str, extension: &str) -> String {
    let formatted = Utc::now().format("%Y-%m-%d_%H-%M-%S-%f").to_string();
    format!("{stem}_{formatted}.{extension}")
}

/// Writes `content` to `path` and creates the parent directories.
pub fn write_text_file(path: impl AsRef<Path>, content: &str) -> PathBuf {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create the parent directory");
    }
    fs::write(path, content).unwrap_or_else(|err| panic!("Failed to write {}: {err}", path.display()));
    path.to_owned()
}

/// Writes a single-colored RGB PNG of the given size.
pub fn write_rgb_png(path: impl AsRef<Path>, width: u32, height: u32, color: [u8; 3]) -> PathBuf {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    save(DynamicImage::ImageRgb8(image), path.as_ref())
}

/// Writes a single-colored RGBA PNG of the given size.
pub fn write_rgba_png(path: impl AsRef<Path>, width: u32, height: u32, color: [u8; 4]) -> PathBuf {
    let image = RgbaImage::from_pixel(width, height, Rgba(color));
    save(DynamicImage::ImageRgba8(image), path.as_ref())
}

/// Writes a single-colored greyscale PNG of the given size.
pub fn write_luma_png(path: impl AsRef<Path>, width: u32, height: u32, value: u8) -> PathBuf {
    let image = image::GrayImage::from_pixel(width, height, image::Luma([value]));
    save(DynamicImage::ImageLuma8(image), path.as_ref())
}

fn save(image: DynamicImage, path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create the parent directory");
    }
    image
        .save(path)
        .unwrap_or_else(|_| panic!("Failed to save image to path \"{}\"", path.to_string_lossy()));
    path.to_owned()
}

/// Opens the given image and expects the path to be correct.
pub fn open_image(path: impl AsRef<Path>) -> DynamicImage {
    let f = |err: ImageError| {
        let err = err.to_string();
        let path_str = path
            .as_ref()
            .canonicalize()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or(path.as_ref().to_string_lossy().into_owned());
        let cwd = PathBuf::from(".")
            .canonicalize()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or("unknown".to_owned());
        panic!("Could not find test image at path \"{path_str}\" (cwd: \"{cwd}\") due to the following error: {err}")
    };
    image::open(&path).unwrap_or_else(f)
}

#[cfg(test)]
mod tests {
    use objglb_shared::function_name;

    use super::*;

    #[test]
    #[should_panic]
    fn image_not_found() {
        open_image("the/wrong/path/to/the/image");
    }

    #[test]
    fn written_png_can_be_opened() {
        let folder = create_test_result_folder_for_function(function_name!());
        let path = write_rgb_png(folder.join("red.png"), 3, 2, [255, 0, 0]);
        let image = open_image(&path).into_rgb8();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn timestamped_file_name_keeps_stem_and_extension() {
        let name = timestamped_file_name("diff", "png");
        assert!(name.starts_with("diff_"));
        assert!(name.ends_with(".png"));
    }
}
