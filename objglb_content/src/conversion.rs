use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use objglb_shared::{
    itertools::Itertools,
    pathdiff,
    rayon::iter::{IntoParallelRefIterator, ParallelIterator},
    walkdir::WalkDir,
};

use crate::{
    common::extract_extension_from_path,
    config::ConversionConfig,
    glb_writer::GlbWriter,
    material_handler::MaterialHandler,
    obj_loader::ObjDocument,
    observer::{Event, Observer},
    preview::generate_preview_html,
    scene_assembler::{AssembledScene, SceneAssembler},
    thumbnail::{generate_thumbnail, thumbnail_path_for},
    Error, FailureCategory, Result,
};

/// Result of a successful conversion of a single file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Size of the GLB file in bytes.
    pub file_size: u64,
    pub group_count: usize,
    pub thumbnail: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

/// Summary of a batch conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Human-readable description of every failure and of problems with the input directory.
    pub messages: Vec<String>,
    pub failures_by_category: BTreeMap<FailureCategory, usize>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Checks that the input exists and is an OBJ file.
pub fn validate_input_file(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::NotFound(path.to_owned()));
    }
    if !path.is_file() {
        return Err(Error::InvalidFormat(format!("Input path is not a file: {}", path.display())));
    }
    if extract_extension_from_path(path) != "obj" {
        return Err(Error::InvalidFormat(format!(
            "Input file must have .obj extension, got: {}",
            path.display()
        )));
    }
    Ok(path.to_owned())
}

/// Checks that the output may be written and creates its parent directories.
pub fn validate_output_file(path: impl AsRef<Path>, overwrite: bool) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.exists() && !overwrite {
        return Err(Error::AlreadyExists(path.to_owned()));
    }
    if extract_extension_from_path(path) != "glb" {
        return Err(Error::InvalidFormat(format!(
            "Output file must have .glb extension, got: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(path.to_owned())
}

/// Converts a single OBJ file into a GLB file.
///
/// Thumbnails and previews are written after the GLB file when they are enabled in the
/// `config`. Failing to write them is reported to the `observer` but doesn't fail the conversion.
pub fn convert_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
    observer: &dyn Observer,
) -> Result<ConversionOutcome> {
    let input = input.as_ref();
    observer.notify(Event::ConversionStarted { input: input.to_owned() });
    convert_file_inner(input, output.as_ref(), config, observer).map_err(|err| {
        observer.notify(Event::ConversionFailed {
            input: input.to_owned(),
            message: err.to_string(),
        });
        err
    })
}

fn convert_file_inner(input: &Path, output: &Path, config: &ConversionConfig, observer: &dyn Observer) -> Result<ConversionOutcome> {
    let input = validate_input_file(input)?;
    let output = validate_output_file(output, config.overwrite)?;

    let document = ObjDocument::load(&input)?;
    observer.notify(Event::MeshesLoaded {
        path: input.clone(),
        group_count: document.groups.len(),
    });

    let resolved = MaterialHandler::new(&input)
        .with_material_libraries(document.material_libraries.clone())
        .with_recursive_texture_search(config.recursive_texture_search)
        .process_materials(observer);
    let groups = document.into_geometry_groups(&resolved.materials);
    let scene = SceneAssembler::new(&input).assemble(groups, resolved, observer)?;

    let file_size = GlbWriter::new()
        .with_embedded_textures(config.embed_textures)
        .write(&scene, &output)?;
    observer.notify(Event::ConversionSucceeded {
        output: output.clone(),
        file_size,
    });

    let thumbnail = config
        .thumbnail
        .then(|| write_thumbnail(&scene, &input, &output, config, observer))
        .flatten();
    let preview = config.preview.then(|| write_preview(&output, observer)).flatten();

    Ok(ConversionOutcome {
        input,
        output,
        file_size,
        group_count: scene.groups.len(),
        thumbnail,
        preview,
    })
}

fn write_thumbnail(
    scene: &AssembledScene,
    input: &Path,
    output: &Path,
    config: &ConversionConfig,
    observer: &dyn Observer,
) -> Option<PathBuf> {
    let path = thumbnail_path_for(output);
    match generate_thumbnail(scene, &path, config.thumbnail_size, Some(input)) {
        Ok(_) => {
            observer.notify(Event::ThumbnailWritten { path: path.clone() });
            Some(path)
        }
        Err(err) => {
            observer.notify(Event::ThumbnailFailed {
                path,
                message: err.to_string(),
            });
            None
        }
    }
}

fn write_preview(output: &Path, observer: &dyn Observer) -> Option<PathBuf> {
    match generate_preview_html(output) {
        Ok(path) => {
            observer.notify(Event::PreviewWritten { path: path.clone() });
            Some(path)
        }
        Err(err) => {
            observer.notify(Event::PreviewFailed {
                path: output.to_owned(),
                message: err.to_string(),
            });
            None
        }
    }
}

/// Returns the OBJ files in `directory` sorted by path. The extension is matched case-insensitively.
pub fn find_obj_files(directory: impl AsRef<Path>, recursive: bool) -> Result<Vec<PathBuf>> {
    let directory = directory.as_ref();
    if !directory.exists() {
        return Err(Error::NotFound(directory.to_owned()));
    }
    if !directory.is_dir() {
        return Err(Error::InvalidFormat(format!("Path is not a directory: {}", directory.display())));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let files = WalkDir::new(directory)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && extract_extension_from_path(entry.path()) == "obj")
        .map(|entry| entry.into_path())
        .sorted()
        .dedup()
        .collect();
    Ok(files)
}

/// Returns the path of the GLB file for `input` in `output_dir`.
///
/// When `input_base` is given, the directory of `input` relative to `input_base` is
/// reproduced below `output_dir`.
pub fn output_path_for(input: impl AsRef<Path>, output_dir: impl AsRef<Path>, input_base: Option<&Path>) -> PathBuf {
    let input = input.as_ref();
    let file_name = input.with_extension("glb");
    let file_name = file_name.file_name().unwrap_or(file_name.as_os_str());
    let relative_dir = input_base
        .and_then(|base| pathdiff::diff_paths(input, base))
        .and_then(|relative| relative.parent().map(Path::to_owned))
        .filter(|relative| !relative.starts_with(".."));
    match relative_dir {
        Some(relative_dir) => output_dir.as_ref().join(relative_dir).join(file_name),
        None => output_dir.as_ref().join(file_name),
    }
}

/// Converts every OBJ file in `input_dir` into `output_dir`. The files are converted in parallel.
///
/// Never fails. Problems are counted and described in the [`BatchReport`].
pub fn convert_batch(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
    observer: &dyn Observer,
) -> BatchReport {
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();
    let mut report = BatchReport::default();

    let files = match find_obj_files(input_dir, config.recursive) {
        Ok(files) => files,
        Err(err) => {
            report.messages.push(err.to_string());
            return report;
        }
    };
    if files.is_empty() {
        report
            .messages
            .push(format!("No OBJ files found in {}", input_dir.display()));
        return report;
    }
    observer.notify(Event::BatchStarted { file_count: files.len() });

    let input_base = config.recursive.then_some(input_dir);
    let results = files
        .par_iter()
        .map(|input| {
            let output = output_path_for(input, output_dir, input_base);
            (input, convert_file(input, output, config, observer))
        })
        .collect::<Vec<_>>();

    for (input, result) in results {
        match result {
            Ok(_) => report.succeeded += 1,
            Err(err) => {
                report.failed += 1;
                *report.failures_by_category.entry(err.category()).or_default() += 1;
                report.messages.push(format!("{}: {err}", input.display()));
            }
        }
    }

    observer.notify(Event::BatchFinished {
        succeeded: report.succeeded,
        failed: report.failed,
    });
    report
}

/// Formats a number of bytes like `1.5 KB`.
pub fn format_file_size(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

#[cfg(test)]
mod tests {
    use gltf::Gltf;
    use objglb_shared::{crossbeam_channel, indoc::indoc};
    use objglb_test::{spectral::prelude::*, write_rgb_png, write_text_file};
    use tempdir::TempDir;

    use crate::material_table::DEFAULT_MATERIAL_NAME;

    use super::*;

    const TRIANGLE: &str = indoc! {"
        mtllib model.mtl
        v 0 0 0
        v 1 0 0
        v 0 1 0
        vt 0 0
        vt 1 0
        vt 0 1
        usemtl M1
        f 1/1 2/2 3/3
    "};

    const M1: &str = "newmtl M1\nKd 1 0 0\nmap_Kd tex.png\n";

    fn base_color_texture_count(path: &Path) -> usize {
        let gltf = Gltf::from_slice(&fs::read(path).unwrap()).unwrap();
        gltf.materials()
            .filter(|material| material.pbr_metallic_roughness().base_color_texture().is_some())
            .count()
    }

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0.0 B");
        assert_eq!(format_file_size(1023), "1023.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_file_size(2 * 1024 * 1024 * 1024 * 1024), "2.0 TB");
    }

    #[test]
    fn input_validation() {
        let root = TempDir::new("conversion").unwrap();
        let obj = write_text_file(root.path().join("model.OBJ"), TRIANGLE);
        let txt = write_text_file(root.path().join("model.txt"), "");

        assert_that(&validate_input_file(&obj).unwrap()).is_equal_to(&obj);
        assert!(matches!(validate_input_file(root.path().join("missing.obj")), Err(Error::NotFound(_))));
        assert!(matches!(validate_input_file(&txt), Err(Error::InvalidFormat(_))));
        assert!(matches!(validate_input_file(root.path()), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn output_validation() {
        let root = TempDir::new("conversion").unwrap();
        let nested = root.path().join("a/b/model.glb");
        assert_that(&validate_output_file(&nested, false).unwrap()).is_equal_to(&nested);
        assert!(root.path().join("a/b").is_dir());

        let existing = write_text_file(root.path().join("existing.glb"), "");
        assert!(matches!(validate_output_file(&existing, false), Err(Error::AlreadyExists(_))));
        assert!(validate_output_file(&existing, true).is_ok());
        assert!(matches!(
            validate_output_file(root.path().join("model.gltf"), false),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn textured_model() {
        let root = TempDir::new("conversion").unwrap();
        let input = write_text_file(root.path().join("model.obj"), TRIANGLE);
        write_text_file(root.path().join("model.mtl"), M1);
        write_rgb_png(root.path().join("tex.png"), 4, 4, [255, 0, 0]);
        let output = root.path().join("out/model.glb");
        let (sender, _receiver) = crossbeam_channel::unbounded();

        let outcome = convert_file(&input, &output, &ConversionConfig::default(), &sender).unwrap();

        assert_eq!(outcome.output, output);
        assert_eq!(outcome.group_count, 1);
        assert_eq!(outcome.file_size, fs::metadata(&output).unwrap().len());
        assert_eq!(base_color_texture_count(&output), 1);
        let gltf = Gltf::from_slice(&fs::read(&output).unwrap()).unwrap();
        let material = gltf.materials().next().unwrap();
        assert_eq!(material.name(), Some("M1"));
        assert_eq!(material.pbr_metallic_roughness().base_color_factor(), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn user_material_named_default() {
        let root = TempDir::new("conversion").unwrap();
        let input = write_text_file(
            root.path().join("model.obj"),
            indoc! {"
                mtllib m.mtl
                v 0 0 0
                v 1 0 0
                v 0 1 0
                o A
                usemtl default
                f 1 2 3
                o B
                usemtl Unknown
                f 1 2 3
            "},
        );
        write_text_file(root.path().join("m.mtl"), "newmtl default\nKd 1 0 0\n");
        let output = root.path().join("model.glb");
        let (sender, _receiver) = crossbeam_channel::unbounded();

        convert_file(&input, &output, &ConversionConfig::default(), &sender).unwrap();

        let gltf = Gltf::from_slice(&fs::read(&output).unwrap()).unwrap();
        let colors = gltf
            .meshes()
            .map(|mesh| {
                let material = mesh.primitives().next().unwrap().material();
                (mesh.name().unwrap().to_owned(), material.pbr_metallic_roughness().base_color_factor())
            })
            .collect::<Vec<_>>();
        assert_eq!(
            colors,
            vec![
                ("A".to_owned(), [1.0, 0.0, 0.0, 1.0]),
                ("B".to_owned(), [0.8, 0.8, 0.8, 1.0]),
            ]
        );
    }

    #[test]
    fn missing_texture_still_converts() {
        let root = TempDir::new("conversion").unwrap();
        let input = write_text_file(root.path().join("model.obj"), TRIANGLE);
        write_text_file(root.path().join("model.mtl"), M1);
        let output = root.path().join("model.glb");
        let (sender, receiver) = crossbeam_channel::unbounded();

        convert_file(&input, &output, &ConversionConfig::default(), &sender).unwrap();

        assert_eq!(base_color_texture_count(&output), 0);
        assert!(receiver
            .try_iter()
            .any(|event| event == Event::TextureNotFound { reference: "tex.png".to_owned() }));
    }

    #[test]
    fn model_without_materials() {
        let root = TempDir::new("conversion").unwrap();
        let input = write_text_file(root.path().join("plain.obj"), "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        let output = root.path().join("plain.glb");
        let (sender, _receiver) = crossbeam_channel::unbounded();

        convert_file(&input, &output, &ConversionConfig::default(), &sender).unwrap();

        let gltf = Gltf::from_slice(&fs::read(&output).unwrap()).unwrap();
        let names = gltf.materials().map(|material| material.name().map(str::to_owned)).collect::<Vec<_>>();
        assert_eq!(names, vec![Some(DEFAULT_MATERIAL_NAME.to_owned())]);
    }

    #[test]
    fn empty_geometry_fails() {
        let root = TempDir::new("conversion").unwrap();
        let input = write_text_file(root.path().join("points.obj"), "v 0 0 0\nv 1 1 1\n");
        let output = root.path().join("points.glb");
        let (sender, receiver) = crossbeam_channel::unbounded();

        let result = convert_file(&input, &output, &ConversionConfig::default(), &sender);

        assert!(matches!(result, Err(Error::EmptyGeometry(_))));
        assert!(!output.exists());
        assert!(receiver
            .try_iter()
            .any(|event| matches!(event, Event::ConversionFailed { .. })));
    }

    #[test]
    fn existing_output_requires_overwrite() {
        let root = TempDir::new("conversion").unwrap();
        let input = write_text_file(root.path().join("model.obj"), TRIANGLE);
        let output = write_text_file(root.path().join("model.glb"), "old");
        let (sender, _receiver) = crossbeam_channel::unbounded();

        let result = convert_file(&input, &output, &ConversionConfig::default(), &sender);
        assert_eq!(result.unwrap_err().category(), FailureCategory::AlreadyExists);

        let config = ConversionConfig {
            overwrite: true,
            ..Default::default()
        };
        assert!(convert_file(&input, &output, &config, &sender).is_ok());
    }

    #[test]
    fn thumbnail_and_preview() {
        let root = TempDir::new("conversion").unwrap();
        let input = write_text_file(root.path().join("model.obj"), TRIANGLE);
        let output = root.path().join("model.glb");
        let config = ConversionConfig {
            thumbnail: true,
            thumbnail_size: "32x32".parse().unwrap(),
            preview: true,
            ..Default::default()
        };
        let (sender, _receiver) = crossbeam_channel::unbounded();

        let outcome = convert_file(&input, &output, &config, &sender).unwrap();

        assert_eq!(outcome.thumbnail, Some(root.path().join("model.png")));
        assert_eq!(outcome.preview, Some(root.path().join("model.html")));
        assert!(root.path().join("model.png").is_file());
        assert!(root.path().join("model.html").is_file());
    }

    #[test]
    fn obj_files_are_found() {
        let root = TempDir::new("conversion").unwrap();
        write_text_file(root.path().join("b.obj"), "");
        write_text_file(root.path().join("a.OBJ"), "");
        write_text_file(root.path().join("notes.txt"), "");
        write_text_file(root.path().join("sub/c.obj"), "");

        let flat = find_obj_files(root.path(), false).unwrap();
        assert_eq!(flat, vec![root.path().join("a.OBJ"), root.path().join("b.obj")]);

        let recursive = find_obj_files(root.path(), true).unwrap();
        assert_eq!(recursive.len(), 3);
        assert_eq!(recursive[2], root.path().join("sub/c.obj"));

        assert!(matches!(find_obj_files(root.path().join("missing"), false), Err(Error::NotFound(_))));
        assert!(matches!(
            find_obj_files(root.path().join("notes.txt"), false),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn output_paths() {
        assert_eq!(
            output_path_for("in/sub/chair.obj", "out", None),
            PathBuf::from("out/chair.glb")
        );
        assert_eq!(
            output_path_for("in/sub/chair.obj", "out", Some(Path::new("in"))),
            PathBuf::from("out/sub/chair.glb")
        );
        assert_eq!(
            output_path_for("elsewhere/chair.obj", "out", Some(Path::new("in"))),
            PathBuf::from("out/chair.glb")
        );
    }

    #[test]
    fn batch_conversion() {
        let root = TempDir::new("conversion").unwrap();
        let input_dir = root.path().join("in");
        let output_dir = root.path().join("out");
        write_text_file(input_dir.join("good.obj"), TRIANGLE);
        write_text_file(input_dir.join("nested/deep.obj"), TRIANGLE);
        write_text_file(input_dir.join("empty.obj"), "# nothing\n");
        let (sender, receiver) = crossbeam_channel::unbounded();

        let config = ConversionConfig {
            recursive: true,
            ..Default::default()
        };
        let report = convert_batch(&input_dir, &output_dir, &config, &sender);

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.total(), 3);
        assert!(!report.is_success());
        assert_eq!(report.failures_by_category.get(&FailureCategory::EmptyGeometry), Some(&1));
        assert_eq!(report.messages.len(), 1);
        assert!(output_dir.join("good.glb").is_file());
        assert!(output_dir.join("nested/deep.glb").is_file());
        assert!(receiver
            .try_iter()
            .any(|event| event == Event::BatchFinished { succeeded: 2, failed: 1 }));
    }

    #[test]
    fn batch_with_missing_directory() {
        let root = TempDir::new("conversion").unwrap();
        let (sender, _receiver) = crossbeam_channel::unbounded();
        let report = convert_batch(root.path().join("missing"), root.path().join("out"), &ConversionConfig::default(), &sender);
        assert_eq!(report.total(), 0);
        assert_eq!(report.messages.len(), 1);
    }

    #[test]
    fn batch_without_obj_files() {
        let root = TempDir::new("conversion").unwrap();
        let (sender, _receiver) = crossbeam_channel::unbounded();
        let report = convert_batch(root.path(), root.path().join("out"), &ConversionConfig::default(), &sender);
        assert_eq!(report, BatchReport {
            messages: vec![format!("No OBJ files found in {}", root.path().display())],
            ..Default::default()
        });
    }
}
