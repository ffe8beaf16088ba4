use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use objglb_shared::indoc::formatdoc;

use crate::{common::extract_file_stem_from_path, format_file_size, Result};

const MODEL_VIEWER_SCRIPT: &str = "https://ajax.googleapis.com/ajax/libs/model-viewer/3.4.0/model-viewer.min.js";

/// The preview of `model.glb` is `model.html`.
pub fn preview_path_for(glb_path: impl AsRef<Path>) -> PathBuf {
    glb_path.as_ref().with_extension("html")
}

/// Writes a self-contained HTML page next to the GLB file that shows the model in an
/// interactive viewer. Returns the path of the page.
pub fn generate_preview_html(glb_path: impl AsRef<Path>) -> Result<PathBuf> {
    let glb_path = glb_path.as_ref();
    let output = preview_path_for(glb_path);
    let glb = fs::read(glb_path)?;
    let name = extract_file_stem_from_path(glb_path)?;
    fs::write(&output, render_preview(&name, &glb))?;
    Ok(output)
}

fn render_preview(name: &str, glb: &[u8]) -> String {
    let name = escape_html(name);
    let file_size = format_file_size(glb.len() as u64);
    let data = STANDARD.encode(glb);
    formatdoc! {r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <meta name="viewport" content="width=device-width, initial-scale=1.0">
            <title>{name} - 3D Preview</title>
            <script type="module" src="{script}"></script>
            <style>
                body {{
                    margin: 0;
                    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
                    background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
                }}
                model-viewer {{
                    width: 100vw;
                    height: 100vh;
                }}
                #info {{
                    position: absolute;
                    top: 20px;
                    left: 20px;
                    background: rgba(255, 255, 255, 0.95);
                    padding: 15px 20px;
                    border-radius: 10px;
                    box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1);
                }}
                #info h1 {{
                    font-size: 20px;
                    margin: 0 0 8px 0;
                    color: #333;
                }}
                #info p {{
                    font-size: 14px;
                    margin: 0;
                    color: #666;
                }}
            </style>
        </head>
        <body>
            <div id="info">
                <h1>{name}</h1>
                <p>File size: {file_size}</p>
                <p>Drag to rotate, scroll to zoom</p>
            </div>
            <model-viewer src="data:model/gltf-binary;base64,{data}" alt="{name}" camera-controls auto-rotate shadow-intensity="1"></model-viewer>
        </body>
        </html>
    "#,
        name = name,
        script = MODEL_VIEWER_SCRIPT,
        file_size = file_size,
        data = data,
    }
}

fn escape_html(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '&' => "&amp;".to_owned(),
            '<' => "&lt;".to_owned(),
            '>' => "&gt;".to_owned(),
            '"' => "&quot;".to_owned(),
            '\'' => "&#39;".to_owned(),
            c => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn embeds_the_model() {
        let root = TempDir::new("preview").unwrap();
        let glb_path = root.path().join("chair.glb");
        fs::write(&glb_path, b"glTF-bytes").unwrap();

        let html_path = generate_preview_html(&glb_path).unwrap();
        assert_eq!(html_path, root.path().join("chair.html"));

        let html = fs::read_to_string(html_path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>chair - 3D Preview</title>"));
        assert!(html.contains(&format!("base64,{}", STANDARD.encode(b"glTF-bytes"))));
        assert!(html.contains("File size: 10.0 B"));
    }

    #[test]
    fn name_is_escaped() {
        let html = render_preview("<b>&", b"");
        assert!(html.contains("<h1>&lt;b&gt;&amp;</h1>"));
    }

    #[test]
    fn missing_model() {
        let root = TempDir::new("preview").unwrap();
        assert!(generate_preview_html(root.path().join("missing.glb")).is_err());
    }
}
