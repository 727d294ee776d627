// ============================================================================
// state_io.rs — shader-fluid
// Field snapshot export: PNG image plus a JSON sidecar describing the run.
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::config::{Variant, VelocityParams};
use crate::error::SimError;
use crate::texture::FieldImage;

pub const EXPORT_DIR: &str = "exports";

/// Run metadata written next to every exported image.
#[derive(Clone, Debug, Serialize)]
pub struct ExportMeta {
    pub variant: Variant,
    pub width: u32,
    pub height: u32,
    pub frame: u64,
    pub paused: bool,
    /// Present for the velocity variant only.
    pub velocity: Option<VelocityParams>,
    pub exported_at: String,
}

impl ExportMeta {
    pub fn new(
        variant: Variant,
        image: &FieldImage,
        frame: u64,
        paused: bool,
        velocity: VelocityParams,
    ) -> Self {
        let grid = image.grid();
        Self {
            variant,
            width: grid.width,
            height: grid.height,
            frame,
            paused,
            velocity: variant.has_velocity().then_some(velocity),
            exported_at: Local::now().to_rfc3339(),
        }
    }
}

/// Default destination for an interactive export.
pub fn timestamped_path() -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S%.3f");
    Path::new(EXPORT_DIR).join(format!("field_{stamp}.png"))
}

/// Rows in display order: the field's row 0 is shown at the bottom, so the
/// image is flipped to match what the window presents.
pub fn display_rows(image: &FieldImage) -> Vec<u8> {
    let grid = image.grid();
    let row_len = grid.width as usize * 4;
    image
        .as_bytes()
        .chunks_exact(row_len)
        .rev()
        .flatten()
        .copied()
        .collect()
}

/// Writes `image` as PNG at `path` and its metadata at `path` with a `.json`
/// extension. Returns the sidecar path.
pub fn save_field(path: &Path, image: &FieldImage, meta: &ExportMeta) -> Result<PathBuf, SimError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let grid = image.grid();
    image::save_buffer(
        path,
        &display_rows(image),
        grid.width,
        grid.height,
        image::ColorType::Rgba8,
    )?;

    let sidecar = path.with_extension("json");
    fs::write(&sidecar, serde_json::to_string_pretty(meta)?)?;
    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{Grid, BLACK, WHITE};

    #[test]
    fn display_rows_flip_vertically() {
        let mut image = FieldImage::new(Grid::new(2, 3), BLACK);
        image.put(1, 0, WHITE);
        let rows = display_rows(&image);
        // Bottom field row becomes the last image row.
        assert_eq!(&rows[16..24], &[0, 0, 0, 255, 255, 255, 255, 255]);
        assert_eq!(&rows[0..8], &[0, 0, 0, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn scalar_meta_omits_velocity() {
        let image = FieldImage::new(Grid::new(4, 4), BLACK);
        let meta = ExportMeta::new(Variant::Scalar, &image, 7, true, VelocityParams::default());
        assert!(meta.velocity.is_none());
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["variant"], "scalar");
        assert_eq!(json["frame"], 7);
    }

    #[test]
    fn saves_png_and_sidecar() {
        let dir = std::env::temp_dir().join(format!("shader_fluid_export_{}", std::process::id()));
        let path = dir.join("field.png");
        let mut image = FieldImage::new(Grid::new(8, 8), BLACK);
        image.put(4, 4, WHITE);
        let meta = ExportMeta::new(Variant::Velocity, &image, 3, false, VelocityParams::default());

        let sidecar = save_field(&path, &image, &meta).unwrap();
        assert!(path.exists());
        let text = fs::read_to_string(&sidecar).unwrap();
        assert!(text.contains("\"encode_range\": 0.03"));

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.get_pixel(4, 3).0, WHITE);

        let _ = fs::remove_dir_all(dir);
    }
}
