//! Snapshot capture: save readback pixels to an image file.

use std::path::Path;

use image::{ImageBuffer, Rgba};
use tracing::info;

use crate::error::{GpuError, Result};

/// Save RGBA pixel data (4 bytes per pixel, row-major) to an image file.
/// The format is determined by the file extension.
pub fn save_snapshot(
    data: Vec<u8>,
    width: u32,
    height: u32,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();

    let image = ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, data)
        .ok_or_else(|| GpuError::Snapshot("pixel data does not match dimensions".to_string()))?;

    image
        .save(path)
        .map_err(|e| GpuError::Snapshot(e.to_string()))?;

    info!("Snapshot saved: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_dimensions() {
        let result = save_snapshot(vec![0; 16], 3, 3, "unused.png");
        assert!(matches!(result, Err(GpuError::Snapshot(_))));
    }

    #[test]
    fn writes_a_png() {
        let path = std::env::temp_dir().join("rectbench-snapshot-test.png");
        let data = vec![255_u8; 2 * 2 * 4];
        save_snapshot(data, 2, 2, &path).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
