use std::path::Path;

use image::ImageFormat;
use tokio::process::Command;

use crate::migrator::MigratorError;

pub const JP2_CONTENT_TYPE: &str = "image/jp2";

// Function to detect image type from the image data
pub fn detect_image_type(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A]) {
        // JP2 signature box
        JP2_CONTENT_TYPE
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if data.starts_with(&[0x47, 0x49, 0x46, 0x38]) {
        "image/gif"
    } else if data.starts_with(&[0x52, 0x49, 0x46, 0x46]) && data.get(8..12) == Some(&[0x57, 0x45, 0x42, 0x50]) {
        "image/webp"
    } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        "image/tiff"
    } else if data.starts_with(&[0x42, 0x4D]) {
        "image/bmp"
    } else {
        "application/octet-stream"
    }
}

/// Content type of a stored image. Pairtree files carry no extension, so the
/// bytes are checked first and the file name only breaks ties.
pub fn content_type_for(path: &Path, data: &[u8]) -> &'static str {
    let detected = detect_image_type(data);
    if detected != "application/octet-stream" {
        return detected;
    }

    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jp2" | "jpx" => JP2_CONTENT_TYPE,
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Writes the source as an uncompressed TIFF, the input the JP2 encoder expects.
pub fn write_tiff(data: &[u8], dest: &Path) -> Result<(), MigratorError> {
    if detect_image_type(data) == "image/tiff" {
        std::fs::write(dest, data)?;
        return Ok(());
    }

    let img = image::load_from_memory(data)
        .map_err(|e| MigratorError::ConversionError(format!("Failed to load image: {}", e)))?;

    img.save_with_format(dest, ImageFormat::Tiff)
        .map_err(|e| MigratorError::ConversionError(format!("TIFF encoding failed: {}", e)))
}

/// External JP2 encoder invocation, e.g. `kdu_compress -i {input} -o {output}`.
#[derive(Debug, Clone)]
pub struct Transcoder {
    argv: Vec<String>,
}

impl Transcoder {
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            return None;
        }
        Some(Self { argv })
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();

        self.argv[1..]
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }

    pub async fn run(&self, input: &Path, output: &Path) -> Result<(), MigratorError> {
        let result = Command::new(self.program())
            .args(self.args(input, output))
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MigratorError::ConversionError(format!(
                "{} exited with {}: {}",
                self.program(),
                result.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
