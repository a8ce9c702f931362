use std::path::{Path, PathBuf};
use std::process::Command;

use super::FingerprintError;

/// Reads text off images with the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct OcrService {
    binary: PathBuf,
}

impl OcrService {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn extract_text(&self, image_path: &Path) -> Result<String, FingerprintError> {
        let output = Command::new(&self.binary)
            .arg(image_path)
            .arg("stdout")
            .output()
            .map_err(|e| FingerprintError::Tool {
                tool: self.binary.display().to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(FingerprintError::Tool {
                tool: self.binary.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        log::debug!(
            "OCR read {} characters from {}",
            text.chars().count(),
            image_path.display()
        );
        Ok(text)
    }
}

impl Default for OcrService {
    fn default() -> Self {
        Self::new("tesseract")
    }
}
