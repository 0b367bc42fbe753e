//! Local OCR through the `tesseract` command-line tool.
//!
//! The image is written to a temporary PNG and `tesseract <png> stdout` is
//! run on Tokio's blocking pool with `--psm 6 --oem 3`.

use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::pipeline::encode;
use crate::providers::OcrProvider;
use async_trait::async_trait;
use image::DynamicImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const NAME: &str = "tesseract";

#[derive(Debug, Clone)]
pub struct TesseractOcrProvider {
    binary: PathBuf,
    languages: String,
}

impl TesseractOcrProvider {
    pub fn new(languages: impl Into<String>) -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            languages: languages.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.tesseract_languages.clone())
    }

    /// Use a specific tesseract executable instead of the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn args(&self, image_path: &Path) -> Vec<String> {
        vec![
            image_path.to_string_lossy().into_owned(),
            "stdout".to_string(),
            "-l".to_string(),
            self.languages.clone(),
            "--psm".to_string(),
            "6".to_string(),
            "--oem".to_string(),
            "3".to_string(),
        ]
    }
}

#[async_trait]
impl OcrProvider for TesseractOcrProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String, ProviderError> {
        let png = encode::encode_png(image).map_err(|e| ProviderError::Encode {
            provider: NAME.to_string(),
            detail: e.to_string(),
        })?;
        let this = self.clone();

        tokio::task::spawn_blocking(move || this.run_blocking(&png))
            .await
            .map_err(|e| ProviderError::Unavailable {
                provider: NAME.to_string(),
                detail: format!("OCR task panicked: {e}"),
            })?
    }
}

impl TesseractOcrProvider {
    fn run_blocking(&self, png: &[u8]) -> Result<String, ProviderError> {
        let unavailable = |detail: String| ProviderError::Unavailable {
            provider: NAME.to_string(),
            detail,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix("invoice-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| unavailable(format!("tempfile: {e}")))?;
        tmp.write_all(png)
            .and_then(|_| tmp.flush())
            .map_err(|e| unavailable(format!("tempfile write: {e}")))?;

        let output = Command::new(&self.binary)
            .args(self.args(tmp.path()))
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    unavailable(format!(
                        "'{}' not found; install tesseract-ocr",
                        self.binary.display()
                    ))
                } else {
                    unavailable(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract: {} chars", text.chars().count());
        Ok(text)
    }
}
