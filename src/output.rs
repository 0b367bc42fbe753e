//! Result types produced by the pipeline and consumed by the shell and
//! exporters.

use crate::error::ProviderError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Field name → value map returned by an extraction provider.
///
/// Insertion-ordered so rows come out in the order the model wrote them.
pub type ExtractedFields = serde_json::Map<String, serde_json::Value>;

/// Confidence tag attached to every row. Not a score.
pub const AI_CONFIDENCE: &str = "ai";

/// One displayed/exported line of an invoice: a single extracted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub field: String,
    pub value: String,
    pub confidence: String,
}

/// A row tagged with the file it came from. This is the unit every
/// exporter writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "File")]
    pub file: String,
    pub field: String,
    pub value: String,
    pub confidence: String,
}

impl ResultRecord {
    pub fn from_row(file: &str, row: &Row) -> Self {
        Self {
            file: file.to_string(),
            field: row.field.clone(),
            value: row.value.clone(),
            confidence: row.confidence.clone(),
        }
    }
}

/// What happened when one provider in a fallback chain was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    /// The provider's answer was used.
    Accepted,
    /// OCR text came back but was not longer than the threshold.
    TooShort { chars: usize },
    /// The call failed; the chain moved on.
    Failed(ProviderError),
}

/// One entry in a chain's attempt log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: String,
    pub status: AttemptStatus,
}

/// Result of running the OCR chain over one image.
#[derive(Debug, Clone, Default)]
pub struct OcrOutcome {
    /// Accepted text, or empty when no provider produced enough.
    pub text: String,
    /// Provider whose text was accepted.
    pub provider: Option<String>,
    pub attempts: Vec<ProviderAttempt>,
}

/// Result of running the extraction chain over OCR text.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub fields: ExtractedFields,
    /// Provider whose JSON was accepted; `None` means the fallback envelope
    /// was returned.
    pub provider: Option<String>,
    pub attempts: Vec<ProviderAttempt>,
}

impl ExtractionOutcome {
    pub fn is_fallback(&self) -> bool {
        self.provider.is_none()
    }
}

/// Everything the pipeline produced for one input file.
#[derive(Debug, Clone)]
pub struct ProcessedInvoice {
    /// Base name of the input file, as shown in the result table.
    pub file_name: String,
    /// The loaded bitmap (first page for PDFs), kept for preview.
    pub image: DynamicImage,
    pub ocr: OcrOutcome,
    /// Detected language code, or `"unknown"`.
    pub language: String,
    /// Extracted fields, always including `language`.
    pub fields: ExtractedFields,
    /// Provider whose extraction was accepted, `None` for the fallback envelope.
    pub extraction_provider: Option<String>,
    pub extraction_attempts: Vec<ProviderAttempt>,
    pub rows: Vec<Row>,
}

impl ProcessedInvoice {
    /// Rows tagged with this invoice's file name, ready to accumulate.
    pub fn records(&self) -> Vec<ResultRecord> {
        self.rows
            .iter()
            .map(|r| ResultRecord::from_row(&self.file_name, r))
            .collect()
    }

    /// Copy of the bitmap that fits in a `max`×`max` box. Only ever shrinks;
    /// smaller images come back at their own size.
    pub fn thumbnail(&self, max: u32) -> DynamicImage {
        if self.image.width() <= max && self.image.height() <= max {
            return self.image.clone();
        }
        self.image.thumbnail(max, max)
    }
}
