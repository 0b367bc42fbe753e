//! Error types for the invoice-ai library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ProviderError`] — **Non-fatal**: one OCR or extraction provider could
//!   not produce a usable answer. The fallback chains record it in a
//!   [`crate::output::ProviderAttempt`] and move on to the next provider.
//!
//! * [`InvoiceError`] — **Fatal for one file**: the file cannot be loaded or
//!   the pipeline cannot be set up. The batch worker reports it for that file
//!   and carries on with the rest of the batch.
//!
//! * [`ExportError`] — writing the accumulated rows to CSV, XLSX, JSON or
//!   SQLite failed. Propagated to whoever asked for the export.

use std::path::PathBuf;
use thiserror::Error;

/// A single provider call failed.
///
/// The variants split "could not reach the provider" from "the provider
/// answered with something unusable" so a caller can tell a network outage
/// or a missing API key apart from a model that returned garbage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// No credential was configured for this provider.
    #[error("{provider}: not configured ({hint})")]
    NotConfigured { provider: String, hint: String },

    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("{provider}: unreachable: {detail}")]
    Unreachable { provider: String, detail: String },

    /// The per-request deadline elapsed.
    #[error("{provider}: timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// The service answered with a non-success status.
    #[error("{provider}: HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// The provider library reported an error for the call.
    #[error("{provider}: {detail}")]
    Api { provider: String, detail: String },

    /// The response body did not have the expected shape.
    #[error("{provider}: malformed response: {detail}")]
    MalformedResponse { provider: String, detail: String },

    /// The model reply was not valid JSON.
    #[error("{provider}: reply is not valid JSON: {detail}")]
    InvalidJson { provider: String, detail: String },

    /// The model reply was valid JSON but not an object.
    #[error("{provider}: reply is JSON but not an object (got {kind})")]
    NotAnObject { provider: String, kind: String },

    /// A local tool the provider depends on is missing or crashed.
    #[error("{provider}: unavailable: {detail}")]
    Unavailable { provider: String, detail: String },

    /// The page image could not be encoded for upload.
    #[error("{provider}: image encoding failed: {detail}")]
    Encode { provider: String, detail: String },
}

impl ProviderError {
    /// Name of the provider that produced this error.
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::NotConfigured { provider, .. }
            | ProviderError::Unreachable { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Http { provider, .. }
            | ProviderError::Api { provider, .. }
            | ProviderError::MalformedResponse { provider, .. }
            | ProviderError::InvalidJson { provider, .. }
            | ProviderError::NotAnObject { provider, .. }
            | ProviderError::Unavailable { provider, .. }
            | ProviderError::Encode { provider, .. } => provider,
        }
    }

    /// True when the provider could not be reached or used at all, as
    /// opposed to answering with unusable content.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ProviderError::NotConfigured { .. }
                | ProviderError::Unreachable { .. }
                | ProviderError::Timeout { .. }
                | ProviderError::Api { .. }
                | ProviderError::Unavailable { .. }
        )
    }

    /// Map a `reqwest` transport error onto the taxonomy above.
    pub(crate) fn from_reqwest(provider: &str, err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
                secs: timeout_secs,
            }
        } else if err.is_decode() {
            ProviderError::MalformedResponse {
                provider: provider.to_string(),
                detail: err.to_string(),
            }
        } else {
            ProviderError::Unreachable {
                provider: provider.to_string(),
                detail: err.to_string(),
            }
        }
    }
}

/// Fatal error for a single input file.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The extension is neither PDF nor a supported raster format.
    #[error("Unsupported file type '{path}': expected .pdf, .png, .jpg or .jpeg")]
    UnsupportedFile { path: PathBuf },

    /// The file has a `.pdf` extension but no PDF header.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Image loading errors ──────────────────────────────────────────────
    /// pdfium could not open the document.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The PDF has no pages to render.
    #[error("PDF '{path}' has no pages")]
    EmptyPdf { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install pdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    /// The raster image could not be decoded.
    #[error("Could not decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Worker errors ─────────────────────────────────────────────────────
    /// The background worker could not be started.
    #[error("Worker error: {0}")]
    Worker(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure while writing exported rows.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite export failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Excel export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_vs_garbage() {
        let down = ProviderError::Unreachable {
            provider: "deepseek".into(),
            detail: "connection refused".into(),
        };
        let garbage = ProviderError::InvalidJson {
            provider: "deepseek".into(),
            detail: "expected value at line 1".into(),
        };
        assert!(down.is_unreachable());
        assert!(!garbage.is_unreachable());
        assert_eq!(garbage.provider(), "deepseek");
    }

    #[test]
    fn missing_key_counts_as_unreachable() {
        let e = ProviderError::NotConfigured {
            provider: "openrouter".into(),
            hint: "set OPENROUTER_API_KEY".into(),
        };
        assert!(e.is_unreachable());
        assert!(e.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn http_display() {
        let e = ProviderError::Http {
            provider: "puter".into(),
            status: 503,
            body: "busy".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("503"), "got: {msg}");
        assert!(msg.contains("puter"));
    }

    #[test]
    fn not_a_pdf_display() {
        let e = InvoiceError::NotAPdf {
            path: PathBuf::from("scan.pdf"),
            magic: *b"PK\x03\x04",
        };
        assert!(e.to_string().contains("scan.pdf"));
    }
}
