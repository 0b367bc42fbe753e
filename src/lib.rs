//! # invoice-ai
//!
//! Extract structured fields from scanned invoices (PDF or image) using OCR
//! and LLM providers, with a fallback chain at every network step.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input     validate path, PDF magic check
//!  ├─ 2. Render    first PDF page via pdfium, or decode image (spawn_blocking)
//!  ├─ 3. OCR       DeepSeek vision → Tesseract → Puter (first > 20 chars wins)
//!  ├─ 4. Language  lingua, "unknown" when unsure
//!  ├─ 5. Extract   DeepSeek → OpenRouter (first JSON object wins)
//!  │               else {"raw_text": …, "note": "analysis failed"}
//!  └─ 6. Rows      one {field, value, confidence: "ai"} per key
//! ```
//!
//! Batches run on a background thread ([`BatchWorker`]) that the caller polls,
//! and the accumulated rows can be exported to CSV, Excel, JSON or SQLite
//! (see [`export`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_ai::{InvoiceProcessor, PipelineConfig, ProviderCredentials};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // DEEPSEEK_API_KEY / OPENROUTER_API_KEY from the environment or .env
//!     let config = PipelineConfig::builder()
//!         .credentials(ProviderCredentials::from_env())
//!         .build()?;
//!     let processor = InvoiceProcessor::new(config)?;
//!     let invoice = processor.process(Path::new("invoice.pdf")).await?;
//!     for row in &invoice.rows {
//!         println!("{}: {}", row.field, row.value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-ai` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! invoice-ai = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod providers;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, ProviderCredentials};
pub use error::{ExportError, InvoiceError, ProviderError};
pub use export::{write_csv, write_json, write_sqlite, write_xlsx};
pub use output::{
    AttemptStatus, ExtractedFields, ExtractionOutcome, OcrOutcome, ProcessedInvoice,
    ProviderAttempt, ResultRecord, Row,
};
pub use pipeline::language::{DetectLanguage, LinguaDetector};
pub use process::InvoiceProcessor;
pub use providers::{ExtractionProvider, OcrProvider};
pub use worker::{BatchWorker, WorkerEvent, DEFAULT_POLL_INTERVAL};
