//! Provider seams for the two fallback chains.
//!
//! Every OCR backend implements [`OcrProvider`] and every extraction backend
//! implements [`ExtractionProvider`]. Each call returns a typed
//! `Result<String, ProviderError>`; deciding whether an answer is good enough
//! and what to try next is the chain's job, not the provider's.
//!
//! ## Built-in providers
//!
//! | Module | Provider | Chain |
//! |--------|----------|-------|
//! | [`chat`] | DeepSeek vision chat | OCR |
//! | [`tesseract`] | local `tesseract` binary | OCR |
//! | [`puter`] | Puter `img2txt` | OCR |
//! | [`chat`] | DeepSeek / OpenRouter chat | extraction |
//! | [`llm`] | any edgequake-llm provider | both (optional tail) |

use crate::error::ProviderError;
use async_trait::async_trait;
use image::DynamicImage;

pub mod chat;
pub mod llm;
pub mod puter;
pub mod tesseract;

pub use chat::{ChatCompletionsClient, ChatExtractionProvider, ChatOcrProvider};
pub use llm::{LlmExtractionProvider, LlmOcrProvider};
pub use puter::PuterOcrProvider;
pub use tesseract::TesseractOcrProvider;

/// Turns a bitmap into text.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Short label used in logs and attempt records.
    fn name(&self) -> &str;

    async fn recognize(&self, image: &DynamicImage) -> Result<String, ProviderError>;
}

/// Turns invoice text into a model reply that should contain a JSON object.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Short label used in logs and attempt records.
    fn name(&self) -> &str;

    async fn extract(&self, invoice_text: &str) -> Result<String, ProviderError>;
}
