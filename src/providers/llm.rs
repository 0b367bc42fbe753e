//! Adapters that put any edgequake-llm provider into either fallback chain.
//!
//! The built-in chains cover DeepSeek, Tesseract, Puter and OpenRouter. When
//! the caller names another provider (`openai`, `anthropic`, `ollama`, …) or
//! injects one, it is appended as the last link of both chains: a vision
//! request for OCR, a plain prompt for extraction.

use crate::config::PipelineConfig;
use crate::error::{InvoiceError, ProviderError};
use crate::pipeline::encode;
use crate::prompts;
use crate::providers::{ExtractionProvider, OcrProvider};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Model used when a provider is named without a model.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// Resolve the optional extra provider, from most-specific to least-specific:
/// a pre-built provider, then a named provider created through
/// [`ProviderFactory`]. Returns `None` when neither is configured.
pub fn resolve_llm_provider(
    config: &PipelineConfig,
) -> Result<Option<(String, Arc<dyn LLMProvider>)>, InvoiceError> {
    if let Some(ref provider) = config.llm_provider {
        return Ok(Some(("llm".to_string(), Arc::clone(provider))));
    }

    if let Some(ref name) = config.llm_provider_name {
        let model = config.llm_model.as_deref().unwrap_or(DEFAULT_LLM_MODEL);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            InvoiceError::InvalidConfig(format!("LLM provider '{name}' is not configured: {e}"))
        })?;
        return Ok(Some((format!("llm:{name}"), provider)));
    }

    Ok(None)
}

async fn chat(
    name: &str,
    provider: &Arc<dyn LLMProvider>,
    messages: Vec<ChatMessage>,
    timeout_secs: u64,
) -> Result<String, ProviderError> {
    let options = CompletionOptions::default();
    let call = provider.chat(&messages, Some(&options));
    match timeout(Duration::from_secs(timeout_secs), call).await {
        Ok(Ok(response)) => {
            debug!(
                "{}: {} input tokens, {} output tokens",
                name, response.prompt_tokens, response.completion_tokens
            );
            Ok(response.content)
        }
        Ok(Err(e)) => Err(ProviderError::Api {
            provider: name.to_string(),
            detail: e.to_string(),
        }),
        Err(_) => Err(ProviderError::Timeout {
            provider: name.to_string(),
            secs: timeout_secs,
        }),
    }
}

/// Vision OCR through an edgequake-llm provider.
#[derive(Clone)]
pub struct LlmOcrProvider {
    name: String,
    provider: Arc<dyn LLMProvider>,
    timeout_secs: u64,
}

impl LlmOcrProvider {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LLMProvider>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            provider,
            timeout_secs,
        }
    }
}

#[async_trait]
impl OcrProvider for LlmOcrProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String, ProviderError> {
        let image_data = encode::encode_image_data(image).map_err(|e| ProviderError::Encode {
            provider: self.name.clone(),
            detail: e.to_string(),
        })?;
        // The image carries all the content; the user turn text stays empty.
        let messages = vec![
            ChatMessage::system(prompts::OCR_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        chat(&self.name, &self.provider, messages, self.timeout_secs).await
    }
}

/// Field extraction through an edgequake-llm provider.
#[derive(Clone)]
pub struct LlmExtractionProvider {
    name: String,
    provider: Arc<dyn LLMProvider>,
    timeout_secs: u64,
}

impl LlmExtractionProvider {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LLMProvider>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            provider,
            timeout_secs,
        }
    }
}

#[async_trait]
impl ExtractionProvider for LlmExtractionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, invoice_text: &str) -> Result<String, ProviderError> {
        let messages = vec![ChatMessage::user(prompts::generic_extraction_prompt(
            invoice_text,
        ))];
        chat(&self.name, &self.provider, messages, self.timeout_secs).await
    }
}
