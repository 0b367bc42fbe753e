//! Per-file processing: the entry point that strings the pipeline stages
//! together for one invoice.
//!
//! An [`InvoiceProcessor`] is built once from a [`PipelineConfig`] and then
//! shared (it is `Send + Sync`) by whoever drives the batch. Provider
//! failures never fail a file: the OCR chain degrades to empty text and the
//! extraction chain to the raw-text envelope. Only problems with the file
//! itself (missing, unreadable, undecodable) surface as [`InvoiceError`].

use crate::config::PipelineConfig;
use crate::error::InvoiceError;
use crate::output::ProcessedInvoice;
use crate::pipeline::extract::ExtractionChain;
use crate::pipeline::language::{DetectLanguage, LinguaDetector};
use crate::pipeline::ocr::OcrChain;
use crate::pipeline::{input, render, rows};
use crate::prompts;
use crate::providers::{
    llm, ChatCompletionsClient, ChatExtractionProvider, ChatOcrProvider, ExtractionProvider,
    LlmExtractionProvider, LlmOcrProvider, OcrProvider, PuterOcrProvider, TesseractOcrProvider,
};
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct InvoiceProcessor {
    ocr: OcrChain,
    extraction: ExtractionChain,
    detector: Arc<dyn DetectLanguage>,
    max_rendered_pixels: u32,
}

impl InvoiceProcessor {
    /// Build the provider chains.
    ///
    /// Custom chains in `config` replace the defaults wholesale. Otherwise the
    /// OCR chain is DeepSeek vision → Tesseract → Puter and the extraction
    /// chain is DeepSeek → OpenRouter, each followed by the optional
    /// edgequake-llm provider.
    pub fn new(config: PipelineConfig) -> Result<Self, InvoiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| InvoiceError::Internal(format!("HTTP client: {}", e)))?;

        let extra = llm::resolve_llm_provider(&config)?;

        let ocr_providers: Vec<Arc<dyn OcrProvider>> = if config.ocr_providers.is_empty() {
            let mut chain: Vec<Arc<dyn OcrProvider>> = vec![
                Arc::new(ChatOcrProvider::new(ChatCompletionsClient::deepseek(
                    &config,
                    http.clone(),
                ))),
                Arc::new(TesseractOcrProvider::from_config(&config)),
                Arc::new(PuterOcrProvider::from_config(&config, http.clone())),
            ];
            if let Some((ref name, ref provider)) = extra {
                chain.push(Arc::new(LlmOcrProvider::new(
                    name.clone(),
                    Arc::clone(provider),
                    config.api_timeout_secs,
                )));
            }
            chain
        } else {
            config.ocr_providers.clone()
        };

        let extraction_providers: Vec<Arc<dyn ExtractionProvider>> =
            if config.extraction_providers.is_empty() {
                let mut chain: Vec<Arc<dyn ExtractionProvider>> = vec![
                    Arc::new(ChatExtractionProvider::new(
                        ChatCompletionsClient::deepseek(&config, http.clone()),
                        prompts::deepseek_extraction_prompt,
                    )),
                    Arc::new(ChatExtractionProvider::new(
                        ChatCompletionsClient::openrouter(&config, http.clone()),
                        prompts::generic_extraction_prompt,
                    )),
                ];
                if let Some((name, provider)) = extra {
                    chain.push(Arc::new(LlmExtractionProvider::new(
                        name,
                        provider,
                        config.api_timeout_secs,
                    )));
                }
                chain
            } else {
                config.extraction_providers.clone()
            };

        let detector: Arc<dyn DetectLanguage> = match config.language_detector {
            Some(ref d) => Arc::clone(d),
            None => Arc::new(LinguaDetector::new()),
        };

        let processor = Self {
            ocr: OcrChain::new(ocr_providers, config.ocr_min_chars),
            extraction: ExtractionChain::new(extraction_providers, config.raw_text_limit),
            detector,
            max_rendered_pixels: config.max_rendered_pixels,
        };
        info!(
            "OCR chain: [{}]; extraction chain: [{}]",
            processor.ocr_provider_names().join(", "),
            processor.extraction_provider_names().join(", ")
        );
        Ok(processor)
    }

    pub fn ocr_provider_names(&self) -> Vec<&str> {
        self.ocr.provider_names()
    }

    pub fn extraction_provider_names(&self) -> Vec<&str> {
        self.extraction.provider_names()
    }

    /// Process one invoice file end to end.
    ///
    /// # Errors
    /// Only file-level problems: not found, permission denied, unsupported
    /// type, corrupt PDF or undecodable image.
    pub async fn process(&self, path: &Path) -> Result<ProcessedInvoice, InvoiceError> {
        let start = Instant::now();
        let input = input::resolve_input(path)?;
        let file_name = input.file_name();
        info!("Processing {}", file_name);

        let image = render::load_image(&input, self.max_rendered_pixels).await?;
        let invoice = self.process_image(file_name, image).await;

        info!(
            "Processed {} in {}ms: {} rows",
            invoice.file_name,
            start.elapsed().as_millis(),
            invoice.rows.len()
        );
        Ok(invoice)
    }

    /// Run OCR, language detection, extraction and row building on an
    /// already-loaded bitmap. Never fails.
    pub async fn process_image(&self, file_name: String, image: DynamicImage) -> ProcessedInvoice {
        let ocr = self.ocr.run(&image).await;

        let language = self.detector.detect_or_unknown(&ocr.text);
        debug!("{}: language {}", file_name, language);

        let extraction = self.extraction.run(&ocr.text).await;
        let mut fields = extraction.fields;
        let rows = rows::build_rows(&mut fields, &language);

        ProcessedInvoice {
            file_name,
            image,
            ocr,
            language,
            fields,
            extraction_provider: extraction.provider,
            extraction_attempts: extraction.attempts,
            rows,
        }
    }

    /// Synchronous wrapper around [`InvoiceProcessor::process`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn process_sync(&self, path: &Path) -> Result<ProcessedInvoice, InvoiceError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredentials;

    #[test]
    fn default_chains_are_in_fallback_order() {
        let config = PipelineConfig::builder()
            .credentials(ProviderCredentials::default())
            .build()
            .unwrap();
        let p = InvoiceProcessor::new(config).unwrap();
        assert_eq!(p.ocr_provider_names(), vec!["deepseek", "tesseract", "puter"]);
        assert_eq!(p.extraction_provider_names(), vec!["deepseek", "openrouter"]);
    }

    #[tokio::test]
    async fn missing_file_is_a_file_error() {
        let p = InvoiceProcessor::new(PipelineConfig::default()).unwrap();
        let err = p
            .process(Path::new("/definitely/not/here/invoice.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::FileNotFound { .. }));
    }
}
