//! OCR fallback chain.
//!
//! Providers are asked in order; the first one whose text is strictly longer
//! than the threshold wins and later providers are never called. A provider
//! error or a too-short answer just moves on to the next provider. When
//! nothing qualifies the chain yields empty text; it never fails.

use crate::output::{AttemptStatus, OcrOutcome, ProviderAttempt};
use crate::providers::OcrProvider;
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct OcrChain {
    providers: Vec<Arc<dyn OcrProvider>>,
    min_chars: usize,
}

impl OcrChain {
    pub fn new(providers: Vec<Arc<dyn OcrProvider>>, min_chars: usize) -> Self {
        Self {
            providers,
            min_chars,
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn run(&self, image: &DynamicImage) -> OcrOutcome {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name().to_string();
            debug!("OCR: trying {}", name);

            match provider.recognize(image).await {
                Ok(text) => {
                    let chars = text.chars().count();
                    if chars > self.min_chars {
                        info!("OCR: accepted {} chars from {}", chars, name);
                        attempts.push(ProviderAttempt {
                            provider: name.clone(),
                            status: AttemptStatus::Accepted,
                        });
                        return OcrOutcome {
                            text,
                            provider: Some(name),
                            attempts,
                        };
                    }
                    warn!(
                        "OCR: {} returned {} chars (need more than {}), trying next",
                        name, chars, self.min_chars
                    );
                    attempts.push(ProviderAttempt {
                        provider: name,
                        status: AttemptStatus::TooShort { chars },
                    });
                }
                Err(e) => {
                    warn!("OCR: {} failed: {}", name, e);
                    attempts.push(ProviderAttempt {
                        provider: name,
                        status: AttemptStatus::Failed(e),
                    });
                }
            }
        }

        warn!("OCR: no provider produced usable text");
        OcrOutcome {
            text: String::new(),
            provider: None,
            attempts,
        }
    }
}
