//! AI extraction fallback chain.
//!
//! Each provider's reply must parse as a JSON object; whatever object comes
//! back is accepted as-is, with no schema check. Models often wrap the object
//! in a Markdown code fence (` ```json ... ``` `), so one surrounding fence is
//! stripped before parsing and such a reply is accepted instead of falling
//! through. Prose around the fence is still invalid JSON. Transport errors, invalid
//! JSON and non-object JSON all fall through to the next provider. When
//! every provider fails the chain returns the fallback envelope
//! `{"raw_text": <truncated input>, "note": "analysis failed"}`.

use crate::error::ProviderError;
use crate::output::{AttemptStatus, ExtractedFields, ExtractionOutcome, ProviderAttempt};
use crate::providers::ExtractionProvider;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Marker stored under `note` in the fallback envelope.
pub const ANALYSIS_FAILED_NOTE: &str = "analysis failed";

pub struct ExtractionChain {
    providers: Vec<Arc<dyn ExtractionProvider>>,
    raw_text_limit: usize,
}

impl ExtractionChain {
    pub fn new(providers: Vec<Arc<dyn ExtractionProvider>>, raw_text_limit: usize) -> Self {
        Self {
            providers,
            raw_text_limit,
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn run(&self, invoice_text: &str) -> ExtractionOutcome {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name().to_string();
            debug!("Extraction: trying {}", name);

            let result = match provider.extract(invoice_text).await {
                Ok(reply) => parse_reply(&name, &reply),
                Err(e) => Err(e),
            };

            match result {
                Ok(fields) => {
                    info!("Extraction: {} returned {} fields", name, fields.len());
                    attempts.push(ProviderAttempt {
                        provider: name.clone(),
                        status: AttemptStatus::Accepted,
                    });
                    return ExtractionOutcome {
                        fields,
                        provider: Some(name),
                        attempts,
                    };
                }
                Err(e) => {
                    warn!("Extraction: {} failed: {}", name, e);
                    attempts.push(ProviderAttempt {
                        provider: name,
                        status: AttemptStatus::Failed(e),
                    });
                }
            }
        }

        warn!("Extraction: all providers failed, returning raw text envelope");
        ExtractionOutcome {
            fields: fallback_fields(invoice_text, self.raw_text_limit),
            provider: None,
            attempts,
        }
    }
}

// A reply wrapped in a single ```json … ``` fence.
static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Parse a model reply into fields.
///
/// The reply is trimmed and one surrounding Markdown code fence is removed;
/// the rest must be a JSON object.
pub fn parse_reply(provider: &str, reply: &str) -> Result<ExtractedFields, ProviderError> {
    let trimmed = reply.trim();
    let body = RE_JSON_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let value: Value = serde_json::from_str(body).map_err(|e| ProviderError::InvalidJson {
        provider: provider.to_string(),
        detail: e.to_string(),
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ProviderError::NotAnObject {
            provider: provider.to_string(),
            kind: json_kind(&other).to_string(),
        }),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The envelope returned when no provider produced usable JSON: the first
/// `limit` characters of the input and a failure note.
pub fn fallback_fields(invoice_text: &str, limit: usize) -> ExtractedFields {
    let mut fields = ExtractedFields::new();
    fields.insert(
        "raw_text".to_string(),
        Value::String(invoice_text.chars().take(limit).collect()),
    );
    fields.insert(
        "note".to_string(),
        Value::String(ANALYSIS_FAILED_NOTE.to_string()),
    );
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object_parses_in_order() {
        let f = parse_reply("p", r#"{"invoice_number":"123","total":"45.00"}"#).unwrap();
        let keys: Vec<&String> = f.keys().collect();
        assert_eq!(keys, vec!["invoice_number", "total"]);
    }

    #[test]
    fn fenced_object_parses() {
        let reply = "```json\n{\"vendor\": \"ACME\", \"lines\": [1, 2]}\n```";
        let f = parse_reply("p", reply).unwrap();
        assert_eq!(f["vendor"], "ACME");
        let bare_fence = "```\n{\"a\": 1}\n```";
        assert_eq!(parse_reply("p", bare_fence).unwrap()["a"], 1);
    }

    #[test]
    fn prose_is_invalid_json() {
        let err = parse_reply("p", "Sure! Here are the fields: total=45").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidJson { .. }));
        assert!(!err.is_unreachable());
    }

    #[test]
    fn array_is_not_an_object() {
        let err = parse_reply("p", r#"[{"total":"45.00"}]"#).unwrap_err();
        assert_eq!(
            err,
            ProviderError::NotAnObject {
                provider: "p".into(),
                kind: "array".into()
            }
        );
    }

    #[test]
    fn fallback_truncates_by_chars() {
        let text = "ü".repeat(2500);
        let f = fallback_fields(&text, 2000);
        assert_eq!(f["raw_text"].as_str().unwrap().chars().count(), 2000);
        assert_eq!(f["note"], ANALYSIS_FAILED_NOTE);
        let keys: Vec<&String> = f.keys().collect();
        assert_eq!(keys, vec!["raw_text", "note"]);
    }
}
