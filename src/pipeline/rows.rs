//! Row building: flatten extracted fields into `{field, value, confidence}`
//! rows for display and export.

use crate::output::{ExtractedFields, Row, AI_CONFIDENCE};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use std::io;

/// Key under which the detected language is stored.
pub const LANGUAGE_FIELD: &str = "language";

/// Insert `language` into `fields` unless the model already supplied one.
pub fn ensure_language(fields: &mut ExtractedFields, detected: &str) {
    if !fields.contains_key(LANGUAGE_FIELD) {
        fields.insert(
            LANGUAGE_FIELD.to_string(),
            Value::String(detected.to_string()),
        );
    }
}

/// Single-line JSON with `", "` and `": "` separators.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Display form of a field value: strings verbatim, everything else as
/// single-line JSON with spaced separators (`[{"a": 1, "b": 2}]`) and
/// non-ASCII kept as-is.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => spaced_json(other).unwrap_or_else(|| other.to_string()),
    }
}

fn spaced_json(value: &Value) -> Option<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser).ok()?;
    String::from_utf8(buf).ok()
}

/// Ensure `language` is present, then emit one row per key in insertion
/// order.
pub fn build_rows(fields: &mut ExtractedFields, detected_language: &str) -> Vec<Row> {
    ensure_language(fields, detected_language);
    fields
        .iter()
        .map(|(field, value)| Row {
            field: field.clone(),
            value: stringify_value(value),
            confidence: AI_CONFIDENCE.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> ExtractedFields {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn language_appended_last_when_absent() {
        let mut f = fields(json!({"invoice_number": "123", "total": "45.00"}));
        let rows = build_rows(&mut f, "en");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].field, "language");
        assert_eq!(rows[2].value, "en");
        assert!(rows.iter().all(|r| r.confidence == "ai"));
        assert!(f.contains_key("language"));
    }

    #[test]
    fn model_language_is_kept() {
        let mut f = fields(json!({"language": "de", "total": 10}));
        let rows = build_rows(&mut f, "en");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, "de");
    }

    #[test]
    fn nested_values_become_json() {
        let mut f = fields(json!({
            "total": 45.5,
            "paid": false,
            "items": [{"desc": "Café", "qty": 2}],
            "po": null
        }));
        let rows = build_rows(&mut f, "fr");
        assert_eq!(rows[0].value, "45.5");
        assert_eq!(rows[1].value, "false");
        assert_eq!(rows[2].value, r#"[{"desc": "Café", "qty": 2}]"#);
        assert_eq!(rows[3].value, "null");
    }

    #[test]
    fn nested_object_uses_spaced_separators() {
        let v = json!({"vendor": {"name": "Müller GmbH", "tags": ["a", "b"]}, "empty": []});
        assert_eq!(
            stringify_value(&v),
            r#"{"vendor": {"name": "Müller GmbH", "tags": ["a", "b"]}, "empty": []}"#
        );
    }
}
