//! Prompts sent to the OCR and extraction models.
//!
//! Kept in one place so prompt changes never touch provider or chain code,
//! and so tests can inspect them without a live model.

/// System prompt for vision-model OCR.
pub const OCR_SYSTEM_PROMPT: &str = "Extract all text from the image.";

/// Extraction prompt used with DeepSeek.
pub fn deepseek_extraction_prompt(invoice_text: &str) -> String {
    format!(
        "You are an expert document analysis assistant. \
Given the full invoice text below, identify and extract all relevant fields \
(such as invoice number, dates, totals, parties, payment details, line items, taxes, etc.) \
and return a single JSON object with key:value pairs for each field you find.\n\n{}",
        invoice_text
    )
}

/// Extraction prompt used with OpenRouter and any extra LLM provider.
pub fn generic_extraction_prompt(invoice_text: &str) -> String {
    format!(
        "You are a very smart invoice parser. Analyze the following invoice text and automatically \
extract every meaningful field you can find; no predefined list is required. \
Return your output as a single JSON object (key:value pairs).\n\n{}",
        invoice_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_end_with_invoice_text() {
        let text = "Invoice #123 Total: $45.00";
        assert!(deepseek_extraction_prompt(text).ends_with(text));
        assert!(generic_extraction_prompt(text).ends_with(text));
        assert!(generic_extraction_prompt(text).contains("JSON object"));
    }
}
