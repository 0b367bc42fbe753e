//! Pipeline stages for invoice processing.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr ──▶ language ──▶ extract ──▶ rows
//! (path)   (bitmap)   (text)   (ISO code)   (fields)   (table)
//! ```
//!
//! 1. [`input`]    — validate the path and classify it as PDF or raster image
//! 2. [`render`]   — first PDF page via pdfium, or decode the image; runs in
//!    `spawn_blocking`
//! 3. [`ocr`]      — ordered OCR providers; first text over the threshold wins
//! 4. [`language`] — best-effort language code, `"unknown"` when unsure
//! 5. [`extract`]  — ordered LLM providers; first JSON object wins, else a
//!    raw-text envelope
//! 6. [`rows`]     — inject `language` and flatten fields into rows
//!
//! [`encode`] holds the PNG/base64 helpers the vision providers share.

pub mod encode;
pub mod extract;
pub mod input;
pub mod language;
pub mod ocr;
pub mod render;
pub mod rows;
