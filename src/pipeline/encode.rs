//! Image encoding: `DynamicImage` → PNG bytes, base64, data URL, or
//! edgequake-llm `ImageData`.
//!
//! Every network OCR provider uploads the page as PNG. Lossless encoding
//! keeps small print and digits crisp; JPEG artefacts around glyphs cost
//! more recognition accuracy than the bytes they save.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode an image as base64 PNG.
pub fn encode_base64_png(img: &DynamicImage) -> Result<String, image::ImageError> {
    let b64 = STANDARD.encode(encode_png(img)?);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(b64)
}

/// Encode an image as a `data:image/png;base64,…` URL for OpenAI-style
/// multimodal messages.
pub fn encode_data_url(img: &DynamicImage) -> Result<String, image::ImageError> {
    Ok(format!("data:image/png;base64,{}", encode_base64_png(img)?))
}

/// Encode an image as edgequake-llm `ImageData` with high detail, so the
/// vision model sees fine print.
pub fn encode_image_data(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    Ok(ImageData::new(encode_base64_png(img)?, "image/png").with_detail("high"))
}
