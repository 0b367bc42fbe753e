//! Image loading: turn a validated input file into one in-memory bitmap.
//!
//! PDFs are rasterised with pdfium, first page only; raster files are
//! decoded with `image` and converted to RGB. Both paths run inside
//! `spawn_blocking` because decoding a full-page scan is CPU-bound and
//! pdfium is not safe to call from async contexts.

use crate::error::InvoiceError;
use crate::pipeline::input::{InputFile, InputKind};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load the bitmap for `input`, capping PDF renders at `max_pixels` on the
/// longest edge.
pub async fn load_image(input: &InputFile, max_pixels: u32) -> Result<DynamicImage, InvoiceError> {
    let input = input.clone();

    tokio::task::spawn_blocking(move || match input.kind {
        InputKind::Pdf => render_first_page_blocking(&input.path, max_pixels),
        InputKind::Image => decode_image_blocking(&input.path),
    })
    .await
    .map_err(|e| InvoiceError::Internal(format!("Image loading task panicked: {}", e)))?
}

/// Decode a raster image and normalise it to RGB.
fn decode_image_blocking(path: &Path) -> Result<DynamicImage, InvoiceError> {
    let img = image::open(path).map_err(|e| match e {
        image::ImageError::Unsupported(_) => InvoiceError::UnsupportedFile {
            path: path.to_path_buf(),
        },
        image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            InvoiceError::FileNotFound {
                path: path.to_path_buf(),
            }
        }
        other => InvoiceError::ImageDecode {
            path: path.to_path_buf(),
            detail: other.to_string(),
        },
    })?;
    debug!("Decoded {} → {}x{} px", path.display(), img.width(), img.height());
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` when set, else the system library.
fn bind_pdfium() -> Result<Pdfium, InvoiceError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(lib) if !lib.trim().is_empty() => Pdfium::bind_to_library(PathBuf::from(lib)),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| InvoiceError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Rasterise page 1 of a PDF.
fn render_first_page_blocking(pdf_path: &Path, max_pixels: u32) -> Result<DynamicImage, InvoiceError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| InvoiceError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(InvoiceError::EmptyPdf {
            path: pdf_path.to_path_buf(),
        });
    }
    info!("PDF loaded: {} pages, rendering page 1", pages.len());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let page = pages.get(0).map_err(|e| InvoiceError::CorruptPdf {
        path: pdf_path.to_path_buf(),
        detail: format!("{:?}", e),
    })?;

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| InvoiceError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("render failed: {:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!("Rendered page 1 → {}x{} px", image.width(), image.height());
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::resolve_input;
    use image::{Rgba, RgbaImage};

    #[tokio::test]
    async fn png_is_loaded_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(12, 7, Rgba([10, 20, 30, 255])))
            .save(&path)
            .unwrap();

        let input = resolve_input(&path).unwrap();
        let img = load_image(&input, 2000).await.unwrap();
        assert_eq!((img.width(), img.height()), (12, 7));
        assert!(matches!(img, DynamicImage::ImageRgb8(_)));
    }

    #[tokio::test]
    async fn garbage_image_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let input = resolve_input(&path).unwrap();
        let err = load_image(&input, 2000).await.unwrap_err();
        assert!(matches!(
            err,
            InvoiceError::ImageDecode { .. } | InvoiceError::UnsupportedFile { .. }
        ));
    }
}
