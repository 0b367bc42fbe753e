//! Input validation: check a user-supplied path and decide how to load it.
//!
//! PDFs are recognised by extension and confirmed by their `%PDF` magic
//! bytes, so a mislabelled file gets a clear error instead of a pdfium
//! failure. Everything else is handed to the raster decoder.

use crate::error::InvoiceError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How an input file is turned into a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Rasterise the first page with pdfium.
    Pdf,
    /// Decode with the `image` crate.
    Image,
}

/// A validated local input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub kind: InputKind,
}

impl InputFile {
    /// Base name shown in the result table, e.g. `invoice_07.pdf`.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

/// Base name of a path, falling back to the full path when there is none.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Classify by extension (case-insensitive).
pub fn kind_of(path: &Path) -> InputKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => InputKind::Pdf,
        _ => InputKind::Image,
    }
}

/// Validate that `path` exists, is readable and, for PDFs, starts with `%PDF`.
pub fn resolve_input(path: &Path) -> Result<InputFile, InvoiceError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(InvoiceError::FileNotFound { path });
    }

    let kind = kind_of(&path);

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if kind == InputKind::Pdf {
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(InvoiceError::NotAPdf { path, magic });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(InvoiceError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(InvoiceError::FileNotFound { path });
        }
    }

    debug!("Resolved input {:?}: {}", kind, path.display());
    Ok(InputFile { path, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn kind_is_case_insensitive() {
        assert_eq!(kind_of(Path::new("a/INVOICE.PDF")), InputKind::Pdf);
        assert_eq!(kind_of(Path::new("scan.jpeg")), InputKind::Image);
        assert_eq!(kind_of(Path::new("noext")), InputKind::Image);
    }

    #[test]
    fn missing_file() {
        let err = resolve_input(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, InvoiceError::FileNotFound { .. }));
    }

    #[test]
    fn pdf_magic_is_checked() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"PK\x03\x04 not a pdf").unwrap();
        let err = resolve_input(tmp.path()).unwrap_err();
        assert!(matches!(err, InvoiceError::NotAPdf { .. }));

        let mut ok = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        ok.write_all(b"%PDF-1.7\n").unwrap();
        let input = resolve_input(ok.path()).unwrap();
        assert_eq!(input.kind, InputKind::Pdf);
        assert!(input.file_name().ends_with(".pdf"));
    }
}
