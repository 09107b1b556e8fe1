//! Page text extraction via pdfium.
//!
//! pdfium keeps thread-local state and blocks, so extraction runs inside
//! `tokio::task::spawn_blocking`. Pages are numbered 1..=n in document
//! order. A page without a text layer (a pure scan) or whose text cannot be
//! read yields an empty string; only document-level failures are errors.

use crate::document::Page;
use crate::error::ClaimsError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Extract the text of every page of the PDF at `pdf_path`.
pub async fn extract_pages(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<Page>, ClaimsError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_pages_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ClaimsError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Bind pdfium: `PDFIUM_LIB_PATH` when set, otherwise the system library.
fn bind_pdfium() -> Result<Pdfium, ClaimsError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(lib) if !lib.is_empty() => Pdfium::bind_to_library(&lib),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ClaimsError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of text extraction.
fn extract_pages_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<Page>, ClaimsError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut out = Vec::with_capacity(pages.len() as usize);
    for (index, page) in pages.iter().enumerate() {
        let page_number = index as u32 + 1;
        let text = match page.text() {
            Ok(text) => text.all(),
            Err(e) => {
                warn!("Page {}: no readable text ({:?})", page_number, e);
                String::new()
            }
        };
        debug!("Page {}: {} chars of text", page_number, text.chars().count());
        out.push(Page::new(page_number, text));
    }

    Ok(out)
}

fn load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> ClaimsError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            ClaimsError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            ClaimsError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        ClaimsError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail,
        }
    }
}
