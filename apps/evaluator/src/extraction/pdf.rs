use lopdf::Document;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum NativePdfError {
    #[error("failed to read PDF: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("PDF has no pages")]
    NoPages,

    #[error("no text could be extracted from any page")]
    NoText,
}

/// Page-by-page text extraction. A page that fails or is blank is logged and
/// skipped; only a document with no text at all is an error.
///
/// Blocking. Run on the blocking pool.
pub fn extract_text(data: &[u8]) -> Result<String, NativePdfError> {
    let doc = Document::load_mem(data)?;
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(NativePdfError::NoPages);
    }

    let mut extracted = Vec::with_capacity(pages.len());
    for &page_number in pages.keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => extracted.push((page_number, text)),
            Ok(_) => debug!(page = page_number, "No text found on page"),
            Err(e) => warn!(page = page_number, error = %e, "Failed to extract page text"),
        }
    }

    let text = join_pages(&extracted).ok_or(NativePdfError::NoText)?;
    info!(
        pages = pages.len(),
        pages_with_text = extracted.len(),
        chars = text.len(),
        "Extracted text from PDF"
    );
    Ok(text)
}

/// Joins page texts as `--- Page N ---` blocks. `None` when nothing is left.
pub fn join_pages(pages: &[(u32, String)]) -> Option<String> {
    let joined = pages
        .iter()
        .map(|(number, text)| format!("--- Page {number} ---\n{}", text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}
