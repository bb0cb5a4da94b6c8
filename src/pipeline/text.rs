//! Direct PDF text-layer recovery.
//!
//! Both operations run under `spawn_blocking`: PDF parsing is CPU-bound and
//! the extractor is called from async tasks that must not stall the runtime.

use crate::error::Pdf2CardsError;
use std::path::Path;
use tracing::warn;

/// Number of pages in the document.
///
/// Fails with [`Pdf2CardsError::CorruptPdf`] when the file cannot be parsed
/// at all — with no page count the pipeline cannot report progress or
/// estimate cost, so this is the one PDF failure that is fatal.
pub async fn page_count(path: &Path) -> Result<usize, Pdf2CardsError> {
    let path_buf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let doc = lopdf::Document::load(&path_buf).map_err(|e| Pdf2CardsError::CorruptPdf {
            path: path_buf.clone(),
            detail: e.to_string(),
        })?;
        Ok(doc.get_pages().len())
    })
    .await
    .map_err(|e| Pdf2CardsError::Internal(format!("join error: {e}")))?
}

/// Text from the PDF's embedded text layer, if any.
///
/// A parse failure here is NOT fatal: scanned documents routinely have
/// structures pdf-extract chokes on, and the OCR fallback handles them.
/// Failure degrades to an empty string.
pub async fn parse_text_layer(path: &Path) -> String {
    let path_buf = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path_buf)).await;

    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("text-layer parse failed, treating as empty: {e}");
            String::new()
        }
        Err(e) => {
            warn!("text-layer parse task panicked: {e}");
            String::new()
        }
    }
}
