//! Text extraction: direct parse first, OCR as a best-effort upgrade.
//!
//! ## Degrade, don't fail
//!
//! OCR can break in a dozen environment-dependent ways (binary missing,
//! language pack absent, corrupted scan). None of those should kill a task
//! that might still have usable directly-parsed text. Every OCR-stage
//! failure is logged and absorbed; the caller receives the original text
//! with `ocr_used = false` and decides for itself whether an empty result
//! is fatal.

use crate::config::ExtractionConfig;
use crate::error::Pdf2CardsError;
use crate::pipeline::ocr::{self, OcrmypdfProgressParser};
use crate::pipeline::text;
use crate::progress::{ExtractionProgress, ProgressHandle};
use std::path::Path;
use tracing::{info, warn};

/// Everything the extractor recovered from one document.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
    pub ocr_used: bool,
}

/// Recover plain text from `path`, falling back to OCR when the text layer
/// is missing or too thin to be real content.
///
/// Progress events arrive through `progress`; OCR-stage events are
/// throttled per [`ExtractionConfig::progress_interval`].
///
/// # Errors
/// Only [`Pdf2CardsError::CorruptPdf`] — a document whose page structure
/// cannot be read at all. OCR failures degrade (see module docs) and an
/// empty result is returned as such, not as an error.
pub async fn extract(
    path: &Path,
    progress: &ProgressHandle,
    languages: &[String],
    config: &ExtractionConfig,
) -> Result<ExtractedText, Pdf2CardsError> {
    // ── Step 1: Page structure ───────────────────────────────────────────
    let page_count = text::page_count(path).await?;
    info!("PDF has {} pages", page_count);

    progress.on_progress(&ExtractionProgress {
        status: "Parsing text layer".to_string(),
        percent: 0,
        eta_secs: None,
        page_count: Some(page_count),
        current_page: None,
    });

    // ── Step 2: Direct text layer ────────────────────────────────────────
    let direct = text::parse_text_layer(path).await;
    let direct_len = direct.trim().chars().count();
    if direct_len >= config.min_text_len {
        info!("text layer sufficient ({direct_len} chars), skipping OCR");
        progress.on_progress(&ExtractionProgress {
            status: "Text extracted".to_string(),
            percent: 100,
            eta_secs: None,
            page_count: Some(page_count),
            current_page: None,
        });
        return Ok(ExtractedText {
            text: direct,
            page_count,
            ocr_used: false,
        });
    }

    // ── Step 3: OCR fallback ─────────────────────────────────────────────
    info!(
        "text layer too thin ({direct_len} chars < {}), running OCR",
        config.min_text_len
    );

    match run_ocr_stage(path, progress, languages, page_count, config).await {
        Ok(ocr_text) => {
            progress.on_progress(&ExtractionProgress {
                status: "Text extracted".to_string(),
                percent: 100,
                eta_secs: None,
                page_count: Some(page_count),
                current_page: None,
            });
            Ok(ExtractedText {
                text: ocr_text,
                page_count,
                ocr_used: true,
            })
        }
        Err(e) => {
            // Best-effort upgrade only: keep whatever the text layer gave.
            warn!("OCR stage failed, degrading to direct text: {e}");
            Ok(ExtractedText {
                text: direct,
                page_count,
                ocr_used: false,
            })
        }
    }
}

/// Run the OCR subprocess into a temp file and re-parse its output.
async fn run_ocr_stage(
    path: &Path,
    progress: &ProgressHandle,
    languages: &[String],
    page_count: usize,
    config: &ExtractionConfig,
) -> Result<String, Pdf2CardsError> {
    let temp_dir = tempfile::tempdir().map_err(|e| Pdf2CardsError::OcrFailed {
        detail: format!("temp dir: {e}"),
    })?;
    let output = temp_dir.path().join("ocr-output.pdf");

    ocr::run_ocr(
        path,
        &output,
        languages,
        page_count,
        config.max_ocr_pages,
        &OcrmypdfProgressParser,
        progress,
        config.progress_interval,
    )
    .await?;

    Ok(text::parse_text_layer(&output).await)
}
