//! OCR subprocess driver and stderr progress parsing.
//!
//! Shells out to `ocrmypdf`, which writes per-page progress to stderr as it
//! works. The stderr stream is consumed line-by-line while the parent task
//! awaits process exit, so a 50-page scan produces live progress instead of
//! a silent multi-minute stall.
//!
//! ## The stderr contract
//!
//! Progress extraction matches the tool's exact log wording — "Processing
//! pages X through Y" and "Page N" — which is a version-fragile textual
//! contract with one specific external tool. It therefore lives behind the
//! [`ProgressParser`] trait: an alternate OCR engine (or a future ocrmypdf
//! that re-words its logs) supplies its own parser without touching the
//! subprocess plumbing.
//!
//! There is deliberately no timeout on the child process; OCR time scales
//! with page count and killing a slow-but-working run helps nobody.

use crate::error::Pdf2CardsError;
use crate::progress::{ExtractionProgress, ProgressHandle, ProgressThrottle};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// A progress signal recovered from one stderr line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrProgressEvent {
    /// The tool announced the page range it is about to process.
    RangeStarted { first: usize, last: usize },
    /// One page finished.
    PageDone(usize),
}

/// Turns an OCR tool's stderr lines into progress events.
pub trait ProgressParser: Send + Sync {
    fn parse_line(&self, line: &str) -> Option<OcrProgressEvent>;
}

static RE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)processing\s+pages\s+(\d+)\s+through\s+(\d+)").unwrap());

static RE_PAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpage\s+(\d+)\b").unwrap());

/// Parser for ocrmypdf's stderr wording.
pub struct OcrmypdfProgressParser;

impl ProgressParser for OcrmypdfProgressParser {
    fn parse_line(&self, line: &str) -> Option<OcrProgressEvent> {
        if let Some(caps) = RE_RANGE.captures(line) {
            let first = caps[1].parse().ok()?;
            let last = caps[2].parse().ok()?;
            return Some(OcrProgressEvent::RangeStarted { first, last });
        }
        if let Some(caps) = RE_PAGE.captures(line) {
            return Some(OcrProgressEvent::PageDone(caps[1].parse().ok()?));
        }
        None
    }
}

/// Run OCR over `input`, writing the text-bearing PDF to `output`.
///
/// Emits throttled progress through `progress`. Returns `Err` on spawn
/// failure or a non-zero exit; the caller (the text extractor) absorbs that
/// error and degrades to the directly-parsed text.
#[allow(clippy::too_many_arguments)]
pub async fn run_ocr(
    input: &Path,
    output: &Path,
    languages: &[String],
    total_pages: usize,
    max_pages: usize,
    parser: &dyn ProgressParser,
    progress: &ProgressHandle,
    throttle_interval: Duration,
) -> Result<(), Pdf2CardsError> {
    let page_limit = total_pages.min(max_pages).max(1);

    let mut child = Command::new("ocrmypdf")
        .arg("--force-ocr")
        .arg("--output-type")
        .arg("pdf")
        .arg("-l")
        .arg(languages.join("+"))
        .arg("--pages")
        .arg(format!("1-{page_limit}"))
        .arg(input)
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Pdf2CardsError::OcrFailed {
            detail: format!("failed to spawn ocrmypdf: {e}"),
        })?;

    let stderr = child.stderr.take().ok_or_else(|| Pdf2CardsError::OcrFailed {
        detail: "ocrmypdf stderr was not captured".to_string(),
    })?;

    let mut lines = LinesStream::new(BufReader::new(stderr).lines());
    let mut throttle = ProgressThrottle::new(throttle_interval);
    let mut done_pages: HashSet<usize> = HashSet::new();
    let started = Instant::now();

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("stderr read error: {e}");
                break;
            }
        };
        debug!(target: "ocrmypdf", "{line}");

        match parser.parse_line(&line) {
            Some(OcrProgressEvent::RangeStarted { first, last }) => {
                if throttle.allow(false) {
                    progress.on_progress(&ExtractionProgress {
                        status: format!("OCR pages {first}-{last}"),
                        percent: 0,
                        eta_secs: None,
                        page_count: Some(page_limit),
                        current_page: None,
                    });
                }
            }
            Some(OcrProgressEvent::PageDone(page)) => {
                done_pages.insert(page);
                let done = done_pages.len().min(page_limit);
                let percent = (done * 100 / page_limit) as u8;
                let remaining = page_limit.saturating_sub(done);
                let eta_secs = if done > 0 && remaining > 0 {
                    Some(started.elapsed().as_secs() * remaining as u64 / done as u64)
                } else {
                    None
                };
                if throttle.allow(done == page_limit) {
                    progress.on_progress(&ExtractionProgress {
                        status: "OCR".to_string(),
                        percent,
                        eta_secs,
                        page_count: Some(page_limit),
                        current_page: Some(page),
                    });
                }
            }
            None => {}
        }
    }

    let status = child.wait().await.map_err(|e| Pdf2CardsError::OcrFailed {
        detail: format!("failed to await ocrmypdf: {e}"),
    })?;

    if !status.success() {
        return Err(Pdf2CardsError::OcrFailed {
            detail: format!("ocrmypdf exited with {status}"),
        });
    }

    Ok(())
}
