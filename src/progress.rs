//! Progress events for text extraction.
//!
//! Inject an [`Arc<dyn ExtractProgress>`] into
//! [`crate::pipeline::extract::extract`] to receive real-time events while the
//! text layer is parsed and, when needed, while the OCR subprocess grinds
//! through pages.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least-invasive integration point: callers can forward
//! events to a message edit on a chat platform, a terminal progress bar, or a
//! log line — without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because events are emitted from
//! the async stderr-reader task.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A snapshot of extraction progress.
///
/// Transient: emitted through the callback and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionProgress {
    /// Human-oriented stage label, e.g. "Parsing text layer" or "OCR".
    pub status: String,
    /// Completion estimate, 0–100.
    pub percent: u8,
    /// Estimated seconds until the current stage finishes, when known.
    pub eta_secs: Option<u64>,
    /// Total pages in the document, when known.
    pub page_count: Option<usize>,
    /// Page currently being processed (1-indexed), when known.
    pub current_page: Option<usize>,
}

impl ExtractionProgress {
    /// A bare status + percent event with no page information.
    pub fn stage(status: impl Into<String>, percent: u8) -> Self {
        Self {
            status: status.into(),
            percent: percent.min(100),
            eta_secs: None,
            page_count: None,
            current_page: None,
        }
    }
}

/// Receives [`ExtractionProgress`] events from the extractor.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractProgress: Send + Sync {
    /// Called whenever the extractor has something new to report.
    ///
    /// Events arrive at most once per
    /// [`crate::config::ExtractionConfig::progress_interval`], except for
    /// terminal (100 %) events which always pass the throttle.
    fn on_progress(&self, progress: &ExtractionProgress) {
        let _ = progress;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl ExtractProgress for NoopProgress {}

/// Convenience alias matching the type accepted by the extractor.
pub type ProgressHandle = Arc<dyn ExtractProgress>;

/// Rate limiter for progress emission.
///
/// OCR produces one stderr line per page; forwarding each of them as a
/// message edit would hit platform rate limits immediately. The throttle
/// passes the first event, then one per interval, and always passes events
/// marked final.
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Returns true when an event may be emitted now, recording the emission.
    ///
    /// `is_final` bypasses the interval check so the 100 % event is never
    /// swallowed.
    pub fn allow(&mut self, is_final: bool) -> bool {
        let now = Instant::now();
        let due = match self.last_emit {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due || is_final {
            self.last_emit = Some(now);
            true
        } else {
            false
        }
    }
}
