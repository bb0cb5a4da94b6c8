//! External collaborators of the task orchestrator, as traits.
//!
//! The orchestrator never talks to a chat platform, a deck serialiser, or an
//! error tracker directly — each is a `Send + Sync` trait object the host
//! application injects. This keeps the state machine testable with scripted
//! fakes and keeps platform concerns (menu routing, translation of the
//! notices below, keyboard rendering) entirely outside this crate.

use crate::error::Pdf2CardsError;
use crate::pipeline::pairs::WordPair;
use async_trait::async_trait;
use std::path::Path;

/// Host-platform user identifier.
pub type UserId = i64;

/// Host-platform message identifier (for in-place status edits).
pub type MessageId = i64;

/// Callback token the host routes to [`accept`](crate::task::TaskOrchestrator::handle_callback).
pub const CALLBACK_ACCEPT: &str = "process_pdf_accept";

/// Callback token the host routes to cancel.
pub const CALLBACK_CANCEL: &str = "process_pdf_cancel";

/// Metadata for an uploaded document, as provided by the host platform.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub file_size: u64,
    /// Direct download URL for the file content.
    pub download_url: String,
}

/// What processing the uploaded document is expected to cost.
///
/// Shown to the user before any model call is made.
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub page_count: usize,
    pub estimated_tokens: u64,
    pub estimated_cost_usd: f64,
    pub ocr_used: bool,
    /// True when the extraction came from the hash-record cache.
    pub cached: bool,
}

/// Semantic outcomes the host renders (and translates) for the user.
///
/// Deliberately not strings: UI text and translation-table lookup are the
/// host's problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The upload was rejected (too large, not a PDF, download failed).
    UploadRejected,
    /// No text could be recovered from the document.
    ExtractionFailed,
    /// Accept/cancel arrived but no pending task exists for the user.
    TaskExpired,
    /// Processing started but could not be completed.
    ProcessingFailed,
    /// The task was cancelled at the user's request.
    Cancelled,
}

/// Outbound messaging surface of the host platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a fresh status message, returning its id for later edits.
    async fn send_status(&self, user: UserId, text: &str) -> Result<MessageId, Pdf2CardsError>;

    /// Edit a previously sent status message in place.
    async fn edit_status(
        &self,
        user: UserId,
        message: MessageId,
        text: &str,
    ) -> Result<(), Pdf2CardsError>;

    /// Show the cost estimate with Accept/Cancel actions wired to
    /// [`CALLBACK_ACCEPT`] and [`CALLBACK_CANCEL`].
    async fn request_confirmation(
        &self,
        user: UserId,
        estimate: &CostEstimate,
    ) -> Result<MessageId, Pdf2CardsError>;

    /// Deliver a file to the user.
    async fn send_document(
        &self,
        user: UserId,
        path: &Path,
        file_name: &str,
    ) -> Result<(), Pdf2CardsError>;

    /// Deliver a semantic notice (host translates and renders it).
    async fn send_notice(&self, user: UserId, notice: Notice) -> Result<(), Pdf2CardsError>;
}

/// Turns a deduplicated pair list into a binary deck package.
#[async_trait]
pub trait DeckBuilder: Send + Sync {
    async fn build(
        &self,
        deck_name: &str,
        pairs: &[WordPair],
    ) -> Result<Vec<u8>, Pdf2CardsError>;
}

/// Error-tracking sink. Full detail goes here; the user gets a generic
/// notice.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, error: &Pdf2CardsError);
}
