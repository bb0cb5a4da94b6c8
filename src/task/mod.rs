//! Per-user task handling: storage, caching, collaborator seams, and the
//! orchestrating state machine.
//!
//! 1. [`ports`]        — traits for the host platform (messaging, deck
//!    building, error tracking) plus the callback tokens it routes
//! 2. [`store`]        — the single-slot pending-task map with TTL
//! 3. [`hash`]         — the content-hash extraction cache on disk
//! 4. [`orchestrator`] — upload → confirm → process → deliver

pub mod hash;
pub mod orchestrator;
pub mod ports;
pub mod store;

pub use orchestrator::TaskOrchestrator;
pub use ports::{
    CostEstimate, DeckBuilder, DocumentUpload, ErrorReporter, MessageId, Messenger, Notice,
    UserId, CALLBACK_ACCEPT, CALLBACK_CANCEL,
};
pub use store::{InMemoryTaskStore, PendingTask, TaskStore};
