//! Per-user task state machine: upload → confirm → process → deliver.
//!
//! One orchestrator instance serves all users; per-user state lives in the
//! [`TaskStore`] as at most one [`PendingTask`] each. The flow:
//!
//! ```text
//! upload ──▶ download + hash ──▶ cache? ──▶ cost estimate (Accept/Cancel)
//!                │ miss                          │accept         │cancel
//!                └─▶ extract (live status edits) │               └─▶ delete file
//!                                                ▼
//!                         chunk ─▶ pairs ×N (sequential) ─▶ merge ─▶ deck ─▶ deliver
//! ```
//!
//! Chunks are processed strictly sequentially: progress edits stay monotonic
//! and the model API sees at most one in-flight call per task. Cancellation
//! is honoured only while the task is awaiting confirmation — accepting
//! consumes the task atomically, so a cancel arriving mid-processing finds
//! nothing and reports expiry.
//!
//! Failure policy: user-recoverable problems (bad upload, empty extraction)
//! become [`Notice`]s and the task dies quietly; full detail goes to the
//! [`ErrorReporter`]. Only messenger failures propagate to the host's event
//! loop — if we cannot talk to the user there is nobody to notify.

use crate::config::ExtractionConfig;
use crate::error::Pdf2CardsError;
use crate::llm::estimate_processing_cost;
use crate::pipeline::completion::CompletionLayer;
use crate::pipeline::pairs::{self, WordPair};
use crate::pipeline::{chunk, extract, input};
use crate::progress::{ExtractProgress, ExtractionProgress, ProgressHandle};
use crate::task::hash::{hash_file, HashRecord, HashRecordStore};
use crate::task::ports::{
    CostEstimate, DeckBuilder, DocumentUpload, ErrorReporter, MessageId, Messenger, Notice, UserId,
    CALLBACK_ACCEPT, CALLBACK_CANCEL,
};
use crate::task::store::{PendingTask, TaskStore};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives the document-to-deck flow for every user.
pub struct TaskOrchestrator {
    config: ExtractionConfig,
    completion: CompletionLayer,
    store: Arc<dyn TaskStore>,
    records: HashRecordStore,
    messenger: Arc<dyn Messenger>,
    deck_builder: Arc<dyn DeckBuilder>,
    error_reporter: Option<Arc<dyn ErrorReporter>>,
}

impl TaskOrchestrator {
    pub fn new(
        config: ExtractionConfig,
        store: Arc<dyn TaskStore>,
        messenger: Arc<dyn Messenger>,
        deck_builder: Arc<dyn DeckBuilder>,
    ) -> Result<Self, Pdf2CardsError> {
        let completion = CompletionLayer::from_config(&config)?;
        let records = HashRecordStore::new(config.data_dir.clone());
        Ok(Self {
            config,
            completion,
            store,
            records,
            messenger,
            deck_builder,
            error_reporter: None,
        })
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = Some(reporter);
        self
    }

    fn downloads_dir(&self) -> PathBuf {
        self.config.data_dir.join("downloads")
    }

    fn decks_dir(&self) -> PathBuf {
        self.config.data_dir.join("decks")
    }

    fn report(&self, context: &str, error: &Pdf2CardsError) {
        warn!("{context}: {error}");
        if let Some(reporter) = &self.error_reporter {
            reporter.report(context, error);
        }
    }

    // ── Upload ───────────────────────────────────────────────────────────

    /// Handle a document upload: download, hash, extract (or reuse the
    /// cached extraction), and put up the cost estimate.
    pub async fn handle_upload(
        &self,
        user: UserId,
        upload: &DocumentUpload,
    ) -> Result<(), Pdf2CardsError> {
        if upload.file_size > self.config.max_file_size {
            info!(user, size = upload.file_size, "rejecting oversized upload");
            return self.messenger.send_notice(user, Notice::UploadRejected).await;
        }

        let status_id = self
            .messenger
            .send_status(user, "Downloading document…")
            .await?;

        let file_path = match input::download_document(
            &upload.download_url,
            &self.downloads_dir(),
            self.config.max_file_size,
        )
        .await
        {
            Ok(path) => path,
            Err(e) => {
                self.report("upload: download", &e);
                return self.messenger.send_notice(user, Notice::UploadRejected).await;
            }
        };

        let file_hash = match hash_file(&file_path).await {
            Ok(h) => h,
            Err(e) => {
                self.report("upload: hash", &e);
                cleanup_file(&file_path).await;
                return self.messenger.send_notice(user, Notice::ProcessingFailed).await;
            }
        };

        // Fast path: this user already processed this exact file.
        if let Some((record, text)) = self.records.lookup(user, &file_hash).await {
            info!(user, hash = %file_hash, "extraction cache hit");
            self.messenger
                .edit_status(user, status_id, "Already extracted — using cached text")
                .await?;
            return self
                .offer_confirmation(
                    user,
                    status_id,
                    file_path,
                    upload,
                    text,
                    record.page_count,
                    record.ocr_used,
                    file_hash,
                    true,
                )
                .await;
        }

        // Slow path: full extraction with live status edits.
        let progress: ProgressHandle = Arc::new(StatusEditProgress {
            messenger: Arc::clone(&self.messenger),
            user,
            message_id: status_id,
        });

        let extracted = match extract::extract(
            &file_path,
            &progress,
            &self.config.languages,
            &self.config,
        )
        .await
        {
            Ok(x) => x,
            Err(e) => {
                self.report("upload: extract", &e);
                cleanup_file(&file_path).await;
                return self.messenger.send_notice(user, Notice::ExtractionFailed).await;
            }
        };

        if extracted.text.trim().is_empty() {
            info!(user, "extraction produced no text, aborting task");
            cleanup_file(&file_path).await;
            return self.messenger.send_notice(user, Notice::ExtractionFailed).await;
        }

        self.offer_confirmation(
            user,
            status_id,
            file_path,
            upload,
            extracted.text,
            extracted.page_count,
            extracted.ocr_used,
            file_hash,
            false,
        )
        .await
    }

    /// Show the cost estimate and park the task until accept/cancel.
    #[allow(clippy::too_many_arguments)]
    async fn offer_confirmation(
        &self,
        user: UserId,
        status_id: MessageId,
        file_path: PathBuf,
        upload: &DocumentUpload,
        extracted_text: String,
        page_count: usize,
        ocr_used: bool,
        file_hash: String,
        cached: bool,
    ) -> Result<(), Pdf2CardsError> {
        let estimated_tokens = chunk::estimator_for(self.completion.model())
            .estimate(&extracted_text) as u64;
        let estimate = CostEstimate {
            page_count,
            estimated_tokens,
            estimated_cost_usd: estimate_processing_cost(self.completion.model(), estimated_tokens),
            ocr_used,
            cached,
        };
        self.messenger.request_confirmation(user, &estimate).await?;

        let task = PendingTask {
            file_path,
            file_name: upload.file_name.clone(),
            extracted_text,
            message_id: status_id,
            page_count,
            ocr_used,
            file_hash: Some(file_hash),
        };

        if let Some(previous) = self.store.put(user, task).await {
            // The user re-uploaded before resolving the earlier task; its
            // file would otherwise leak.
            info!(user, "replacing pending task, reclaiming its file");
            cleanup_file(&previous.file_path).await;
        }
        Ok(())
    }

    // ── Callbacks ────────────────────────────────────────────────────────

    /// Route an opaque callback token from the host platform.
    pub async fn handle_callback(
        &self,
        user: UserId,
        data: &str,
        learning_language: &str,
        user_language: &str,
    ) -> Result<(), Pdf2CardsError> {
        match data {
            CALLBACK_ACCEPT => self.handle_accept(user, learning_language, user_language).await,
            CALLBACK_CANCEL => self.handle_cancel(user).await,
            other => {
                debug!(user, data = other, "ignoring unknown callback");
                Ok(())
            }
        }
    }

    /// The user accepted the cost estimate: run the extraction pipeline to
    /// completion and deliver the deck.
    pub async fn handle_accept(
        &self,
        user: UserId,
        learning_language: &str,
        user_language: &str,
    ) -> Result<(), Pdf2CardsError> {
        // Consuming the task here is what makes cancellation impossible
        // once processing starts.
        let Some(task) = self.store.delete(user).await else {
            return self.messenger.send_notice(user, Notice::TaskExpired).await;
        };

        let outcome = self
            .process_task(user, &task, learning_language, user_language)
            .await;
        cleanup_file(&task.file_path).await;

        match outcome {
            Ok(card_count) => {
                info!(user, card_count, "deck delivered");
                Ok(())
            }
            Err(e) => {
                self.report("processing", &e);
                self.messenger.send_notice(user, Notice::ProcessingFailed).await
            }
        }
    }

    /// The user declined: drop the task and its file, nothing else.
    pub async fn handle_cancel(&self, user: UserId) -> Result<(), Pdf2CardsError> {
        match self.store.delete(user).await {
            None => self.messenger.send_notice(user, Notice::TaskExpired).await,
            Some(task) => {
                info!(user, "task cancelled");
                cleanup_file(&task.file_path).await;
                self.messenger.send_notice(user, Notice::Cancelled).await
            }
        }
    }

    // ── Processing ───────────────────────────────────────────────────────

    async fn process_task(
        &self,
        user: UserId,
        task: &PendingTask,
        learning_language: &str,
        user_language: &str,
    ) -> Result<usize, Pdf2CardsError> {
        let chunks = chunk::split(
            self.completion.model(),
            &task.extracted_text,
            self.config.max_chunk_tokens,
        );
        let total = chunks.len();
        info!(user, chunks = total, "processing accepted task");

        let mut all_pairs: Vec<WordPair> = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            self.messenger
                .edit_status(
                    user,
                    task.message_id,
                    &format!("Extracting words… part {}/{}", index + 1, total),
                )
                .await?;
            let found = pairs::extract_pairs(
                &self.completion,
                &self.config,
                &chunk.text,
                learning_language,
                user_language,
            )
            .await?;
            debug!(user, chunk = index + 1, found = found.len(), "chunk done");
            all_pairs.extend(found);
        }

        // Cross-chunk merge under the same canonical dedup policy.
        let merged = pairs::dedupe_pairs(all_pairs);
        if merged.is_empty() {
            return Err(Pdf2CardsError::MalformedModelOutput {
                detail: "no valid word pairs in any chunk".to_string(),
            });
        }

        // Cache the extraction for future fast-path uploads. A cache write
        // failure must not cost the user their deck.
        if let Some(hash) = &task.file_hash {
            let record = HashRecord {
                hash: hash.clone(),
                user_id: user,
                processed_at: Utc::now(),
                word_pair_count: merged.len(),
                page_count: task.page_count,
                ocr_used: task.ocr_used,
            };
            if let Err(e) = self.records.save(&record, &task.extracted_text).await {
                self.report("hash-record save", &e);
            }
        }

        let deck_name = deck_name_from(&task.file_name);
        let buffer = self.deck_builder.build(&deck_name, &merged).await?;

        let decks_dir = self.decks_dir();
        tokio::fs::create_dir_all(&decks_dir)
            .await
            .map_err(|e| Pdf2CardsError::io(&decks_dir, e))?;
        let deck_path = decks_dir.join(format!("{}.apkg", uuid::Uuid::new_v4()));
        tokio::fs::write(&deck_path, &buffer)
            .await
            .map_err(|e| Pdf2CardsError::io(&deck_path, e))?;

        let delivery = self
            .messenger
            .send_document(user, &deck_path, &format!("{deck_name}.apkg"))
            .await;
        cleanup_file(&deck_path).await;
        delivery?;

        self.messenger
            .edit_status(
                user,
                task.message_id,
                &format!("Done — {} cards in your deck", merged.len()),
            )
            .await?;

        Ok(merged.len())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Best-effort file removal; a leftover temp file is worth a log line, not
/// a failed task.
async fn cleanup_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove '{}': {e}", path.display());
        }
    }
}

/// Deck name from the uploaded file name, minus the extension.
fn deck_name_from(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .trim();
    if stem.is_empty() {
        "Vocabulary".to_string()
    } else {
        stem.to_string()
    }
}

/// Forwards extraction progress into in-place status-message edits.
///
/// `on_progress` is synchronous; the edit is fired as a detached task. The
/// extractor's throttle bounds the spawn rate, and a lost edit only costs
/// one intermediate percentage.
struct StatusEditProgress {
    messenger: Arc<dyn Messenger>,
    user: UserId,
    message_id: MessageId,
}

impl ExtractProgress for StatusEditProgress {
    fn on_progress(&self, progress: &ExtractionProgress) {
        let text = format_progress(progress);
        let messenger = Arc::clone(&self.messenger);
        let user = self.user;
        let message_id = self.message_id;
        tokio::spawn(async move {
            if let Err(e) = messenger.edit_status(user, message_id, &text).await {
                debug!("progress edit dropped: {e}");
            }
        });
    }
}

fn format_progress(p: &ExtractionProgress) -> String {
    let mut text = format!("{} — {}%", p.status, p.percent);
    if let (Some(current), Some(total)) = (p.current_page, p.page_count) {
        text.push_str(&format!(" (page {current}/{total})"));
    }
    if let Some(eta) = p.eta_secs {
        text.push_str(&format!(", ~{eta}s left"));
    }
    text
}
