//! Content-hash cache over processed documents.
//!
//! Re-uploading the same file is common (the user lost the deck, or wants a
//! different language pairing) and extraction — especially OCR — is the
//! expensive part. Each processed document leaves a [`HashRecord`] under
//! `<root>/users/<user_id>/<hash>.json` with a sibling `<hash>.txt` holding
//! the extracted text, so a repeat upload skips straight to the cost
//! estimate.
//!
//! Writes are atomic (temp file + rename): a crash mid-write must not leave
//! a record without its text blob pointing the fast path at garbage.

use crate::error::Pdf2CardsError;
use crate::task::ports::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// SHA-256 of the file content, hex-encoded.
pub async fn hash_file(path: &Path) -> Result<String, Pdf2CardsError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Pdf2CardsError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Cache entry for one processed (user, document) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashRecord {
    pub hash: String,
    pub user_id: UserId,
    pub processed_at: DateTime<Utc>,
    pub word_pair_count: usize,
    pub page_count: usize,
    pub ocr_used: bool,
}

/// Disk-backed store of [`HashRecord`]s and their extracted-text blobs.
#[derive(Debug, Clone)]
pub struct HashRecordStore {
    root: PathBuf,
}

impl HashRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn user_dir(&self, user: UserId) -> PathBuf {
        self.root.join("users").join(user.to_string())
    }

    fn record_path(&self, user: UserId, hash: &str) -> PathBuf {
        self.user_dir(user).join(format!("{hash}.json"))
    }

    fn text_path(&self, user: UserId, hash: &str) -> PathBuf {
        self.user_dir(user).join(format!("{hash}.txt"))
    }

    /// Fetch the record and its extracted text.
    ///
    /// Returns `None` unless BOTH files read and the record parses — a
    /// half-written or hand-deleted cache entry is a miss, not an error.
    pub async fn lookup(&self, user: UserId, hash: &str) -> Option<(HashRecord, String)> {
        let record_bytes = tokio::fs::read(self.record_path(user, hash)).await.ok()?;
        let record: HashRecord = serde_json::from_slice(&record_bytes).ok()?;
        let text = tokio::fs::read_to_string(self.text_path(user, hash)).await.ok()?;
        debug!(user, hash, "hash-record cache hit");
        Some((record, text))
    }

    /// Persist a record with its sibling text blob.
    pub async fn save(&self, record: &HashRecord, text: &str) -> Result<(), Pdf2CardsError> {
        let dir = self.user_dir(record.user_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Pdf2CardsError::io(&dir, e))?;

        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| Pdf2CardsError::Internal(format!("record serialise: {e}")))?;

        // Text first: a record whose blob is missing would satisfy lookup's
        // record read and then miss anyway, but never the reverse.
        atomic_write(&self.text_path(record.user_id, &record.hash), text.as_bytes()).await?;
        atomic_write(&self.record_path(record.user_id, &record.hash), &body).await?;
        Ok(())
    }
}

/// Write to a temp path, then rename into place.
async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), Pdf2CardsError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| Pdf2CardsError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Pdf2CardsError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: UserId, hash: &str) -> HashRecord {
        HashRecord {
            hash: hash.to_string(),
            user_id: user,
            processed_at: Utc::now(),
            word_pair_count: 42,
            page_count: 3,
            ocr_used: true,
        }
    }

    #[tokio::test]
    async fn hash_is_stable_hex() {
        let f = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(f.path(), b"hello").unwrap();
        let h1 = hash_file(f.path()).await.unwrap();
        let h2 = hash_file(f.path()).await.unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn save_then_lookup_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashRecordStore::new(dir.path());
        let rec = record(7, "abc123");

        store.save(&rec, "the extracted text").await.unwrap();

        let (found, text) = store.lookup(7, "abc123").await.unwrap();
        assert_eq!(found.word_pair_count, 42);
        assert_eq!(found.page_count, 3);
        assert!(found.ocr_used);
        assert_eq!(text, "the extracted text");
    }

    #[tokio::test]
    async fn lookup_misses_for_unknown_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashRecordStore::new(dir.path());
        assert!(store.lookup(7, "nope").await.is_none());
    }

    #[tokio::test]
    async fn lookup_is_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashRecordStore::new(dir.path());
        store.save(&record(7, "abc"), "text").await.unwrap();
        assert!(store.lookup(8, "abc").await.is_none());
    }

    #[tokio::test]
    async fn record_without_text_blob_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashRecordStore::new(dir.path());
        store.save(&record(7, "abc"), "text").await.unwrap();
        tokio::fs::remove_file(store.text_path(7, "abc")).await.unwrap();
        assert!(store.lookup(7, "abc").await.is_none());
    }
}
