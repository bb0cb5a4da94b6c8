//! Integration tests for the pdf2cards pipeline.
//!
//! The end-to-end extraction test synthesises a real one-page PDF with
//! lopdf so no fixture files are checked in and no OCR binary is needed —
//! the document has a clean text layer, which is exactly the fast path
//! being asserted. Orchestrator lifecycle tests run against scripted
//! in-memory collaborators; nothing here touches the network.

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf2cards::llm::{ChatApi, ChatOutcome, ChatRequest};
use pdf2cards::task::ports::{
    CostEstimate, DeckBuilder, Messenger, Notice, CALLBACK_ACCEPT, CALLBACK_CANCEL,
};
use pdf2cards::task::store::{PendingTask, TaskStore};
use pdf2cards::{
    extract, split, ExtractionConfig, InMemoryTaskStore, NoopProgress, Pdf2CardsError,
    ProgressHandle, TaskOrchestrator, WordPair,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const SAMPLE_TEXT: &str = "hello world, this is more than fifty characters of text";

/// Write a minimal one-page PDF containing `text` in its text layer.
fn build_test_pdf(path: &Path, text: &str) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save pdf");
}

/// A ChatApi that replays canned responses in order.
struct ScriptedApi {
    responses: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn new(responses: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
        })
    }
}

#[async_trait]
impl ChatApi for ScriptedApi {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatOutcome, Pdf2CardsError> {
        let content = self.responses.lock().unwrap().pop().unwrap_or_default();
        Ok(ChatOutcome {
            content,
            usage: None,
            finish_reason: None,
        })
    }
}

/// Records every outbound messenger call.
#[derive(Default)]
struct RecordingMessenger {
    statuses: Mutex<Vec<String>>,
    notices: Mutex<Vec<Notice>>,
    documents: Mutex<Vec<String>>,
    confirmations: Mutex<Vec<CostEstimate>>,
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_status(&self, _user: i64, text: &str) -> Result<i64, Pdf2CardsError> {
        self.statuses.lock().unwrap().push(text.to_string());
        Ok(1)
    }

    async fn edit_status(&self, _user: i64, _message: i64, text: &str) -> Result<(), Pdf2CardsError> {
        self.statuses.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn request_confirmation(
        &self,
        _user: i64,
        estimate: &CostEstimate,
    ) -> Result<i64, Pdf2CardsError> {
        self.confirmations.lock().unwrap().push(estimate.clone());
        Ok(2)
    }

    async fn send_document(
        &self,
        _user: i64,
        path: &Path,
        file_name: &str,
    ) -> Result<(), Pdf2CardsError> {
        assert!(path.exists(), "document must exist at delivery time");
        self.documents.lock().unwrap().push(file_name.to_string());
        Ok(())
    }

    async fn send_notice(&self, _user: i64, notice: Notice) -> Result<(), Pdf2CardsError> {
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

struct StubDeckBuilder;

#[async_trait]
impl DeckBuilder for StubDeckBuilder {
    async fn build(
        &self,
        _deck_name: &str,
        pairs: &[WordPair],
    ) -> Result<Vec<u8>, Pdf2CardsError> {
        assert!(!pairs.is_empty());
        Ok(b"APKG".to_vec())
    }
}

struct Harness {
    orchestrator: TaskOrchestrator,
    store: Arc<InMemoryTaskStore>,
    messenger: Arc<RecordingMessenger>,
    _data_dir: tempfile::TempDir,
    data_root: PathBuf,
}

fn harness(responses: Vec<&str>) -> Harness {
    let data_dir = tempfile::tempdir().unwrap();
    let data_root = data_dir.path().to_path_buf();
    let config = ExtractionConfig::builder()
        .chat_client(ScriptedApi::new(responses))
        .data_dir(&data_root)
        .min_pairs_warning(0)
        .build()
        .unwrap();
    let store = Arc::new(InMemoryTaskStore::default());
    let messenger = Arc::new(RecordingMessenger::default());
    let orchestrator = TaskOrchestrator::new(
        config,
        Arc::clone(&store) as Arc<dyn TaskStore>,
        Arc::clone(&messenger) as Arc<dyn Messenger>,
        Arc::new(StubDeckBuilder),
    )
    .unwrap();
    Harness {
        orchestrator,
        store,
        messenger,
        _data_dir: data_dir,
        data_root,
    }
}

fn pending_task(dir: &Path, text: &str) -> PendingTask {
    let file_path = dir.join("upload.pdf");
    std::fs::write(&file_path, b"%PDF-1.4 fake body").unwrap();
    PendingTask {
        file_path,
        file_name: "szavak.pdf".to_string(),
        extracted_text: text.to_string(),
        message_id: 1,
        page_count: 2,
        ocr_used: false,
        file_hash: Some("cafebabe".to_string()),
    }
}

// ── Extraction end to end ────────────────────────────────────────────────────

#[tokio::test]
async fn text_layer_pdf_extracts_without_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("sample.pdf");
    build_test_pdf(&pdf_path, SAMPLE_TEXT);

    let config = ExtractionConfig::default();
    let progress = Arc::new(NoopProgress) as ProgressHandle;
    let result = extract(&pdf_path, &progress, &config.languages, &config)
        .await
        .expect("extraction should succeed");

    assert_eq!(result.page_count, 1);
    assert!(!result.ocr_used, "text layer must satisfy the threshold");
    assert!(
        result.text.contains("more than fifty characters"),
        "got: {:?}",
        result.text
    );
}

#[tokio::test]
async fn extracted_text_chunks_to_one_with_large_budget() {
    let chunks = split("gpt-4o-mini", SAMPLE_TEXT, Some(100_000));
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, SAMPLE_TEXT);
}

#[test]
fn chunk_concatenation_is_lossless_for_multi_paragraph_text() {
    let text = (0..40)
        .map(|i| format!("Paragraph number {i} with a handful of words in it."))
        .collect::<Vec<_>>()
        .join("\n\n");
    let chunks = split("gpt-4o-mini", &text, Some(30));
    assert!(chunks.len() > 1);

    let rebuilt: String = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let normalise = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    assert_eq!(normalise(&rebuilt), normalise(&text));
}

#[tokio::test]
async fn line_fallback_extracts_single_pair() {
    let config = ExtractionConfig::builder()
        .chat_client(ScriptedApi::new(vec!["kutya - dog"]))
        .min_pairs_warning(0)
        .build()
        .unwrap();
    let completion = pdf2cards::CompletionLayer::from_config(&config).unwrap();
    let pairs = pdf2cards::extract_pairs(&completion, &config, "kutya - dog", "Hungarian", "English")
        .await
        .unwrap();
    assert_eq!(pairs, vec![WordPair::new("kutya", "dog")]);
}

// ── Task lifecycle ───────────────────────────────────────────────────────────

#[tokio::test]
async fn accept_processes_and_removes_task() {
    let h = harness(vec![r#"[{"front":"kutya","back":"dog"},{"front":"ház","back":"house"}]"#]);
    let upload_dir = tempfile::tempdir().unwrap();
    let task = pending_task(upload_dir.path(), "A kutya a házban van.");
    let uploaded_file = task.file_path.clone();
    h.store.put(7, task).await;

    h.orchestrator
        .handle_callback(7, CALLBACK_ACCEPT, "Hungarian", "English")
        .await
        .unwrap();

    // Task consumed, uploaded file reclaimed, deck delivered.
    assert!(h.store.get(7).await.is_none());
    assert!(!uploaded_file.exists());
    assert_eq!(
        *h.messenger.documents.lock().unwrap(),
        ["szavak.apkg"]
    );
    assert!(h.messenger.notices.lock().unwrap().is_empty());
    // No new confirmation is requested once processing starts.
    assert!(h.messenger.confirmations.lock().unwrap().is_empty());

    // The status message walked through processing to the final count.
    let statuses = h.messenger.statuses.lock().unwrap();
    assert!(statuses.iter().any(|s| s.contains("part 1/1")));
    assert!(statuses.iter().any(|s| s.contains("2 cards")));

    // A hash record was persisted for the fast path.
    let record_path = h
        .data_root
        .join("users")
        .join("7")
        .join("cafebabe.json");
    assert!(record_path.exists(), "hash record must be persisted");
    assert!(h.data_root.join("users/7/cafebabe.txt").exists());
}

#[tokio::test]
async fn accept_dedupes_across_chunks() {
    // Two chunks (tiny budget), both mentioning "kutya" with different
    // translations: the merge keeps the first.
    let h = {
        let data_dir = tempfile::tempdir().unwrap();
        let data_root = data_dir.path().to_path_buf();
        let config = ExtractionConfig::builder()
            .chat_client(ScriptedApi::new(vec![
                r#"[{"front":"kutya","back":"dog"},{"front":"alma","back":"apple"}]"#,
                r#"[{"front":"Kutya","back":"hound"},{"front":"ház","back":"house"}]"#,
            ]))
            .data_dir(&data_root)
            .max_chunk_tokens(12)
            .min_pairs_warning(0)
            .build()
            .unwrap();
        let store = Arc::new(InMemoryTaskStore::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let orchestrator = TaskOrchestrator::new(
            config,
            Arc::clone(&store) as Arc<dyn TaskStore>,
            Arc::clone(&messenger) as Arc<dyn Messenger>,
            Arc::new(StubDeckBuilder),
        )
        .unwrap();
        Harness {
            orchestrator,
            store,
            messenger,
            _data_dir: data_dir,
            data_root,
        }
    };

    let upload_dir = tempfile::tempdir().unwrap();
    let text = "Az első bekezdés szavakkal teli mondata.\n\nA második bekezdés további szavakat hoz.";
    h.store.put(7, pending_task(upload_dir.path(), text)).await;

    h.orchestrator
        .handle_accept(7, "Hungarian", "English")
        .await
        .unwrap();

    let statuses = h.messenger.statuses.lock().unwrap();
    assert!(statuses.iter().any(|s| s.contains("part 2/2")));
    // 4 raw pairs, one duplicate front across chunks → 3 cards.
    assert!(statuses.iter().any(|s| s.contains("3 cards")), "statuses: {statuses:?}");
}

#[tokio::test]
async fn cancel_removes_task_and_file() {
    let h = harness(vec![]);
    let upload_dir = tempfile::tempdir().unwrap();
    let task = pending_task(upload_dir.path(), "szöveg");
    let uploaded_file = task.file_path.clone();
    h.store.put(7, task).await;

    h.orchestrator
        .handle_callback(7, CALLBACK_CANCEL, "Hungarian", "English")
        .await
        .unwrap();

    assert!(h.store.get(7).await.is_none());
    assert!(!uploaded_file.exists());
    assert_eq!(*h.messenger.notices.lock().unwrap(), [Notice::Cancelled]);
}

#[tokio::test]
async fn accept_without_task_reports_expired() {
    let h = harness(vec![]);
    h.orchestrator
        .handle_accept(7, "Hungarian", "English")
        .await
        .unwrap();
    assert_eq!(*h.messenger.notices.lock().unwrap(), [Notice::TaskExpired]);
    assert!(h.messenger.documents.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_without_task_reports_expired() {
    let h = harness(vec![]);
    h.orchestrator.handle_cancel(7).await.unwrap();
    assert_eq!(*h.messenger.notices.lock().unwrap(), [Notice::TaskExpired]);
}

#[tokio::test]
async fn second_accept_reports_expired() {
    let h = harness(vec![r#"[{"front":"kutya","back":"dog"}]"#]);
    let upload_dir = tempfile::tempdir().unwrap();
    h.store.put(7, pending_task(upload_dir.path(), "A kutya.")).await;

    h.orchestrator.handle_accept(7, "Hungarian", "English").await.unwrap();
    h.orchestrator.handle_accept(7, "Hungarian", "English").await.unwrap();

    assert_eq!(*h.messenger.notices.lock().unwrap(), [Notice::TaskExpired]);
    assert_eq!(h.messenger.documents.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failing_model_call_fails_processing_with_notice() {
    struct FailingApi;

    #[async_trait]
    impl ChatApi for FailingApi {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatOutcome, Pdf2CardsError> {
            Err(Pdf2CardsError::ChatApiError {
                message: "HTTP 500".to_string(),
            })
        }
    }

    let data_dir = tempfile::tempdir().unwrap();
    let config = ExtractionConfig::builder()
        .chat_client(Arc::new(FailingApi))
        .data_dir(data_dir.path())
        .build()
        .unwrap();
    let store = Arc::new(InMemoryTaskStore::default());
    let messenger = Arc::new(RecordingMessenger::default());
    let orchestrator = TaskOrchestrator::new(
        config,
        Arc::clone(&store) as Arc<dyn TaskStore>,
        Arc::clone(&messenger) as Arc<dyn Messenger>,
        Arc::new(StubDeckBuilder),
    )
    .unwrap();

    let upload_dir = tempfile::tempdir().unwrap();
    let task = pending_task(upload_dir.path(), "Valami szöveg a dokumentumból.");
    let uploaded_file = task.file_path.clone();
    store.put(7, task).await;

    orchestrator.handle_accept(7, "Hungarian", "English").await.unwrap();

    assert_eq!(
        *messenger.notices.lock().unwrap(),
        [Notice::ProcessingFailed]
    );
    assert!(messenger.documents.lock().unwrap().is_empty());
    // The file is still reclaimed on failure.
    assert!(!uploaded_file.exists());
    assert!(store.get(7).await.is_none());
}
