//! CLI binary for pdf2cards.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, renders extraction progress, and writes the
//! `word_pairs.json` artifact consumed by the deck-builder script.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2cards::{
    dedupe_pairs, extract, extract_pairs, split, CompletionLayer, ExtractProgress,
    ExtractionConfig, ExtractionProgress, ProgressHandle, WordPair,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a single percent-based bar driven by extraction
/// events. OCR events already arrive throttled, so the bar never thrashes.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExtractProgress for CliProgress {
    fn on_progress(&self, progress: &ExtractionProgress) {
        self.bar.set_position(progress.percent as u64);
        let mut msg = progress.status.clone();
        if let (Some(current), Some(total)) = (progress.current_page, progress.page_count) {
            msg.push_str(&format!("  {}", dim(&format!("page {current}/{total}"))));
        }
        if let Some(eta) = progress.eta_secs {
            msg.push_str(&format!("  {}", dim(&format!("~{eta}s left"))));
        }
        self.bar.set_message(msg);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract Hungarian vocabulary with English translations
  pdf2cards szavak.pdf

  # Scanned document: OCR with Hungarian + English language packs
  pdf2cards scan.pdf --ocr-languages hun,eng

  # Different language pairing and model
  pdf2cards woerter.pdf --learning-language German --native-language English --model gpt-4o

  # Only recover the text, no model calls
  pdf2cards scan.pdf --extract-only

ENVIRONMENT:
  OPENAI_API_KEY   API key for the chat endpoint (required unless --extract-only)
  RUST_LOG         Log filter, e.g. RUST_LOG=pdf2cards=debug"#;

/// Extract bilingual word pairs from a PDF into word_pairs.json.
#[derive(Parser, Debug)]
#[command(name = "pdf2cards", version, about, after_help = AFTER_HELP)]
struct Cli {
    /// Input PDF file.
    input: PathBuf,

    /// Output path for the word-pairs JSON artifact.
    #[arg(short, long, default_value = "word_pairs.json")]
    output: PathBuf,

    /// Language the vocabulary is being learned (card fronts).
    #[arg(long, default_value = "Hungarian")]
    learning_language: String,

    /// Language the translations are in (card backs).
    #[arg(long, default_value = "English")]
    native_language: String,

    /// Chat model to use.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// OCR language codes, comma-separated (tesseract names).
    #[arg(long, value_delimiter = ',', default_value = "eng")]
    ocr_languages: Vec<String>,

    /// Override the per-chunk token budget.
    #[arg(long)]
    max_chunk_tokens: Option<usize>,

    /// Sampling temperature for extraction calls.
    #[arg(long, default_value_t = 0.3)]
    temperature: f32,

    /// Stop after text recovery and print the text to stdout.
    #[arg(long)]
    extract_only: bool,

    /// Verbose logging (same as RUST_LOG=pdf2cards=debug).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "pdf2cards=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let mut builder = ExtractionConfig::builder()
        .model(cli.model.clone())
        .languages(cli.ocr_languages.clone())
        .temperature(cli.temperature);
    if let Some(budget) = cli.max_chunk_tokens {
        builder = builder.max_chunk_tokens(budget);
    }
    let config = builder.build().context("invalid configuration")?;

    pdf2cards::pipeline::input::validate_pdf_file(&cli.input, config.max_file_size)
        .context("input validation failed")?;

    // ── Extract ──────────────────────────────────────────────────────────
    let progress = CliProgress::new();
    let result = extract(
        &cli.input,
        &(Arc::clone(&progress) as ProgressHandle),
        &config.languages,
        &config,
    )
    .await
    .context("text extraction failed")?;
    progress.finish();

    eprintln!(
        "{} {} pages, {} chars recovered{}",
        green("✔"),
        bold(&result.page_count.to_string()),
        result.text.len(),
        if result.ocr_used { dim("  (via OCR)") } else { String::new() },
    );

    if result.text.trim().is_empty() {
        eprintln!("{} no text could be recovered from this document", red("✘"));
        return Err(pdf2cards::Pdf2CardsError::NoTextRecovered {
            path: cli.input.clone(),
            page_count: result.page_count,
        }
        .into());
    }

    if cli.extract_only {
        println!("{}", result.text);
        return Ok(());
    }

    // ── Chunk ────────────────────────────────────────────────────────────
    let chunks = split(&config.model, &result.text, config.max_chunk_tokens);
    eprintln!(
        "{} {} chunk(s) within the token budget",
        cyan("◆"),
        bold(&chunks.len().to_string())
    );

    // ── Extract pairs, chunk by chunk ────────────────────────────────────
    let completion = CompletionLayer::from_config(&config).context(
        "chat client unavailable (is OPENAI_API_KEY set? use --extract-only to skip)",
    )?;

    let mut all_pairs: Vec<WordPair> = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        eprint!(
            "  {} part {}/{} ({} tokens)… ",
            cyan("▸"),
            index + 1,
            chunks.len(),
            chunk.token_count
        );
        let found = extract_pairs(
            &completion,
            &config,
            &chunk.text,
            &cli.learning_language,
            &cli.native_language,
        )
        .await
        .context("chat completion failed")?;
        eprintln!("{}", green(&format!("{} pairs", found.len())));
        all_pairs.extend(found);
    }

    let merged = dedupe_pairs(all_pairs);
    if merged.is_empty() {
        eprintln!("{} the model found no usable word pairs", red("✘"));
        std::process::exit(1);
    }

    // ── Write the artifact ───────────────────────────────────────────────
    let body = serde_json::to_string_pretty(&merged)?;
    std::fs::write(&cli.output, body)
        .with_context(|| format!("writing {}", cli.output.display()))?;

    eprintln!(
        "{} {} unique cards → {}",
        green("✔"),
        bold(&merged.len().to_string()),
        cli.output.display()
    );
    Ok(())
}
