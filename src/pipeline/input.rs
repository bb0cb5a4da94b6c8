//! Upload resolution: validate a local PDF or download one from the host
//! platform's file URL.
//!
//! ## Why not a TempDir?
//!
//! The task orchestrator owns the downloaded file's whole lifecycle — it
//! must survive across the upload → confirm → process conversation, and is
//! deleted explicitly on completion, cancellation, or overwrite. Automatic
//! scope-based cleanup would delete it while the user is still staring at
//! the confirmation keyboard. Files land in a managed downloads directory
//! with random names and we validate the `%PDF` magic bytes before
//! returning so callers get a meaningful error rather than a parser crash.

use crate::error::Pdf2CardsError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Validate that `path` is a readable PDF within the size cap.
pub fn validate_pdf_file(path: &Path, max_size: u64) -> Result<(), Pdf2CardsError> {
    let metadata = std::fs::metadata(path).map_err(|_| Pdf2CardsError::FileNotFound {
        path: path.to_path_buf(),
    })?;

    if metadata.len() > max_size {
        return Err(Pdf2CardsError::FileTooLarge {
            size: metadata.len(),
            limit: max_size,
        });
    }

    let mut magic = [0u8; 4];
    {
        use std::io::Read;
        let mut f = std::fs::File::open(path).map_err(|_| Pdf2CardsError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
            return Err(Pdf2CardsError::NotAPdf {
                path: path.to_path_buf(),
                magic,
            });
        }
    }

    debug!("validated PDF: {}", path.display());
    Ok(())
}

/// Download a document into `downloads_dir` and return its path.
///
/// The caller owns the file from here on and must delete it when the task
/// ends. Size is checked twice: the declared `Content-Length` up front (so
/// an oversized upload is rejected before transfer) and the actual byte
/// count after.
pub async fn download_document(
    url: &str,
    downloads_dir: &Path,
    max_size: u64,
) -> Result<PathBuf, Pdf2CardsError> {
    info!("downloading document from: {url}");

    tokio::fs::create_dir_all(downloads_dir)
        .await
        .map_err(|e| Pdf2CardsError::io(downloads_dir, e))?;

    let response = reqwest::get(url).await.map_err(|e| Pdf2CardsError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(Pdf2CardsError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(declared) = response.content_length() {
        if declared > max_size {
            return Err(Pdf2CardsError::FileTooLarge {
                size: declared,
                limit: max_size,
            });
        }
    }

    let bytes = response.bytes().await.map_err(|e| Pdf2CardsError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if bytes.len() as u64 > max_size {
        return Err(Pdf2CardsError::FileTooLarge {
            size: bytes.len() as u64,
            limit: max_size,
        });
    }

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2CardsError::NotAPdf {
            path: PathBuf::from(url),
            magic,
        });
    }

    let file_path = downloads_dir.join(format!("{}.pdf", uuid::Uuid::new_v4()));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2CardsError::io(&file_path, e))?;

    info!("downloaded to: {}", file_path.display());
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_reported() {
        let result = validate_pdf_file(Path::new("/no/such/file.pdf"), 1024);
        assert!(matches!(result, Err(Pdf2CardsError::FileNotFound { .. })));
    }

    #[test]
    fn non_pdf_magic_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"GIF89a not a pdf").unwrap();
        let result = validate_pdf_file(f.path(), 1024);
        assert!(matches!(result, Err(Pdf2CardsError::NotAPdf { .. })));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4 plus a body that exceeds the tiny cap")
            .unwrap();
        let result = validate_pdf_file(f.path(), 10);
        assert!(matches!(result, Err(Pdf2CardsError::FileTooLarge { .. })));
    }

    #[test]
    fn valid_pdf_passes() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4\n%%EOF").unwrap();
        assert!(validate_pdf_file(f.path(), 1024).is_ok());
    }
}
