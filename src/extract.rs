//! Per-page text extraction from PDF files.
//!
//! Extraction is CPU-bound and `pdf-extract` can panic on malformed input,
//! so it runs on the blocking pool behind `catch_unwind`; both failure kinds
//! come back as an [`ExtractError`] naming the file.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Error processing PDF {file}: {message}")]
    Pdf { file: String, message: String },
    #[error("Error processing PDF {file}: extractor panicked on malformed input")]
    Panicked { file: String },
    #[error("PDF extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Extract the text of every page of the PDF at `path`, in page order.
pub async fn extract_pages(path: &Path) -> Result<Vec<String>, ExtractError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_pages_blocking(&path)).await?
}

fn extract_pages_blocking(path: &Path) -> Result<Vec<String>, ExtractError> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractError::Pdf {
            file,
            message: e.to_string(),
        }),
        Err(_) => Err(ExtractError::Panicked { file }),
    }
}
