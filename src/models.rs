//! Core data models used throughout the service.
//!
//! These types represent the uploaded files, chunks, queries, and answers
//! that flow through the ingestion and question-answering pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language tag accepted on queries.
///
/// English is the working language of retrieval and generation; Nepali is
/// the pivot language translated in on the way in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ne,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ne => "ne",
        }
    }

    /// True when text in this language must be translated before generation.
    pub fn needs_translation(self) -> bool {
        self != Language::En
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Which branch of the router produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    General,
    Document,
}

/// A single uploaded file, as received from the transport.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// A passage of the ingested corpus; the unit of embedding and retrieval.
///
/// `text` is a verbatim slice of the corpus starting at `char_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub char_start: usize,
    pub char_len: usize,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// Body of `POST /query/`.
#[derive(Debug, Clone, Deserialize)]
pub struct Query {
    pub query: String,
    pub language: Language,
}

/// Response of `POST /query/`.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub response: String,
    /// Suffix heuristic: false only when the text ends with the incompleteness note.
    pub complete: bool,
    pub mode: Mode,
    /// The generation provider stopped early (token limit), per its own metadata.
    pub truncated: bool,
}

/// Summary of a successful ingestion batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub files: usize,
    pub pages: usize,
    pub chunks: usize,
}
