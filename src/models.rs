//! Core data models used throughout docsage.
//!
//! These types represent the documents, chunks, and query results that flow
//! through the build and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Full text of one source file, before chunking.
#[derive(Debug, Clone)]
pub struct Document {
    /// Origin of the text, usually the file path.
    pub source: String,
    pub content_type: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content_type: "text/plain".to_string(),
            text: text.into(),
        }
    }
}

/// A contiguous span of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    /// Source of the parent document.
    pub source: String,
    /// Position within the parent document, starting at 0.
    pub ordinal: u32,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk returned from a similarity query, with its cosine score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}
