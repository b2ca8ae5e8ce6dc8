//! # docsage
//!
//! Question answering over a folder of PDF, DOCX, and text documents.
//!
//! docsage loads a corpus, splits it into overlapping chunks, embeds each
//! chunk, and persists the vectors in a small file-backed index. A question
//! is embedded with the same model, the nearest chunks are retrieved, and a
//! chat model summarizes them into an answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunk+Embed │──▶│ VectorStore   │
//! │ PDF/DOCX │   │             │   │ index.bin +   │
//! └──────────┘   └─────────────┘   │ metadata.json │
//!                                  └──────┬───────┘
//!                                         ▼
//!                  ┌──────────┐     ┌───────────┐
//!                  │   CLI    │◀───▶│ RagSearch │──▶ ChatModel
//!                  │ (chat)   │     └───────────┘
//!                  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsage init                       # write config/docsage.toml
//! docsage build --root ./data        # index the corpus
//! docsage ask "What does Article 21 protect?" --sources
//! docsage chat --model "Gemma 2 9B (Google)"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Store, model, and search error types |
//! | [`loader`] | Directory walking and file selection |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Persisted similarity index |
//! | [`llm`] | Chat model providers |
//! | [`search`] | Retrieval-augmented answers |
//! | [`session`] | Interactive conversation state |
//! | [`chat`] | Interactive loop |
//! | [`progress`] | Build progress reporting |

pub mod build_cmd;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod init;
pub mod llm;
pub mod loader;
pub mod models;
pub mod progress;
pub mod search;
pub mod session;
pub mod status;
pub mod store;
