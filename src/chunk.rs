//! Paragraph-boundary text chunker.
//!
//! Splits document text into [`Chunk`]s that respect a configurable
//! `max_tokens` limit. Splitting occurs on paragraph boundaries (`\n\n`)
//! to preserve semantic coherence within each chunk; a paragraph longer
//! than the limit is hard-split at the last newline or space that fits.
//!
//! When `overlap_tokens > 0`, the tail of each chunk (cut at a word
//! boundary) is repeated at the start of the next one so that a sentence
//! spanning the cut can still be retrieved whole.
//!
//! Each chunk receives a UUID, its document's source, a contiguous ordinal
//! starting at 0, and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Chunk a loaded document.
pub fn chunk_document(doc: &Document, max_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    chunk_text(&doc.source, &doc.text, max_tokens, overlap_tokens)
}

/// Split text into chunks on paragraph boundaries, respecting max_tokens.
///
/// Returns chunks with contiguous ordinals starting at 0. Text that is empty
/// or whitespace-only yields no chunks.
pub fn chunk_text(source: &str, text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let overlap_chars = (overlap_tokens * CHARS_PER_TOKEN).min(max_chars / 2);

    let mut pieces: Vec<String> = Vec::new();
    let mut current_buf = String::new();
    // True once current_buf holds text that is not just carried-over overlap.
    let mut has_fresh = false;

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        // If adding this paragraph would exceed max, flush current buffer
        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len() // +2 for \n\n separator
        };

        if would_be > max_chars && !current_buf.is_empty() {
            let carry = if has_fresh {
                let tail = overlap_tail(&current_buf, overlap_chars).to_string();
                pieces.push(std::mem::take(&mut current_buf));
                tail
            } else {
                String::new()
            };
            current_buf.clear();
            has_fresh = false;
            if !carry.is_empty() && carry.len() + 2 + trimmed.len() <= max_chars {
                current_buf = carry;
            }
        }

        // If a single paragraph exceeds max, hard-split it
        if trimmed.len() > max_chars {
            if has_fresh {
                pieces.push(std::mem::take(&mut current_buf));
            }
            current_buf.clear();
            has_fresh = false;
            hard_split(trimmed, max_chars, overlap_chars, &mut pieces);
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
            has_fresh = true;
        }
    }

    // Flush remaining
    if has_fresh {
        pieces.push(current_buf);
    }

    pieces
        .iter()
        .enumerate()
        .map(|(i, text)| make_chunk(source, i as u32, text))
        .collect()
}

fn hard_split(para: &str, max_chars: usize, overlap_chars: usize, pieces: &mut Vec<String>) {
    let mut start = 0;
    while start < para.len() {
        let rest = &para[start..];
        let end = if rest.len() <= max_chars {
            rest.len()
        } else {
            let limit = floor_char_boundary(rest, max_chars);
            // Try to split at a newline or space boundary
            rest[..limit]
                .rfind('\n')
                .or_else(|| rest[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        };

        let piece = rest[..end].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        if end >= rest.len() {
            break;
        }

        let step = if overlap_chars > 0 {
            let back = ceil_char_boundary(rest, end.saturating_sub(overlap_chars));
            let snapped = rest[back..end]
                .find(' ')
                .map(|p| back + p + 1)
                .unwrap_or(back);
            if snapped == 0 || snapped >= end {
                end
            } else {
                snapped
            }
        } else {
            end
        };
        start += step;
    }
}

/// The last `overlap_chars` bytes of `text`, starting on a word boundary.
fn overlap_tail(text: &str, overlap_chars: usize) -> &str {
    if overlap_chars == 0 || text.len() <= overlap_chars {
        return "";
    }
    let start = ceil_char_boundary(text, text.len() - overlap_chars);
    match text[start..].find([' ', '\n']) {
        Some(p) => text[start + p + 1..].trim_start(),
        None => "",
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Hex-encoded SHA-256 of a chunk's text.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(source: &str, ordinal: u32, text: &str) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        ordinal,
        text: text.to_string(),
        hash: text_hash(text),
    }
}
