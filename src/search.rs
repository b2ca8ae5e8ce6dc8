//! Retrieval-augmented question answering.
//!
//! [`RagSearch`] pairs one [`VectorStore`] with one [`ChatModel`]. A question
//! is answered in four steps:
//!
//! 1. retrieve the `top_k` nearest chunks from the store,
//! 2. drop hits below `retrieval.min_score` (when set),
//! 3. concatenate the remaining chunk texts, best first, into a context
//!    block of at most `retrieval.max_context_chars`,
//! 4. send context and question to the model and return its text.
//!
//! When nothing is retrieved the model is not called and [`NO_RESULTS`] is
//! returned instead. Switching models means building a new `RagSearch`.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::{Config, RetrievalConfig};
use crate::embedding::create_embedder;
use crate::error::{SearchError, StoreError};
use crate::llm::{create_chat_model, ChatModel, CompletionRequest};
use crate::models::ScoredChunk;
use crate::store::VectorStore;

/// Answer text used when retrieval finds nothing to summarize.
pub const NO_RESULTS: &str = "No relevant information found in the indexed documents.";

const SYSTEM_PROMPT: &str = "You answer questions using only the provided document excerpts. \
If the excerpts do not contain the answer, say so.";

/// An answer plus the chunks it was generated from.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
    /// False when no chunks were retrieved and the canned text was returned.
    pub used_llm: bool,
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub min_score: Option<f32>,
}

impl From<&RetrievalConfig> for SearchParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            max_context_chars: config.max_context_chars,
            min_score: config.min_score,
        }
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

pub struct RagSearch {
    store: Arc<VectorStore>,
    llm: Box<dyn ChatModel>,
    params: SearchParams,
}

impl RagSearch {
    pub fn new(store: Arc<VectorStore>, llm: Box<dyn ChatModel>, params: SearchParams) -> Self {
        Self { store, llm, params }
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn default_top_k(&self) -> usize {
        self.params.top_k
    }

    /// Answer `query` from the `top_k` most similar chunks.
    pub async fn search_and_summarize(&self, query: &str, top_k: usize) -> Result<String, SearchError> {
        Ok(self.search_with_sources(query, top_k).await?.text)
    }

    /// Like [`search_and_summarize`](Self::search_and_summarize), but also
    /// returns the chunks handed to the model.
    pub async fn search_with_sources(&self, query: &str, top_k: usize) -> Result<Answer, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery);
        }

        let mut hits = self.store.query(query, top_k).await?;
        if let Some(min) = self.params.min_score {
            hits.retain(|h| h.score >= min);
        }
        tracing::debug!(query, hits = hits.len(), "retrieved chunks");

        if hits.is_empty() {
            return Ok(Answer {
                text: NO_RESULTS.to_string(),
                sources: hits,
                used_llm: false,
            });
        }

        let context = build_context(&hits, self.params.max_context_chars);
        let request = CompletionRequest {
            model: self.llm.model_id().to_string(),
            prompt: build_prompt(&context, query),
            system: Some(SYSTEM_PROMPT.to_string()),
        };
        let text = self.llm.complete(&request).await?;

        Ok(Answer {
            text,
            sources: hits,
            used_llm: true,
        })
    }
}

/// Join chunk texts in rank order, stopping before `max_chars` is exceeded.
/// The best chunk is always included, truncated on a char boundary if needed.
pub fn build_context(hits: &[ScoredChunk], max_chars: usize) -> String {
    let mut context = String::new();
    for hit in hits {
        let text = hit.chunk.text.trim();
        let sep = if context.is_empty() { 0 } else { 2 };
        if context.len() + sep + text.len() > max_chars {
            if context.is_empty() {
                let mut end = max_chars.min(text.len());
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                context.push_str(&text[..end]);
            }
            break;
        }
        if sep > 0 {
            context.push_str("\n\n");
        }
        context.push_str(text);
    }
    context
}

pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Summarize the following context to answer the question.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        context, query
    )
}

/// Open the configured store and load its index from disk.
pub async fn open_store(config: &Config) -> Result<Arc<VectorStore>> {
    let embedder = create_embedder(&config.embedding)?;
    let store = VectorStore::from_config(config, embedder);
    store.load().await.map_err(|e| match e {
        StoreError::NotFound(dir) => anyhow::anyhow!(
            "No index found at {}. Run `docsage build` to create it.",
            dir.display()
        ),
        other => anyhow::Error::new(other),
    })?;
    Ok(Arc::new(store))
}

/// Build a search engine over `store` answering with `model`.
pub fn engine_for(config: &Config, store: Arc<VectorStore>, model: &str) -> Result<RagSearch> {
    let llm = create_chat_model(&config.llm, model)
        .with_context(|| format!("Failed to initialize model {}", model))?;
    Ok(RagSearch::new(store, llm, SearchParams::from(&config.retrieval)))
}

/// `docsage query`: print the ranked chunks without calling a model.
pub async fn run_query(config: &Config, text: &str, top_k: Option<usize>) -> Result<()> {
    if text.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    let store = open_store(config).await?;
    let hits = store.query(text, top_k.unwrap_or(config.retrieval.top_k)).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} #{}",
            i + 1,
            hit.score,
            hit.chunk.source,
            hit.chunk.ordinal
        );
        println!("    {}", snippet(&hit.chunk.text, 240));
        println!();
    }
    Ok(())
}

/// `docsage ask`: answer one question and exit.
pub async fn run_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    model: Option<&str>,
    show_sources: bool,
) -> Result<()> {
    let store = open_store(config).await?;
    let model = config.llm.resolve_model(model.unwrap_or(&config.llm.model));
    let engine = engine_for(config, store, &model)?;
    let answer = engine
        .search_with_sources(question, top_k.unwrap_or(config.retrieval.top_k))
        .await?;

    println!("{}", answer.text);
    if show_sources && !answer.sources.is_empty() {
        println!();
        print_sources(&answer.sources);
    }
    Ok(())
}

pub fn print_sources(sources: &[ScoredChunk]) {
    println!("Sources:");
    for hit in sources {
        println!(
            "  [{:.3}] {} #{}",
            hit.score, hit.chunk.source, hit.chunk.ordinal
        );
    }
}

/// First `max` chars of `text` on one line.
fn snippet(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::text_hash;
    use crate::models::Chunk;

    fn hit(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: text.to_string(),
                source: "doc.txt".to_string(),
                ordinal: 0,
                text: text.to_string(),
                hash: text_hash(text),
            },
            score,
        }
    }

    #[test]
    fn context_keeps_rank_order() {
        let hits = vec![hit("first", 0.9), hit("second", 0.5)];
        assert_eq!(build_context(&hits, 1000), "first\n\nsecond");
    }

    #[test]
    fn context_stops_at_budget() {
        let hits = vec![hit("aaaa", 0.9), hit("bbbb", 0.8), hit("cccc", 0.7)];
        assert_eq!(build_context(&hits, 10), "aaaa\n\nbbbb");
    }

    #[test]
    fn oversized_top_chunk_is_truncated_on_char_boundary() {
        let hits = vec![hit("अनुच्छेद", 0.9)];
        let ctx = build_context(&hits, 4);
        assert!(ctx.len() <= 4);
        assert!("अनुच्छेद".starts_with(&ctx));
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let prompt = build_prompt("The sky is blue.", "What color is the sky?");
        assert!(prompt.contains("Context:\nThe sky is blue."));
        assert!(prompt.contains("Question: What color is the sky?"));
    }

    #[test]
    fn snippet_flattens_and_truncates() {
        assert_eq!(snippet("a\n\nb   c", 100), "a b c");
        assert_eq!(snippet("abcdef", 3), "abc...");
    }
}
