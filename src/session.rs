//! Conversation state for interactive use.
//!
//! A [`Session`] owns the transcript, the selected model id, and a search
//! engine built on first use. Selecting a different model drops the engine
//! so the next question rebuilds it against the new model; the vector
//! store itself is shared and never reloaded.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{LlmError, SearchError};
use crate::llm::{create_chat_model, ChatModel};
use crate::models::{ChatMessage, Role};
use crate::search::{Answer, RagSearch, SearchParams};
use crate::store::VectorStore;

/// Builds a chat model for a model id.
pub type ModelFactory = Box<dyn Fn(&str) -> Result<Box<dyn ChatModel>, LlmError> + Send + Sync>;

pub struct Session {
    store: Arc<VectorStore>,
    params: SearchParams,
    factory: ModelFactory,
    model: String,
    engine: Option<RagSearch>,
    history: Vec<ChatMessage>,
}

impl Session {
    pub fn new(store: Arc<VectorStore>, params: SearchParams, model: impl Into<String>, factory: ModelFactory) -> Self {
        Self {
            store,
            params,
            factory,
            model: model.into(),
            engine: None,
            history: Vec::new(),
        }
    }

    /// A session using the configured provider, starting on `model`.
    pub fn from_config(config: &Config, store: Arc<VectorStore>, model: &str) -> Self {
        let llm = config.llm.clone();
        Self::new(
            store,
            SearchParams::from(&config.retrieval),
            llm.resolve_model(model),
            Box::new(move |id: &str| create_chat_model(&llm, id)),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Switch to `model`. Returns false if it is already selected.
    pub fn select_model(&mut self, model: &str) -> bool {
        if model == self.model {
            return false;
        }
        tracing::info!(from = %self.model, to = %model, "switching model");
        self.model = model.to_string();
        self.engine = None;
        true
    }

    fn engine(&mut self) -> Result<&RagSearch, LlmError> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                let llm = (self.factory)(&self.model)?;
                RagSearch::new(self.store.clone(), llm, self.params.clone())
            }
        };
        Ok(self.engine.insert(engine))
    }

    /// Answer `question` and record both turns in the transcript.
    ///
    /// The question is recorded even when answering fails, matching what
    /// the user typed; the failed answer is not.
    pub async fn ask(&mut self, question: &str) -> Result<Answer, SearchError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        self.history.push(ChatMessage {
            role: Role::User,
            content: question.to_string(),
        });

        let top_k = self.params.top_k;
        let answer = self.engine()?.search_with_sources(question, top_k).await?;
        self.history.push(ChatMessage {
            role: Role::Assistant,
            content: answer.text.clone(),
        });
        Ok(answer)
    }
}
