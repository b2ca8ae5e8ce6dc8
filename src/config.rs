//! TOML configuration parsing and validation.
//!
//! A single file (default `./config/docsage.toml`) drives every command.
//! All sections except `[store]` may be omitted; defaults mirror a small
//! local setup: fastembed `all-minilm-l6-v2` embeddings, Groq-hosted chat
//! models, and three passages per answer.
//!
//! ```toml
//! [store]
//! dir = "./db/vector_store"
//!
//! [loader]
//! root = "./data"
//!
//! [embedding]
//! provider = "local"
//!
//! [llm]
//! provider = "groq"
//! model = "llama-3.1-8b-instant"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding `index.bin` and `metadata.json`.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_loader_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Files larger than this are skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root: default_loader_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_loader_root() -> PathBuf {
    PathBuf::from("./data")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.docx".to_string(),
    ]
}
fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap(),
        }
    }
}

fn default_max_tokens() -> usize {
    250
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Overrides the provider's default endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Overrides the environment variable the API key is read from.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries on 429/5xx/network failures. Zero surfaces every failure.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_presets")]
    pub presets: Vec<ModelPreset>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_output_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
            max_retries: 0,
            presets: default_presets(),
        }
    }
}

/// A human label for a model id, shown by `docsage models` and `/models`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModelPreset {
    pub label: String,
    pub id: String,
}

fn default_llm_provider() -> String {
    "groq".to_string()
}
fn default_llm_model() -> String {
    "llama-3.1-8b-instant".to_string()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_presets() -> Vec<ModelPreset> {
    [
        ("Llama 3.1 8B (Fastest)", "llama-3.1-8b-instant"),
        ("Kimi K2 Instruct (Moonshot)", "moonshotai/kimi-k2-instruct-0905"),
        ("Mixtral 8x7B (Balanced)", "mixtral-8x7b-32768"),
        ("Gemma 2 9B (Google)", "gemma2-9b-it"),
        ("Llama 3 70B (Smartest)", "llama3-70b-8192"),
    ]
    .into_iter()
    .map(|(label, id)| ModelPreset {
        label: label.to_string(),
        id: id.to_string(),
    })
    .collect()
}

impl LlmConfig {
    /// Resolve a preset label or raw model id to a model id.
    ///
    /// Labels match case-insensitively; anything else is taken as an id.
    pub fn resolve_model(&self, name: &str) -> String {
        let name = name.trim();
        self.presets
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(name) || p.id == name)
            .map(|p| p.id.clone())
            .unwrap_or_else(|| name.to_string())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound on the context block handed to the model.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Hits scoring below this are not passed to the model.
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            min_score: None,
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_context_chars() -> usize {
    12_000
}

impl Config {
    /// Defaults with the store under `./db/vector_store`, for commands that
    /// run without a config file.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                dir: PathBuf::from("./db/vector_store"),
            },
            loader: LoaderConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.max_tokens {
        anyhow::bail!("chunking.overlap_tokens must be < chunking.max_tokens");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.max_context_chars == 0 {
        anyhow::bail!("retrieval.max_context_chars must be > 0");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "hash" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "disabled" => anyhow::bail!(
            "embedding.provider is 'disabled'; an index cannot be built or queried without embeddings"
        ),
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hash.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "groq" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be groq, openai, or ollama.",
            other
        ),
    }
    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let cfg = parse("[store]\ndir = \"/tmp/store\"\n").unwrap();
        assert_eq!(cfg.store.dir, PathBuf::from("/tmp/store"));
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.llm.provider, "groq");
        assert_eq!(cfg.llm.model, "llama-3.1-8b-instant");
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.llm.max_retries, 0);
        assert_eq!(cfg.llm.presets.len(), 5);
    }

    #[test]
    fn rejects_unknown_embedding_provider() {
        let err = parse("[store]\ndir = \"x\"\n[embedding]\nprovider = \"faiss\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn openai_embedding_requires_model_and_dims() {
        let err = parse("[store]\ndir = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));

        let err = parse(
            "[store]\ndir = \"x\"\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn rejects_overlap_not_below_max() {
        let err = parse("[store]\ndir = \"x\"\n[chunking]\nmax_tokens = 10\noverlap_tokens = 10\n")
            .unwrap_err();
        assert!(err.to_string().contains("overlap_tokens"));
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = parse("[store]\ndir = \"x\"\n[retrieval]\ntop_k = 0\n").unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn resolve_model_by_label_or_id() {
        let llm = LlmConfig::default();
        assert_eq!(llm.resolve_model("gemma 2 9b (google)"), "gemma2-9b-it");
        assert_eq!(llm.resolve_model("llama3-70b-8192"), "llama3-70b-8192");
        assert_eq!(llm.resolve_model("some/custom-model"), "some/custom-model");
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/docsage.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
