//! `docsage init`: write a starter config file.

use anyhow::{bail, Result};
use std::path::Path;

const TEMPLATE: &str = r#"# docsage configuration

[store]
dir = "./db/vector_store"

[loader]
root = "./data"
include_globs = ["**/*.pdf", "**/*.docx", "**/*.txt", "**/*.md"]
exclude_globs = []
# max_file_size = 52428800

[chunking]
max_tokens = 250
overlap_tokens = 50

[embedding]
# local | openai | ollama | hash
provider = "local"
# model = "all-minilm-l6-v2"
batch_size = 64

[llm]
# groq | openai | ollama
provider = "groq"
model = "llama-3.1-8b-instant"
temperature = 0.0
# api_key_env = "GROQ_API_KEY"
# max_retries = 0

[retrieval]
top_k = 3
max_context_chars = 12000
# min_score = 0.2
"#;

/// Write the starter config to `path`, refusing to overwrite.
pub fn write_example_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, TEMPLATE)?;
    println!("Wrote {}", path.display());
    println!("Put documents under ./data, then run `docsage build`.");
    Ok(())
}
