//! Index status overview for `docsage status`.
//!
//! Loads the index without touching the language model and prints what is
//! stored: chunk and document counts, the embedding model, build time, and
//! on-disk size. A missing index is reported with the command that builds
//! it and turns into a non-zero exit.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::StoreError;
use crate::store::{VectorStore, INDEX_FILE, METADATA_FILE};

pub async fn run_status(config: &Config) -> Result<()> {
    let dir = &config.store.dir;
    let embedder = create_embedder(&config.embedding)?;
    let store = VectorStore::from_config(config, embedder);

    println!("docsage status");
    println!("==============");
    println!();
    println!("  Store:       {}", dir.display());

    let info = match store.load().await {
        Ok(info) => info,
        Err(StoreError::NotFound(_)) => {
            println!("  Index:       missing");
            println!();
            println!("  Run `docsage build` to index the documents under {}.", config.loader.root.display());
            bail!("no index found at {}", dir.display());
        }
        Err(e) => {
            println!("  Index:       unusable");
            return Err(e.into());
        }
    };

    let size = [INDEX_FILE, METADATA_FILE]
        .iter()
        .filter_map(|f| std::fs::metadata(dir.join(f)).ok())
        .map(|m| m.len())
        .sum::<u64>();

    println!("  Index:       ready");
    println!("  Size:        {}", format_bytes(size));
    println!();
    println!("  Documents:   {}", info.documents);
    println!("  Chunks:      {}", info.chunks);
    println!("  Embedding:   {} ({} dims)", info.embedding_model, info.dims);
    println!("  Built:       {}", info.built_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Chat model:  {} via {}", config.llm.model, config.llm.provider);
    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// `docsage models`: list the configured presets, marking the default.
pub fn list_models(config: &Config) {
    println!("{:<32} {}", "LABEL", "MODEL ID");
    for preset in &config.llm.presets {
        let marker = if preset.id == config.llm.model { " (default)" } else { "" };
        println!("{:<32} {}{}", preset.label, preset.id, marker);
    }
    if !config.llm.presets.iter().any(|p| p.id == config.llm.model) {
        println!("{:<32} {} (default)", "-", config.llm.model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
