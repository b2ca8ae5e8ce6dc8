//! `docsage build`: load the corpus, chunk, embed, and persist the index.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::loader::load_all_documents;
use crate::models::Document;
use crate::progress::ProgressMode;
use crate::store::VectorStore;

pub async fn run_build(config: &Config, root: Option<&Path>, progress: ProgressMode) -> Result<()> {
    let root = root.unwrap_or(&config.loader.root);
    let report = load_all_documents(root, &config.loader)
        .with_context(|| format!("Failed to load documents from {}", root.display()))?;

    if report.documents.is_empty() {
        bail!(
            "No documents with extractable text under {} ({} skipped). Nothing to index.",
            root.display(),
            report.skipped.len()
        );
    }

    let embedder = create_embedder(&config.embedding)?;
    let store = VectorStore::from_config(config, embedder);
    let reporter = progress.reporter();
    let info = store
        .build_from_documents_with_progress(&report.documents, reporter.as_ref())
        .await?;

    println!("build {}", root.display());
    println!("  documents loaded: {}", report.documents.len());
    println!("  by type: {}", format_type_counts(&count_by_type(&report.documents)));
    println!("  files skipped: {}", report.skipped.len());
    println!("  chunks indexed: {}", info.chunks);
    println!("  embedding model: {} ({} dims)", info.embedding_model, info.dims);
    println!("  store: {}", info.dir.display());
    println!("ok");
    Ok(())
}

/// Number of loaded documents per content type.
fn count_by_type(documents: &[Document]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for doc in documents {
        *counts.entry(doc.content_type.as_str()).or_insert(0) += 1;
    }
    counts
}

fn format_type_counts(counts: &BTreeMap<&str, usize>) -> String {
    counts
        .iter()
        .map(|(ty, n)| format!("{} {}", ty, n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str, content_type: &str) -> Document {
        Document {
            content_type: content_type.to_string(),
            ..Document::new(source, "text")
        }
    }

    #[test]
    fn counts_documents_per_content_type() {
        let docs = vec![
            doc("a.pdf", "application/pdf"),
            doc("b.txt", "text/plain"),
            doc("c.pdf", "application/pdf"),
        ];
        let counts = count_by_type(&docs);
        assert_eq!(counts.get("application/pdf"), Some(&2));
        assert_eq!(counts.get("text/plain"), Some(&1));
        assert_eq!(
            format_type_counts(&counts),
            "application/pdf 2, text/plain 1"
        );
    }
}
