//! Directory loader: turns a corpus folder into [`Document`]s.
//!
//! Walks `loader.root`, applies include/exclude globs, and extracts text
//! from each matching file. Files that are too large, fail extraction, or
//! contain no text are skipped with a warning rather than aborting the
//! build; the returned documents are sorted by path.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::LoaderConfig;
use crate::extract::{content_type_for_path, extract_text};
use crate::models::Document;

/// Files the loader looked at but did not turn into documents.
#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<(String, String)>,
}

/// Load every supported document under `root`.
pub fn load_all_documents(root: &Path, config: &LoaderConfig) -> Result<LoadReport> {
    if !root.exists() {
        bail!("Document root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut report = LoadReport::default();

    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let source = path.display().to_string();
        match load_file(path, config.max_file_size) {
            Ok(doc) if doc.text.trim().is_empty() => {
                tracing::warn!(file = %source, "no text extracted, skipping");
                report.skipped.push((source, "no text extracted".to_string()));
            }
            Ok(doc) => {
                tracing::debug!(
                    file = %source,
                    content_type = %doc.content_type,
                    chars = doc.text.len(),
                    "loaded document"
                );
                report.documents.push(doc);
            }
            Err(e) => {
                tracing::warn!(file = %source, error = %e, "skipping file");
                report.skipped.push((source, format!("{:#}", e)));
            }
        }
    }

    // Sort for deterministic ordering
    report.documents.sort_by(|a, b| a.source.cmp(&b.source));

    Ok(report)
}

/// Read and extract a single file.
pub fn load_file(path: &Path, max_file_size: u64) -> Result<Document> {
    let content_type = match content_type_for_path(path) {
        Some(ct) => ct,
        None => bail!("unsupported file type: {}", path.display()),
    };

    let size = std::fs::metadata(path)?.len();
    if size > max_file_size {
        bail!("file too large: {} bytes (max {})", size, max_file_size);
    }

    let bytes = std::fs::read(path)?;
    let text = extract_text(&bytes, content_type)?;

    Ok(Document {
        source: path.display().to_string(),
        content_type: content_type.to_string(),
        text,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("acts")).unwrap();
        fs::write(root.join("b.txt"), "Second file.").unwrap();
        fs::write(root.join("a.md"), "# First\n\nFirst file.").unwrap();
        fs::write(root.join("acts/c.txt"), "Nested file.").unwrap();
        fs::write(root.join("empty.txt"), "   \n").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("broken.pdf"), "not really a pdf").unwrap();
        tmp
    }

    #[test]
    fn loads_supported_files_sorted() {
        let tmp = corpus();
        let report = load_all_documents(tmp.path(), &LoaderConfig::default()).unwrap();
        let names: Vec<String> = report
            .documents
            .iter()
            .map(|d| {
                Path::new(&d.source)
                    .strip_prefix(tmp.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.md", "acts/c.txt", "b.txt"]);
    }

    #[test]
    fn skips_empty_and_broken_files() {
        let tmp = corpus();
        let report = load_all_documents(tmp.path(), &LoaderConfig::default()).unwrap();
        let skipped: Vec<&str> = report.skipped.iter().map(|(s, _)| s.as_str()).collect();
        assert!(skipped.iter().any(|s| s.ends_with("empty.txt")));
        assert!(skipped.iter().any(|s| s.ends_with("broken.pdf")));
        // Not matched by any include glob, so never considered.
        assert!(!skipped.iter().any(|s| s.ends_with("image.png")));
    }

    #[test]
    fn exclude_globs_apply() {
        let tmp = corpus();
        let config = LoaderConfig {
            exclude_globs: vec!["acts/**".to_string()],
            ..LoaderConfig::default()
        };
        let report = load_all_documents(tmp.path(), &config).unwrap();
        assert_eq!(report.documents.len(), 2);
        assert!(report.documents.iter().all(|d| !d.source.contains("acts")));
    }

    #[test]
    fn oversized_files_are_skipped() {
        let tmp = corpus();
        let config = LoaderConfig {
            max_file_size: 5,
            ..LoaderConfig::default()
        };
        let report = load_all_documents(tmp.path(), &config).unwrap();
        assert!(report.documents.is_empty());
        assert!(report
            .skipped
            .iter()
            .any(|(_, reason)| reason.contains("too large")));
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = load_all_documents(Path::new("/nonexistent/corpus"), &LoaderConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
