//! File-backed vector store: build, persist, load, and query a similarity
//! index over document chunks.
//!
//! # Storage Layout
//!
//! A store directory holds two files that are only valid together:
//!
//! ```text
//! <dir>/index.bin      "DSIX" | version u32 | count u64 | dims u32 | count × dims f32 (LE)
//! <dir>/metadata.json  format version, embedding model + dims, count,
//!                      SHA-256 of index.bin, build time, chunk list
//! ```
//!
//! Row `i` of `index.bin` is the embedding of `chunks[i]` in the metadata.
//! [`VectorStore::load`] rejects the pair if counts, dims, or the checksum
//! disagree, and rejects an index built with a different embedding model.
//!
//! # Search
//!
//! Exact nearest-neighbour search: the query vector is scored against
//! every row with cosine similarity. Results are ordered by descending
//! score; equal scores keep insertion order.
//!
//! # Concurrency
//!
//! The loaded index is an immutable snapshot behind a `RwLock`. Queries
//! clone the `Arc` and release the lock before scoring, so a rebuild can
//! swap in a new snapshot while older queries finish on the old one.
//! Concurrent builds against the same directory are not coordinated; the
//! last writer wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::chunk::{chunk_document, text_hash};
use crate::config::Config;
use crate::embedding::{blob_to_vec, cosine_similarity, embed_query, vec_to_blob, Embedder};
use crate::error::StoreError;
use crate::models::{Chunk, Document, ScoredChunk};
use crate::progress::{BuildProgressEvent, BuildProgressReporter, NoProgress};

pub const INDEX_FILE: &str = "index.bin";
pub const METADATA_FILE: &str = "metadata.json";

const MAGIC: &[u8; 4] = b"DSIX";
const FORMAT_VERSION: u32 = 1;
/// magic + version + count + dims
const HEADER_LEN: usize = 4 + 4 + 8 + 4;

#[derive(Debug, Serialize, Deserialize)]
struct IndexMetadata {
    format_version: u32,
    embedding_model: String,
    dims: usize,
    count: usize,
    index_sha256: String,
    built_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
}

/// Summary of a built or loaded index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexInfo {
    pub dir: PathBuf,
    pub chunks: usize,
    pub documents: usize,
    pub embedding_model: String,
    pub dims: usize,
    pub built_at: DateTime<Utc>,
}

struct IndexSnapshot {
    chunks: Vec<Chunk>,
    /// Row-major, `chunks.len() × dims`.
    vectors: Vec<f32>,
    dims: usize,
    info: IndexInfo,
}

impl IndexSnapshot {
    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dims..(i + 1) * self.dims]
    }
}

pub struct VectorStore {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    max_tokens: usize,
    overlap_tokens: usize,
    batch_size: usize,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl VectorStore {
    /// A store rooted at `dir` that embeds with `embedder`. Nothing is read
    /// until [`load`](Self::load) or a build is called.
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            dir: dir.into(),
            embedder,
            max_tokens: 250,
            overlap_tokens: 50,
            batch_size: 64,
            snapshot: RwLock::new(None),
        }
    }

    /// A store using the `[store]`, `[chunking]`, and `[embedding]` settings.
    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(config.store.dir.clone(), embedder)
            .with_chunking(config.chunking.max_tokens, config.chunking.overlap_tokens)
            .with_batch_size(config.embedding.batch_size)
    }

    pub fn with_chunking(mut self, max_tokens: usize, overlap_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self.overlap_tokens = overlap_tokens;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Whether an index file is present in `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE).is_file()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Summary of the in-memory index, if one has been built or loaded.
    pub fn info(&self) -> Option<IndexInfo> {
        self.snapshot().map(|s| s.info.clone())
    }

    fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn install(&self, snapshot: IndexSnapshot) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::new(snapshot));
    }

    /// Chunk, embed, and persist `documents`, replacing any index in the
    /// store directory.
    ///
    /// # Errors
    ///
    /// [`StoreError::Build`] when the documents produce no chunks or every
    /// embedding batch fails; nothing is written in either case.
    pub async fn build_from_documents(&self, documents: &[Document]) -> Result<IndexInfo, StoreError> {
        self.build_from_documents_with_progress(documents, &NoProgress)
            .await
    }

    pub async fn build_from_documents_with_progress(
        &self,
        documents: &[Document],
        progress: &dyn BuildProgressReporter,
    ) -> Result<IndexInfo, StoreError> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| chunk_document(doc, self.max_tokens, self.overlap_tokens))
            .collect();
        progress.report(BuildProgressEvent::Chunked {
            documents: documents.len() as u64,
            chunks: chunks.len() as u64,
        });
        self.build_from_chunks_with_progress(chunks, progress).await
    }

    /// Embed and persist pre-chunked text. Same contract as
    /// [`build_from_documents`](Self::build_from_documents).
    ///
    /// Each chunk's `hash` is recomputed from its text before it is stored.
    pub async fn build_from_chunks(&self, chunks: Vec<Chunk>) -> Result<IndexInfo, StoreError> {
        self.build_from_chunks_with_progress(chunks, &NoProgress).await
    }

    pub async fn build_from_chunks_with_progress(
        &self,
        mut chunks: Vec<Chunk>,
        progress: &dyn BuildProgressReporter,
    ) -> Result<IndexInfo, StoreError> {
        if chunks.is_empty() {
            return Err(StoreError::Build("no chunks to index (empty input)".to_string()));
        }
        for chunk in &mut chunks {
            chunk.hash = text_hash(&chunk.text);
        }

        let dims = self.embedder.dims();
        let total = chunks.len();
        let mut kept: Vec<Chunk> = Vec::with_capacity(total);
        let mut vectors: Vec<f32> = Vec::with_capacity(total * dims);
        let mut last_err: Option<String> = None;
        let mut done = 0usize;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match self.embedder.embed(&texts).await {
                Ok(vecs) if vecs.len() != batch.len() => {
                    let msg = format!(
                        "embedder returned {} vectors for {} texts",
                        vecs.len(),
                        batch.len()
                    );
                    tracing::warn!(batch = batch.len(), "{}", msg);
                    last_err = Some(msg);
                }
                Ok(vecs) => match vecs.iter().map(Vec::len).find(|&len| len != dims) {
                    Some(bad_len) => {
                        let msg = format!(
                            "embedder returned a {}-dim vector, expected {}",
                            bad_len, dims
                        );
                        tracing::warn!(batch = batch.len(), "{}", msg);
                        last_err = Some(msg);
                    }
                    None => {
                        for (chunk, v) in batch.iter().zip(vecs) {
                            kept.push(chunk.clone());
                            vectors.extend_from_slice(&v);
                        }
                    }
                },
                Err(e) => {
                    tracing::warn!(batch = batch.len(), error = %e, "embedding batch failed, skipping");
                    last_err = Some(format!("{:#}", e));
                }
            }
            done += batch.len();
            progress.report(BuildProgressEvent::Embedding {
                n: done as u64,
                total: total as u64,
            });
        }

        if kept.is_empty() {
            return Err(StoreError::Build(format!(
                "embedding failed for all {} chunks: {}",
                total,
                last_err.unwrap_or_default()
            )));
        }
        if kept.len() < total {
            tracing::warn!(
                indexed = kept.len(),
                skipped = total - kept.len(),
                "some chunks could not be embedded and were left out of the index"
            );
        }

        let snapshot = self.persist(kept, vectors, dims)?;
        let info = snapshot.info.clone();
        progress.report(BuildProgressEvent::Persisted {
            chunks: info.chunks as u64,
        });
        tracing::info!(
            dir = %self.dir.display(),
            chunks = info.chunks,
            documents = info.documents,
            model = %info.embedding_model,
            "index built"
        );
        self.install(snapshot);
        Ok(info)
    }

    fn persist(
        &self,
        chunks: Vec<Chunk>,
        vectors: Vec<f32>,
        dims: usize,
    ) -> Result<IndexSnapshot, StoreError> {
        fs::create_dir_all(&self.dir)?;

        let index_bytes = encode_index(chunks.len(), dims, &vectors);
        let built_at = Utc::now();
        let metadata = IndexMetadata {
            format_version: FORMAT_VERSION,
            embedding_model: self.embedder.model_name().to_string(),
            dims,
            count: chunks.len(),
            index_sha256: sha256_hex(&index_bytes),
            built_at,
            chunks,
        };
        let metadata_bytes = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| StoreError::Build(format!("failed to serialize metadata: {}", e)))?;

        // Both files are staged before either is renamed, so a failed write
        // leaves the previous index untouched. A crash between the two
        // renames leaves a new index beside old metadata; `load` reports
        // that as corruption through the checksum.
        let index_path = self.dir.join(INDEX_FILE);
        let metadata_path = self.dir.join(METADATA_FILE);
        let index_tmp = stage(&index_path, &index_bytes)?;
        let metadata_tmp = match stage(&metadata_path, &metadata_bytes) {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&index_tmp);
                return Err(e.into());
            }
        };
        fs::rename(&index_tmp, &index_path)?;
        fs::rename(&metadata_tmp, &metadata_path)?;

        Ok(snapshot_from(&self.dir, metadata, vectors))
    }

    /// Read the persisted index and metadata into memory.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] when neither file exists.
    /// - [`StoreError::Corruption`] when only one file exists or the two disagree.
    /// - [`StoreError::VersionMismatch`] when the index was built with a
    ///   different embedding model or dimensionality.
    pub async fn load(&self) -> Result<IndexInfo, StoreError> {
        let (metadata, vectors) = read_index(&self.dir)?;

        if metadata.embedding_model != self.embedder.model_name()
            || metadata.dims != self.embedder.dims()
        {
            return Err(StoreError::VersionMismatch {
                stored: metadata.embedding_model,
                stored_dims: metadata.dims,
                configured: self.embedder.model_name().to_string(),
                configured_dims: self.embedder.dims(),
            });
        }

        let snapshot = snapshot_from(&self.dir, metadata, vectors);
        let info = snapshot.info.clone();
        tracing::debug!(dir = %self.dir.display(), chunks = info.chunks, "index loaded");
        self.install(snapshot);
        Ok(info)
    }

    /// Embed `text` and return the `top_k` most similar chunks, highest
    /// score first. Returns fewer than `top_k` only when the index holds
    /// fewer chunks.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        if top_k < 1 {
            return Err(StoreError::InvalidTopK(top_k));
        }
        let snapshot = self.snapshot().ok_or(StoreError::NotInitialized)?;

        let query_vec = embed_query(self.embedder.as_ref(), text)
            .await
            .map_err(|e| StoreError::Embedding(format!("{:#}", e)))?;
        if query_vec.len() != snapshot.dims {
            return Err(StoreError::Embedding(format!(
                "query embedding has {} dims, index has {}",
                query_vec.len(),
                snapshot.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = (0..snapshot.chunks.len())
            .map(|i| {
                let score = cosine_similarity(&query_vec, snapshot.row(i));
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: snapshot.chunks[i].clone(),
                score,
            })
            .collect())
    }
}

fn snapshot_from(dir: &Path, metadata: IndexMetadata, vectors: Vec<f32>) -> IndexSnapshot {
    let documents = metadata
        .chunks
        .iter()
        .map(|c| c.source.as_str())
        .collect::<HashSet<_>>()
        .len();
    let info = IndexInfo {
        dir: dir.to_path_buf(),
        chunks: metadata.chunks.len(),
        documents,
        embedding_model: metadata.embedding_model,
        dims: metadata.dims,
        built_at: metadata.built_at,
    };
    IndexSnapshot {
        chunks: metadata.chunks,
        vectors,
        dims: metadata.dims,
        info,
    }
}

fn encode_index(count: usize, dims: usize, vectors: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + vectors.len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(count as u64).to_le_bytes());
    bytes.extend_from_slice(&(dims as u32).to_le_bytes());
    bytes.extend_from_slice(&vec_to_blob(vectors));
    bytes
}

/// Read and cross-check both files. Does not look at the embedder.
fn read_index(dir: &Path) -> Result<(IndexMetadata, Vec<f32>), StoreError> {
    let index_path = dir.join(INDEX_FILE);
    let metadata_path = dir.join(METADATA_FILE);

    let corrupt = |reason: String| StoreError::Corruption {
        path: dir.to_path_buf(),
        reason,
    };

    match (index_path.is_file(), metadata_path.is_file()) {
        (false, false) => return Err(StoreError::NotFound(dir.to_path_buf())),
        (true, false) => return Err(corrupt(format!("{} is missing", METADATA_FILE))),
        (false, true) => return Err(corrupt(format!("{} is missing", INDEX_FILE))),
        (true, true) => {}
    }

    let index_bytes = fs::read(&index_path)?;
    let metadata: IndexMetadata = serde_json::from_slice(&fs::read(&metadata_path)?)
        .map_err(|e| corrupt(format!("unreadable {}: {}", METADATA_FILE, e)))?;

    if metadata.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported metadata format version {}",
            metadata.format_version
        )));
    }

    if index_bytes.len() < HEADER_LEN || &index_bytes[..4] != MAGIC {
        return Err(corrupt(format!("{} has no valid header", INDEX_FILE)));
    }
    let version = u32::from_le_bytes(read_array(&index_bytes[4..8]));
    let count = u64::from_le_bytes(read_array(&index_bytes[8..16])) as usize;
    let dims = u32::from_le_bytes(read_array(&index_bytes[16..20])) as usize;

    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported index format version {}", version)));
    }
    if sha256_hex(&index_bytes) != metadata.index_sha256 {
        return Err(corrupt(format!(
            "{} does not match the checksum recorded in {}",
            INDEX_FILE, METADATA_FILE
        )));
    }
    if count != metadata.count || count != metadata.chunks.len() {
        return Err(corrupt(format!(
            "index holds {} vectors but metadata lists {} chunks (count field {})",
            count,
            metadata.chunks.len(),
            metadata.count
        )));
    }
    if dims != metadata.dims || dims == 0 {
        return Err(corrupt(format!(
            "index dims {} do not match metadata dims {}",
            dims, metadata.dims
        )));
    }
    let body = &index_bytes[HEADER_LEN..];
    if body.len() != count * dims * 4 {
        return Err(corrupt(format!(
            "expected {} bytes of vectors, found {}",
            count * dims * 4,
            body.len()
        )));
    }
    if let Some(bad) = metadata.chunks.iter().find(|c| text_hash(&c.text) != c.hash) {
        return Err(corrupt(format!("chunk {} text does not match its hash", bad.id)));
    }

    Ok((metadata, blob_to_vec(body)))
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write `bytes` next to `path` with a `.tmp` extension.
fn stage(path: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    Ok(tmp)
}
