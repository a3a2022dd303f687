//! `treerag index`: build and persist the search tree for a text file.
//!
//! The source text is hashed (SHA-256), and so are the settings that shape
//! the tree (see [`build_fingerprint`]). When the stored build matches both
//! and used the same embedding model, the file is skipped unless `--force`
//! is given.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use treerag_core::index::{BuildEvent, TreeIndex};
use treerag_core::store::TreeStore;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::progress::ProgressMode;
use crate::sqlite_store::{DocumentRecord, SqliteTreeStore};
use crate::summarizer::create_summarizer;
use crate::tokenizer::create_tokenizer;

/// What [`index_document`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    /// Content, model and build settings unchanged since the stored build.
    Unchanged(DocumentRecord),
    Built(DocumentRecord),
}

/// SHA-256 hex digest of the document text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hex digest of every setting that changes the built tree.
///
/// Covers chunking, clustering, embedding and (when summaries are on) the
/// summarizer. Retry and timeout settings are left out.
pub fn build_fingerprint(config: &Config) -> String {
    let summarizer = if config.tree.summarize {
        serde_json::json!({
            "provider": config.summarizer.provider,
            "model": config.summarizer.model,
            "url": config.summarizer.url,
            "temperature": config.summarizer.temperature,
            "max_tokens": config.summarizer.max_tokens,
            "system_prompt": config.summarizer.system_prompt,
            "max_words": config.tree.summary_max_words,
        })
    } else {
        serde_json::Value::Null
    };
    let settings = serde_json::json!({
        "chunking": {
            "max_tokens": config.chunking.max_tokens,
            "overlap_tokens": config.chunking.overlap_tokens,
            "tokenizer": config.chunking.tokenizer,
        },
        "tree": {
            "cluster_size": config.tree.cluster_size,
            "algorithm": config.tree.algorithm,
            "seed": config.tree.seed,
            "fuzziness": config.tree.fuzziness,
            "error": config.tree.error,
            "max_iter": config.tree.max_iter,
        },
        "embedding": {
            "provider": config.embedding.provider,
            "model": config.embedding.model,
            "dims": config.embedding.dims,
            "url": config.embedding.url,
        },
        "summarizer": summarizer,
    });
    content_hash(&settings.to_string())
}

/// Document name used when `--name` is not given: the file name.
pub fn default_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a document name from {}", path.display()))
}

/// Build the tree for the file at `path` and store it under `name`.
pub async fn index_document(
    config: &Config,
    path: &Path,
    name: &str,
    force: bool,
    progress: ProgressMode,
) -> Result<IndexOutcome> {
    if !config.embedding.is_enabled() {
        bail!("Indexing requires an embedding provider. Set [embedding].provider in the config.");
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let hash = content_hash(&text);
    let fingerprint = build_fingerprint(config);

    let embedder = create_embedder(&config.embedding)?;
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteTreeStore::new(pool.clone()));

    if !force {
        if let Some(existing) = store.document(name).await? {
            if existing.content_hash == hash
                && existing.embedding_model == embedder.model_name()
                && existing.build_fingerprint == fingerprint
            {
                info!(document = name, "content unchanged, skipping build");
                pool.close().await;
                return Ok(IndexOutcome::Unchanged(existing));
            }
        }
    }

    let mut index = TreeIndex::new(
        name,
        create_tokenizer(&config.chunking)?,
        Arc::clone(&embedder),
        create_summarizer(&config.tree, &config.summarizer)?,
        Arc::clone(&store) as Arc<dyn TreeStore>,
        config.index_options()?,
    );

    let reporter = progress.reporter();
    let mut saved = None;
    {
        let mut build = index.init(&text);
        while let Some(event) = build.next_event().await? {
            reporter.report(name, &event);
            if let BuildEvent::Saved { chunks, nodes, .. } = event {
                saved = Some((chunks, nodes));
            }
        }
    }

    let (chunks, nodes) = match saved {
        Some(counts) => counts,
        None => bail!("Build of '{}' ended without saving a tree", name),
    };
    let record = DocumentRecord {
        name: name.to_string(),
        content_hash: hash,
        chunk_count: chunks as i64,
        node_count: nodes as i64,
        embedding_model: embedder.model_name().to_string(),
        build_fingerprint: fingerprint,
        built_at: chrono::Utc::now().timestamp(),
    };
    store.upsert_document(&record).await?;
    pool.close().await;

    Ok(IndexOutcome::Built(record))
}

/// CLI entry point.
pub async fn run_index(
    config: &Config,
    path: &Path,
    name: Option<String>,
    force: bool,
    progress: ProgressMode,
) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => default_name(path)?,
    };

    match index_document(config, path, &name, force, progress).await? {
        IndexOutcome::Unchanged(record) => {
            println!(
                "{} unchanged ({} chunks, {} nodes); use --force to rebuild.",
                record.name, record.chunk_count, record.node_count
            );
        }
        IndexOutcome::Built(record) => {
            println!(
                "Indexed {}: {} chunks, {} nodes (model {}).",
                record.name, record.chunk_count, record.node_count, record.embedding_model
            );
        }
    }
    Ok(())
}
