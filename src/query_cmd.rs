//! `treerag query`: answer a question from a stored tree.

use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use treerag_core::index::TreeIndex;
use treerag_core::store::TreeStore;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteTreeStore;
use crate::tokenizer::create_tokenizer;

/// The node a query descended to.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub document: String,
    pub start_line: i64,
    pub end_line: i64,
    /// Descent steps from the root.
    pub depth: usize,
    /// Cosine similarity to the question.
    pub score: Option<f32>,
    /// Index of the child taken at each step.
    pub path: Vec<usize>,
    pub text: String,
}

/// Descend the tree stored for `name` towards `question`.
///
/// Returns `Ok(None)` when no tree is stored under `name`.
pub async fn query_document(
    config: &Config,
    name: &str,
    question: &str,
) -> Result<Option<QueryResult>> {
    if !config.embedding.is_enabled() {
        bail!("Querying requires an embedding provider. Set [embedding].provider in the config.");
    }
    let embedder = create_embedder(&config.embedding)?;
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteTreeStore::new(pool.clone()));

    if let Some(record) = store.document(name).await? {
        if record.embedding_model != embedder.model_name() {
            warn!(
                document = name,
                built_with = %record.embedding_model,
                querying_with = embedder.model_name(),
                "embedding model differs from the one used to build the tree"
            );
        }
    }

    let mut index = TreeIndex::new(
        name,
        create_tokenizer(&config.chunking)?,
        embedder,
        None,
        Arc::clone(&store) as Arc<dyn TreeStore>,
        config.index_options()?,
    );

    let result = index.search(question).await?.map(|hit| QueryResult {
        document: name.to_string(),
        start_line: hit.node.start_line,
        end_line: hit.node.end_line,
        depth: hit.depth,
        score: hit.score,
        path: hit.path.clone(),
        text: hit.node.description.clone().unwrap_or_default(),
    });

    pool.close().await;
    Ok(result)
}

/// CLI entry point.
pub async fn run_query(config: &Config, name: &str, question: &str, json: bool) -> Result<()> {
    let result = match query_document(config, name, question).await? {
        Some(r) => r,
        None => bail!(
            "No tree stored for document '{}'. Run `treerag index` first.",
            name
        ),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("--- Match ---");
    println!("document: {}", result.document);
    println!("lines:    {}..{}", result.start_line, result.end_line);
    println!("depth:    {}", result.depth);
    match result.score {
        Some(score) => println!("score:    {:.4}", score),
        None => println!("score:    -"),
    }
    println!();
    println!("{}", result.text);
    Ok(())
}
