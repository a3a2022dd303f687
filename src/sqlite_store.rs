//! SQLite-backed [`TreeStore`] implementation.
//!
//! Tree rows live in `rag_vector`; per-document build metadata lives in
//! `documents`. Saving a tree deletes the document's previous rows and
//! inserts the new ones inside one transaction, so readers never see a
//! half-written tree.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use treerag_core::embedding::vector_to_json;
use treerag_core::models::{SearchNode, TreeSummary};
use treerag_core::store::{assemble_tree, flatten_tree, NodeRow, TreeStore, ROOT_PARENT_ID};

/// Build metadata for one indexed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub name: String,
    /// SHA-256 hex digest of the source text.
    pub content_hash: String,
    pub chunk_count: i64,
    pub node_count: i64,
    pub embedding_model: String,
    /// SHA-256 of the chunking, tree and provider settings used for the build.
    pub build_fingerprint: String,
    /// Unix timestamp (seconds).
    pub built_at: i64,
}

/// SQLite implementation of the [`TreeStore`] trait.
pub struct SqliteTreeStore {
    pool: SqlitePool,
}

impl SqliteTreeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Build metadata for `name`, if the document was indexed.
    pub async fn document(&self, name: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT name, content_hash, chunk_count, node_count, embedding_model, \
             build_fingerprint, built_at FROM documents WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// All document records, ordered by name.
    pub async fn documents(&self) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT name, content_hash, chunk_count, node_count, embedding_model, \
             build_fingerprint, built_at FROM documents ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Insert or replace the build metadata for a document.
    pub async fn upsert_document(&self, record: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (name, content_hash, chunk_count, node_count, embedding_model,
                 build_fingerprint, built_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                content_hash = excluded.content_hash,
                chunk_count = excluded.chunk_count,
                node_count = excluded.node_count,
                embedding_model = excluded.embedding_model,
                build_fingerprint = excluded.build_fingerprint,
                built_at = excluded.built_at
            "#,
        )
        .bind(&record.name)
        .bind(&record.content_hash)
        .bind(record.chunk_count)
        .bind(record.node_count)
        .bind(&record.embedding_model)
        .bind(&record.build_fingerprint)
        .bind(record.built_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a document's tree and metadata. Returns the number of tree
    /// rows deleted.
    pub async fn delete_document(&self, name: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = delete_rows(&mut tx, name).await?;
        sqlx::query("DELETE FROM documents WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn rows_for_document(&self, name: &str) -> Result<Vec<NodeRow>> {
        let rows = sqlx::query(
            "SELECT id, file_name, start_line, end_line, vector, des, parent_id \
             FROM rag_vector WHERE file_name = ? ORDER BY id",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(node_from_row).collect())
    }
}

fn node_from_row(row: &SqliteRow) -> NodeRow {
    NodeRow {
        id: row.get("id"),
        document_name: row.get("file_name"),
        start_line: row.get("start_line"),
        end_line: row.get("end_line"),
        vector: row.get("vector"),
        description: row.get("des"),
        parent_id: row.get("parent_id"),
    }
}

fn record_from_row(row: &SqliteRow) -> DocumentRecord {
    DocumentRecord {
        name: row.get("name"),
        content_hash: row.get("content_hash"),
        chunk_count: row.get("chunk_count"),
        node_count: row.get("node_count"),
        embedding_model: row.get("embedding_model"),
        build_fingerprint: row.get("build_fingerprint"),
        built_at: row.get("built_at"),
    }
}

async fn delete_rows(tx: &mut Transaction<'_, Sqlite>, name: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM rag_vector WHERE file_name = ?")
        .bind(name)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl TreeStore for SqliteTreeStore {
    async fn save_tree(&self, root: &SearchNode, document_name: &str) -> Result<i64> {
        let pending = flatten_tree(root)?;
        let mut tx = self.pool.begin().await?;

        let replaced = delete_rows(&mut tx, document_name).await?;

        let mut ids: Vec<i64> = Vec::with_capacity(pending.len());
        for row in &pending {
            let parent_id = match row.parent {
                Some(p) => ids[p],
                None => ROOT_PARENT_ID,
            };
            let result = sqlx::query(
                "INSERT INTO rag_vector (file_name, start_line, end_line, vector, des, parent_id) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(document_name)
            .bind(row.node.start_line)
            .bind(row.node.end_line)
            .bind(&row.vector)
            .bind(&row.node.description)
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;
            ids.push(result.last_insert_rowid());
        }

        tx.commit().await?;
        debug!(document = document_name, replaced, inserted = ids.len(), "stored tree rows");
        Ok(ids[0])
    }

    async fn load_tree(&self, document_name: &str) -> Result<Option<SearchNode>> {
        let rows = self.rows_for_document(document_name).await?;
        let root_id = rows
            .iter()
            .find(|r| r.parent_id == ROOT_PARENT_ID)
            .map(|r| r.id);
        match root_id {
            Some(id) => assemble_tree(&rows, id),
            None => Ok(None),
        }
    }

    async fn load_subtree(&self, id: i64) -> Result<Option<SearchNode>> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT file_name FROM rag_vector WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match name {
            Some(name) => {
                let rows = self.rows_for_document(&name).await?;
                assemble_tree(&rows, id)
            }
            None => Ok(None),
        }
    }

    async fn root_nodes(&self) -> Result<Vec<TreeSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.file_name, r.des,
                   (SELECT COUNT(*) FROM rag_vector c WHERE c.file_name = r.file_name) AS node_count
            FROM rag_vector r
            WHERE r.parent_id = ?
            ORDER BY r.file_name, r.id
            "#,
        )
        .bind(ROOT_PARENT_ID)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TreeSummary {
                root_id: row.get("id"),
                document_name: row.get("file_name"),
                description: row.get("des"),
                node_count: row.get("node_count"),
            })
            .collect())
    }

    async fn node_id_by_vector(&self, vector: &[f32]) -> Result<Option<i64>> {
        let text = vector_to_json(vector)?;
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM rag_vector WHERE vector = ? ORDER BY id LIMIT 1")
                .bind(text)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    async fn delete_tree(&self, document_name: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = delete_rows(&mut tx, document_name).await?;
        tx.commit().await?;
        Ok(removed)
    }
}
