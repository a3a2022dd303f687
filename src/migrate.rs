use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::db;

/// Create the schema. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    info!(path = %config.db.path.display(), "database migrated");
    Ok(())
}

pub(crate) async fn apply(pool: &SqlitePool) -> Result<()> {
    // One row per tree node; roots have parent_id = -1
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rag_vector (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_name TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            vector TEXT NOT NULL,
            des TEXT,
            parent_id INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-document build metadata
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            name TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL,
            chunk_count INTEGER NOT NULL,
            node_count INTEGER NOT NULL,
            embedding_model TEXT NOT NULL,
            build_fingerprint TEXT NOT NULL,
            built_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_rag_vector_file_parent ON rag_vector(file_name, parent_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_rag_vector_parent ON rag_vector(parent_id)")
        .execute(pool)
        .await?;

    Ok(())
}
