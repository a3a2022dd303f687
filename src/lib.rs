//! # treerag
//!
//! Hierarchical semantic search trees for retrieval-augmented generation.
//!
//! A document is split into token-bounded chunks, each chunk is embedded,
//! and the embeddings are clustered level by level into a tree whose
//! internal nodes optionally carry LLM-written summaries. The tree is stored
//! in SQLite; a question is answered by descending from the root towards the
//! most similar child at every level.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │  Chunker │──▶│ Embedder  │──▶│ Tree Builder │──▶│  SQLite  │
//! │ (tokens) │   │ (HTTP/ONNX│   │ (k/c-means + │   │rag_vector│
//! └──────────┘   │  /hash)   │   │  summaries)  │   └────┬─────┘
//!                └───────────┘   └──────────────┘        │
//!                                                        ▼
//!                                                 ┌────────────┐
//!                                                 │ Tree search│
//!                                                 └────────────┘
//! ```
//!
//! The algorithms live in `treerag-core`; this crate wires them to
//! configuration, SQLite and the provider adapters.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite tree store |
//! | [`embedding`] | Embedding providers |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`summarizer`] | Chat-completion summarizer |
//! | [`tokenizer`] | Tokenizer selection |
//! | [`progress`] | Build progress output |
//! | [`index_cmd`] | `treerag index` |
//! | [`query_cmd`] | `treerag query` |
//! | [`tree_cmd`] | `treerag list` / `show` / `delete` |

pub mod config;
pub mod db;
pub mod embedding;
pub mod http;
pub mod index_cmd;
pub mod migrate;
pub mod progress;
pub mod query_cmd;
pub mod sqlite_store;
pub mod summarizer;
pub mod tokenizer;
pub mod tree_cmd;
