//! # treerag core
//!
//! Hierarchical semantic search over a single document: chunking,
//! embedding, recursive clustering into a tree, tree persistence, and
//! greedy tree descent.
//!
//! This crate has no database, HTTP or filesystem dependencies. Concrete
//! providers (SQLite store, OpenAI/Ollama/fastembed embedders, chat
//! summarizer, HuggingFace tokenizer) live in the `treerag` app crate and
//! plug in through the [`embedding::Embedder`], [`summarize::Summarizer`],
//! [`tokenizer::Tokenizer`] and [`store::TreeStore`] traits.

pub mod chunk;
pub mod cluster;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod search;
pub mod store;
pub mod summarize;
pub mod tokenizer;
pub mod tree;
