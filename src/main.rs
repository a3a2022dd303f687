//! # treerag CLI
//!
//! Builds hierarchical semantic search trees over text documents and
//! answers questions by descending them.
//!
//! ## Usage
//!
//! ```bash
//! treerag --config ./config/treerag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `treerag init` | Create the SQLite database and run schema migrations |
//! | `treerag index <file>` | Chunk, embed, cluster and store a document's tree |
//! | `treerag query <name> "<question>"` | Descend a stored tree to the best matching chunk |
//! | `treerag list` | List stored trees |
//! | `treerag show <name>` | Print a tree's outline |
//! | `treerag delete <name>` | Remove a document's tree |
//!
//! ## Examples
//!
//! ```bash
//! treerag init
//! treerag index ./docs/handbook.txt --name handbook
//! treerag query handbook "how are leases renewed?"
//! treerag show handbook --depth 1
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use treerag::progress::ProgressMode;
use treerag::{config, index_cmd, migrate, query_cmd, tree_cmd};

/// treerag: hierarchical semantic search trees for retrieval-augmented
/// generation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/treerag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "treerag",
    about = "Hierarchical semantic search trees for retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/treerag.toml")]
    config: PathBuf,

    /// Enable info-level logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the tree and document tables.
    /// Running it multiple times is safe.
    Init,

    /// Build the search tree for a text file.
    ///
    /// Replaces any tree previously stored under the same name.
    Index {
        /// Path to a UTF-8 text file.
        file: PathBuf,

        /// Document name; defaults to the file name.
        #[arg(long)]
        name: Option<String>,

        /// Rebuild even if the content has not changed.
        #[arg(long)]
        force: bool,

        /// Progress output on stderr. Defaults to `human` on a terminal,
        /// `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Find the passage of a document most relevant to a question.
    Query {
        /// Document name.
        name: String,

        /// The question.
        question: String,

        /// Print the match as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored trees.
    List,

    /// Print the outline of a stored tree.
    Show {
        /// Document name.
        name: String,

        /// Stop the outline at this depth (root = 0).
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Delete a document's tree and metadata.
    Delete {
        /// Document name.
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            file,
            name,
            force,
            progress,
        } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            index_cmd::run_index(&cfg, &file, name, force, progress).await?;
        }
        Commands::Query {
            name,
            question,
            json,
        } => {
            query_cmd::run_query(&cfg, &name, &question, json).await?;
        }
        Commands::List => {
            tree_cmd::run_list(&cfg).await?;
        }
        Commands::Show { name, depth } => {
            tree_cmd::run_show(&cfg, &name, depth).await?;
        }
        Commands::Delete { name } => {
            tree_cmd::run_delete(&cfg, &name).await?;
        }
    }

    Ok(())
}
