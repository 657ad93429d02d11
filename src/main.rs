//! # schemadex CLI
//!
//! ## Usage
//!
//! ```bash
//! schemadex --config ./config/schemadex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `schemadex init` | Create the SQLite database and run schema migrations |
//! | `schemadex index <manifest>` | Index a manifest (full, incremental, resume, dry-run) |
//! | `schemadex status <manifest>` | Preview what an index run would do |
//! | `schemadex search "<query>"` | Lexical search over indexed documents |
//! | `schemadex path <from> <to>` | Shortest join path between two tables |
//! | `schemadex get <path>` | Print one stored document |

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use schemadex::indexer::{IndexFlags, RunMode};
use schemadex::progress::ProgressMode;
use schemadex::{config, get, indexer, migrate, paths, search, status};

/// schemadex: index database schema documentation for search and
/// join-path discovery.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/schemadex.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "schemadex",
    about = "schemadex: index database schema documentation for search and join-path discovery",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/schemadex.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables. Idempotent.
    Init,

    /// Index the documents listed in a manifest.
    Index {
        /// Path to the manifest JSON file.
        manifest: PathBuf,

        /// Only index new and changed documents; delete removed ones.
        #[arg(long)]
        incremental: bool,

        /// Continue an interrupted run from its checkpoint.
        #[arg(long)]
        resume: bool,

        /// Report what would change without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Do not call the embedding service (lexical-only index).
        #[arg(long)]
        skip_embeddings: bool,

        /// Stop after this many document writes, keeping the checkpoint.
        #[arg(long)]
        max_documents: Option<usize>,
    },

    /// Preview an index run: new/changed/deleted counts, checkpoint, metadata.
    Status {
        /// Path to the manifest JSON file.
        manifest: PathBuf,

        /// Classify as an incremental run would.
        #[arg(long)]
        incremental: bool,
    },

    /// Lexical search over indexed documents.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one database.
        #[arg(long)]
        database: Option<String>,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Find the shortest join path between two tables.
    Path {
        /// Source table (`table` or `schema.table`).
        from: String,
        /// Target table (`table` or `schema.table`).
        to: String,

        /// Database the tables belong to.
        #[arg(long)]
        database: String,

        /// Maximum hops (defaults to `indexer.max_hops`).
        #[arg(long)]
        max_hops: Option<usize>,
    },

    /// Print one stored document by its source path.
    Get {
        /// Source path, e.g. `tables/orders.md` or `tables/orders.md#id`.
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            manifest,
            incremental,
            resume,
            dry_run,
            skip_embeddings,
            max_documents,
        } => {
            let flags = IndexFlags {
                mode: if incremental {
                    RunMode::Incremental
                } else {
                    RunMode::Full
                },
                resume,
                dry_run,
                skip_embeddings,
                max_documents,
            };
            indexer::run_index(&cfg, &manifest, &flags, progress.reporter().as_ref()).await?;
        }
        Commands::Status {
            manifest,
            incremental,
        } => {
            let mode = if incremental {
                RunMode::Incremental
            } else {
                RunMode::Full
            };
            status::run_status(&cfg, &manifest, mode).await?;
        }
        Commands::Search {
            query,
            database,
            limit,
        } => {
            search::run_search(&cfg, &query, database.as_deref(), limit).await?;
        }
        Commands::Path {
            from,
            to,
            database,
            max_hops,
        } => {
            paths::run_path(&cfg, &database, &from, &to, max_hops).await?;
        }
        Commands::Get { path } => {
            get::run_get(&cfg, &path).await?;
        }
    }

    Ok(())
}
