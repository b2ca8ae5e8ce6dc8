//! # docsage CLI
//!
//! ## Usage
//!
//! ```bash
//! docsage --config ./config/docsage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsage init` | Write a starter config file |
//! | `docsage build` | Load, chunk, embed, and persist the corpus |
//! | `docsage status` | Show what the index holds |
//! | `docsage query "<text>"` | Ranked chunks without calling a model |
//! | `docsage ask "<question>"` | One answer from the index |
//! | `docsage chat` | Interactive question loop |
//! | `docsage models` | List model presets |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docsage::progress::ProgressMode;
use docsage::{build_cmd, chat, config, init, search, status};

/// docsage: ask questions about a folder of documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. `docsage init` writes a commented starter file.
#[derive(Parser)]
#[command(
    name = "docsage",
    about = "docsage: question answering over PDF, DOCX, and text documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file at the --config path.
    Init,

    /// Build the vector index from the document folder.
    ///
    /// Replaces any existing index in the store directory.
    Build {
        /// Document folder (overrides `loader.root`).
        #[arg(long)]
        root: Option<PathBuf>,

        /// Progress output on stderr: off, human, or json.
        /// Defaults to human when stderr is a terminal.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Show whether an index exists and what it contains.
    Status,

    /// Print the chunks most similar to a query.
    Query {
        text: String,

        /// Number of chunks to return (default `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a single question.
    Ask {
        question: String,

        #[arg(long)]
        top_k: Option<usize>,

        /// Model id or preset label (default `llm.model`).
        #[arg(long)]
        model: Option<String>,

        /// Also print the chunks the answer was built from.
        #[arg(long)]
        sources: bool,
    },

    /// Start an interactive session.
    Chat {
        /// Model id or preset label to start with.
        #[arg(long)]
        model: Option<String>,
    },

    /// List model presets.
    Models,
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s).ok_or_else(|| format!("invalid progress mode '{}': use off, human, or json", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Init => {
            init::write_example_config(&cli.config)?;
            return Ok(());
        }
        Commands::Models => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
            status::list_models(&cfg);
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build { root, progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            build_cmd::run_build(&cfg, root.as_deref(), mode).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Query { text, top_k } => {
            search::run_query(&cfg, &text, top_k).await?;
        }
        Commands::Ask {
            question,
            top_k,
            model,
            sources,
        } => {
            search::run_ask(&cfg, &question, top_k, model.as_deref(), sources).await?;
        }
        Commands::Chat { model } => {
            chat::run_chat(&cfg, model.as_deref()).await?;
        }
        Commands::Init | Commands::Models => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
