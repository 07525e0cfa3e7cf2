mod cmd_config;
mod cmd_flatten;
mod cmd_inspect;
mod cmd_migrate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tessera_core::OfflineManager;
use tessera_session::LoadedSession;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tessera", version, about = "Inspect and migrate Tessera session files")]
struct Cli {
    /// Project root that session file paths resolve against (default: cwd)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize the steps and contexts of a session file
    Inspect {
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List contexts in timeline order, as undo/redo sees them
    Flatten {
        file: PathBuf,
        /// Include each context's fragment table of contents
        #[arg(long)]
        toc: bool,
    },
    /// Rewrite a session file (legacy or current) in the current format
    Migrate {
        input: PathBuf,
        /// Destination (default: overwrite the input)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Report what would be written without writing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the effective ranking configuration
    Config {
        /// JSON config file; environment overrides still apply
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load a session file with an offline manager rooted at `root`.
pub(crate) fn load_session(root: &Path, file: &Path) -> anyhow::Result<LoadedSession> {
    let manager = Arc::new(OfflineManager::new(root));
    tessera_session::load_history(file, manager)
        .with_context(|| format!("loading session {}", file.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.cmd {
        Command::Inspect { file, json } => cmd_inspect::execute(&root, &file, json),
        Command::Flatten { file, toc } => cmd_flatten::execute(&root, &file, toc),
        Command::Migrate {
            input,
            output,
            dry_run,
        } => cmd_migrate::execute(&root, &input, output.as_deref(), dry_run),
        Command::Config { file } => cmd_config::execute(file.as_deref()),
    }
}
