//! tagloop - an agent driven through a tag mini-language

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{init_command, run_command, status_command};

/// tagloop - autonomous agent for your terminal
#[derive(Parser)]
#[command(name = "tagloop")]
#[command(about = "◆ An autonomous agent that works through tagged actions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and workspace
    Init,
    /// Run one task
    Run(RunArgs),
    /// Show configuration status
    Status,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Task to run; asked for interactively when absent
    #[arg(short, long)]
    pub message: Option<String>,
    /// Workspace directory (overrides the config)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,
    /// Store assistant turns verbatim
    #[arg(long)]
    pub no_summarize: bool,
    /// Keep failed attempts in the context
    #[arg(long)]
    pub no_prune: bool,
    /// Run commands flagged for approval without asking
    #[arg(long)]
    pub auto_approve: bool,
    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(matches!(&cli.command, Commands::Run(args) if args.verbose));

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Run(args) => run_command(args).await,
        Commands::Status => status_command().await,
    };
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
