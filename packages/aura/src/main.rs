use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

mod cli;
mod config;
mod render;

use crate::config::AuraPaths;

#[derive(Parser)]
#[command(name = "aura")]
#[command(about = "Explain selected GitHub code, streamed to the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom data directory (defaults to ~/.aura)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain a code selection from a GitHub file
    Explain(ExplainArgs),

    /// Show or change persisted settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Parser)]
struct ExplainArgs {
    /// GitHub file URL, e.g. https://github.com/owner/repo/blob/main/src/lib.rs
    url: String,

    /// Selected code (read from stdin when omitted)
    #[arg(short, long)]
    text: Option<String>,

    /// Language override (derived from the file extension by default)
    #[arg(short, long)]
    language: Option<String>,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Persist the explanation server URL
    SetServer {
        /// Base URL, e.g. http://localhost:8787
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug);

    let paths = AuraPaths::new(cli.data_dir.clone())?;

    match cli.command {
        Commands::Explain(args) => {
            let settings = paths.load()?;
            cli::explain_command(&settings, &args.url, args.text, args.language).await
        }
        Commands::Config(ConfigCommand::Show) => cli::show_command(&paths, &paths.load()?),
        // Does not require the other settings to be valid
        Commands::Config(ConfigCommand::SetServer { url }) => {
            cli::set_server_command(&paths, &url)
        }
    }
}

/// Logs go to stderr so the explanation on stdout stays clean.
fn init_logging(debug: bool) {
    let default_directive = if debug {
        "aura=debug,aura_stream=debug,info"
    } else {
        "aura=info,aura_stream=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}
