// Copyright 2026 Forage Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use forage_runtime::cli;

#[derive(Parser)]
#[command(
    name = "forage",
    about = "Forage — resilient descriptive-content acquisition service",
    version,
    after_help = "Run 'forage <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP acquisition server
    Serve {
        /// Port for the REST API (overrides FORAGE_HTTP_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Acquire content for a query and print it
    Acquire {
        /// The topic or query to acquire content for
        query: String,
        /// Tier hint: remote, knowledge, curated, or synthetic
        #[arg(long)]
        source: Option<String>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Serve { port } => cli::serve::run(port).await,
        Commands::Acquire { query, source } => {
            cli::acquire_cmd::run(&query, source.as_deref(), cli.json).await
        }
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "forage", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    result
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
