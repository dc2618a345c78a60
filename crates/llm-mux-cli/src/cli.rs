use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{login, models};

#[derive(Parser)]
#[command(name = "llm-mux", about = "LLM gateway utilities", version)]
struct Cli {
    /// Path to the config file (defaults to <config_dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate an upstream provider
    Login {
        #[command(subcommand)]
        provider: LoginProvider,
    },
    /// List advertised models
    Models,
}

#[derive(Subcommand)]
enum LoginProvider {
    /// Claude OAuth login (PKCE, pasted authorization code)
    Claude {
        /// Skip opening the authorization URL in a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// GitHub Copilot login (device code flow)
    Copilot {
        #[arg(long)]
        no_browser: bool,
    },
}

pub async fn cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Login { provider } => match provider {
            LoginProvider::Claude { no_browser } => {
                login::claude_login(cli.config.as_deref(), no_browser).await
            }
            LoginProvider::Copilot { no_browser } => {
                login::copilot_login(cli.config.as_deref(), no_browser).await
            }
        },
        Command::Models => models::list_models(cli.config.as_deref()),
    }
}
