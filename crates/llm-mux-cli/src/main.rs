use anyhow::Result;
use llm_mux_cli::cli::cli;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = llm_mux_cli::logging::setup_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    cli().await
}
