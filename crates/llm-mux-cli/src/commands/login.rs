use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use llm_mux::auth::{AuthManager, FileCredentialStore, LoginOptions};
use llm_mux::config::Config;

pub async fn claude_login(config_path: Option<&Path>, no_browser: bool) -> Result<()> {
    match run_login(config_path, "claude", no_browser).await {
        Ok(principal) => {
            println!("Claude authentication successful for {principal}");
            Ok(())
        }
        Err(e) => {
            eprintln!("Claude authentication failed: {e}");
            std::process::exit(1);
        }
    }
}

pub async fn copilot_login(config_path: Option<&Path>, no_browser: bool) -> Result<()> {
    match run_login(config_path, "github-copilot", no_browser).await {
        Ok(_) => {
            println!("GitHub Copilot authentication successful!");
            Ok(())
        }
        Err(e) => {
            eprintln!("GitHub Copilot authentication failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_login(
    config_path: Option<&Path>,
    provider: &str,
    no_browser: bool,
) -> Result<String> {
    let config = Config::load(config_path)?;

    let manager = AuthManager::new(FileCredentialStore::new(config.auth_dir.clone()));

    // Ctrl-C aborts the interactive flow instead of killing the process
    // mid-write.
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let opts = LoginOptions {
        no_browser,
        metadata: HashMap::new(),
    };

    let auth = manager.login(&cancel, provider, &config, &opts).await?;
    Ok(auth.principal().to_string())
}
