use anyhow::{Context, Result};
use std::sync::Once;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use llm_mux::config::Paths;

// Used to ensure we only set up tracing once
static INIT: Once = Once::new();

/// Sets up file-based JSON logging for the CLI. Console output is reserved
/// for the interactive login prompts.
pub fn setup_logging() -> Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = (|| {
            let log_dir = Paths::in_state_dir("logs/cli");
            std::fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
            let file_appender = tracing_appender::rolling::RollingFileAppender::new(
                Rotation::NEVER,
                log_dir,
                format!("{timestamp}.log"),
            );

            let file_layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(file_appender)
                .with_ansi(false)
                .json();

            let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("")
                    .add_directive("llm_mux=debug".parse().unwrap())
                    .add_directive("llm_mux_cli=info".parse().unwrap())
                    .add_directive(LevelFilter::WARN.into())
            });

            Registry::default()
                .with(vec![file_layer.with_filter(env_filter).boxed()])
                .try_init()
                .context("Failed to set global subscriber")?;

            Ok(())
        })();
    });

    result
}
