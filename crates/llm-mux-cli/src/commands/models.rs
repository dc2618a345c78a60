use anyhow::Result;
use std::path::Path;

use llm_mux::config::Config;
use llm_mux::registry::{ModelInfo, ModelRegistry};

pub fn list_models(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    let registry = match &config.models_overlay {
        Some(path) => ModelRegistry::with_overlay_file(path)?,
        None => ModelRegistry::bundled().clone(),
    };

    let mut models: Vec<&ModelInfo> = registry.models().collect();
    models.sort_by(|a, b| a.name.cmp(&b.name));

    for model in models {
        let thinking = match &model.thinking {
            Some(ts) => format!("thinking {}..{}", ts.min, ts.max),
            None => "-".to_string(),
        };
        println!(
            "{:<24} {:<8} max_out={:<7} {}",
            model.name, model.provider, model.max_completion_tokens, thinking
        );
    }

    Ok(())
}
