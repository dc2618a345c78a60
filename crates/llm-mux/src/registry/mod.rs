mod model;

pub use model::{ModelInfo, Provider, ThinkingBudgets, ThinkingSupport};

use anyhow::{Context, Result};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::path::Path;

/// Cached bundled model catalog. A parse failure degrades to an empty
/// registry so lookups answer "no info" instead of tearing down the process.
static BUNDLED_REGISTRY: Lazy<ModelRegistry> = Lazy::new(|| {
    const MODELS_JSON: &str = include_str!("data/models.json");

    ModelRegistry::from_json(MODELS_JSON).unwrap_or_else(|e| {
        tracing::error!("failed to parse bundled model catalog: {e}");
        ModelRegistry::new()
    })
});

/// Registry installed at startup when a config overlay is present. Written
/// at most once, before the first request; afterwards read-only.
static GLOBAL_REGISTRY: OnceCell<ModelRegistry> = OnceCell::new();

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelInfo>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    fn from_json(json: &str) -> Result<Self> {
        let models: Vec<ModelInfo> =
            serde_json::from_str(json).context("failed to parse model catalog JSON")?;

        let mut registry = Self::new();
        for model in models {
            registry.register(model);
        }
        Ok(registry)
    }

    /// Bundled catalog extended with the entries from an overlay file.
    /// Overlay entries win on name collision.
    pub fn with_overlay_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("failed to read model overlay file")?;

        let overlay: Vec<ModelInfo> =
            serde_json::from_str(&content).context("failed to parse model overlay JSON")?;

        let mut registry = Self::bundled().clone();
        for model in overlay {
            registry.register(model);
        }
        Ok(registry)
    }

    pub fn bundled() -> &'static Self {
        &BUNDLED_REGISTRY
    }

    /// Process-wide registry: the overlayed one when installed, the bundled
    /// catalog otherwise.
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get().unwrap_or_else(Self::bundled)
    }

    /// Install `registry` as the process-wide registry. Must happen during
    /// startup, before the first request; returns the rejected registry if
    /// one was already installed.
    pub fn init_global(registry: ModelRegistry) -> std::result::Result<(), ModelRegistry> {
        GLOBAL_REGISTRY.set(registry)
    }

    pub fn register(&mut self, model: ModelInfo) {
        self.models.insert(model.name.clone(), model);
    }

    pub fn get_model_info(&self, name: &str) -> Option<&ModelInfo> {
        self.models.get(name)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.values()
    }

    pub fn count(&self) -> usize {
        self.models.len()
    }
}
