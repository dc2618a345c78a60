use serde::{Deserialize, Serialize};

use crate::thinking::ThinkingLevel;

/// Upstream backend a model is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Claude,
    Gemini,
    Copilot,
    Openai,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Gemini => "gemini",
            Provider::Copilot => "copilot",
            Provider::Openai => "openai",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level-to-budget table. An all-zero table means "not defined" and callers
/// substitute the process-wide defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingBudgets {
    #[serde(default)]
    pub low: i64,
    #[serde(default)]
    pub medium: i64,
    #[serde(default)]
    pub high: i64,
    #[serde(default)]
    pub max: i64,
}

impl ThinkingBudgets {
    pub fn is_empty(&self) -> bool {
        *self == ThinkingBudgets::default()
    }

    pub fn for_level(&self, level: ThinkingLevel) -> i64 {
        match level {
            ThinkingLevel::Low => self.low,
            ThinkingLevel::Medium => self.medium,
            ThinkingLevel::High => self.high,
            ThinkingLevel::Max => self.max,
        }
    }
}

/// Extended-reasoning capability of a model. `min`/`max` of 0 mean
/// "unbounded on that side".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkingSupport {
    #[serde(default)]
    pub min: i64,
    #[serde(default)]
    pub max: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_level: Option<ThinkingLevel>,
    #[serde(default)]
    pub budgets: ThinkingBudgets,
}

/// Capability record for a single advertised model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub provider: Provider,

    /// Maximum output/completion tokens; 0 when unknown.
    #[serde(default)]
    pub max_completion_tokens: i64,

    /// Absent when the model does not support thinking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingSupport>,
}

impl ModelInfo {
    pub fn supports_thinking(&self) -> bool {
        self.thinking.is_some()
    }
}
