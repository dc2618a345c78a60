pub mod paths;

pub use paths::Paths;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Gateway configuration. Every field has a working default so a missing
/// config file is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory credential bundles are persisted into.
    pub auth_dir: PathBuf,

    /// Optional JSON catalog merged over the bundled model registry.
    pub models_overlay: Option<PathBuf>,

    pub claude: ClaudeOAuthConfig,
    pub copilot: CopilotOAuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_dir: Paths::in_config_dir("auth"),
            models_overlay: None,
            claude: ClaudeOAuthConfig::default(),
            copilot: CopilotOAuthConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config from `path`, or from `<config_dir>/config.toml`
    /// when no path is given. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Paths::in_config_dir("config.toml"),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeOAuthConfig {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: String,
}

impl Default for ClaudeOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: "9d1c250a-e61b-44d9-88ed-5944d1962f5e".to_string(),
            authorize_url: "https://claude.ai/oauth/authorize".to_string(),
            token_url: "https://console.anthropic.com/v1/oauth/token".to_string(),
            redirect_uri: "https://console.anthropic.com/oauth/code/callback".to_string(),
            scopes: "org:create_api_key user:profile user:inference".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotOAuthConfig {
    pub client_id: String,
    pub device_code_url: String,
    pub access_token_url: String,
    pub api_key_url: String,
    pub user_url: String,
}

impl Default for CopilotOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: "Iv1.b507a08c87ecfe98".to_string(),
            device_code_url: "https://github.com/login/device/code".to_string(),
            access_token_url: "https://github.com/login/oauth/access_token".to_string(),
            api_key_url: "https://api.github.com/copilot_internal/v2/token".to_string(),
            user_url: "https://api.github.com/user".to_string(),
        }
    }
}
