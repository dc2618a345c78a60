//! Per-provider authentication lifecycles.
//!
//! Each [`Authenticator`] drives an interactive login flow and yields an
//! [`Auth`] bundle; the [`AuthManager`] dispatches on provider tag and
//! persists the result. A background refresh loop (outside this crate)
//! reads [`Authenticator::refresh_lead`] and calls
//! [`Authenticator::refresh`] ahead of expiry.

mod claude;
mod copilot;
mod credentials;
mod errors;
mod pkce;

pub use claude::ClaudeAuthenticator;
pub use copilot::CopilotAuthenticator;
pub use credentials::{display_path, CredentialStore, FileCredentialStore};
pub use errors::AuthError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Provider-dependent token material plus the principal it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenStorage {
    Claude(ClaudeTokenStorage),
    GithubCopilot(CopilotTokenStorage),
}

impl TokenStorage {
    pub fn principal(&self) -> &str {
        match self {
            TokenStorage::Claude(storage) => &storage.email,
            TokenStorage::GithubCopilot(storage) => &storage.login,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeTokenStorage {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotTokenStorage {
    /// GitHub OAuth token obtained through the device flow.
    pub access_token: String,
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Short-lived Copilot API bearer, minted from `access_token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

/// Credential bundle: created by an authenticator, persisted through the
/// credential store, reloaded at startup and refreshed ahead of expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    pub id: String,
    pub provider: String,
    pub file_name: String,
    pub storage: TokenStorage,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Auth {
    pub fn principal(&self) -> &str {
        self.storage.principal()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    pub no_browser: bool,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Stable provider tag used for dispatch.
    fn provider(&self) -> &'static str;

    /// How far ahead of expiry a background refresh should fire.
    fn refresh_lead(&self) -> Option<Duration> {
        None
    }

    /// Runs the interactive login flow. Must abandon network waits and
    /// user prompts when `cancel` fires.
    async fn login(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        opts: &LoginOptions,
    ) -> Result<Auth, AuthError>;

    /// Renews the token material in `auth`, returning the updated bundle.
    async fn refresh(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        auth: &Auth,
    ) -> Result<Auth, AuthError>;
}

/// Closed set of authenticators keyed by provider tag.
pub struct AuthManager {
    authenticators: Vec<Box<dyn Authenticator>>,
    store: FileCredentialStore,
}

impl AuthManager {
    pub fn new(store: FileCredentialStore) -> Self {
        Self {
            authenticators: vec![
                Box::new(ClaudeAuthenticator::new()),
                Box::new(CopilotAuthenticator::new()),
            ],
            store,
        }
    }

    pub fn authenticator(&self, provider: &str) -> Option<&dyn Authenticator> {
        self.authenticators
            .iter()
            .find(|authenticator| authenticator.provider() == provider)
            .map(|boxed| boxed.as_ref())
    }

    pub fn refresh_lead(&self, provider: &str) -> Option<Duration> {
        self.authenticator(provider)?.refresh_lead()
    }

    /// Runs the provider's login flow and persists the resulting bundle.
    pub async fn login(
        &self,
        cancel: &CancellationToken,
        provider: &str,
        config: &Config,
        opts: &LoginOptions,
    ) -> Result<Auth, AuthError> {
        let authenticator = self
            .authenticator(provider)
            .ok_or_else(|| AuthError::UnknownProvider(provider.to_string()))?;

        let auth = authenticator.login(cancel, config, opts).await?;

        let path = self.store.save(&auth).await?;
        println!("Saving credentials to {}", display_path(&path));

        Ok(auth)
    }

    /// Renews `auth` through its provider's authenticator and persists the
    /// updated bundle. Invoked by the background refresh loop.
    pub async fn refresh(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        auth: &Auth,
    ) -> Result<Auth, AuthError> {
        let authenticator = self
            .authenticator(&auth.provider)
            .ok_or_else(|| AuthError::UnknownProvider(auth.provider.clone()))?;

        let refreshed = authenticator.refresh(cancel, config, auth).await?;

        let path = self.store.save(&refreshed).await?;
        tracing::debug!(path = %display_path(&path), "refreshed credentials");

        Ok(refreshed)
    }

    pub fn store(&self) -> &FileCredentialStore {
        &self.store
    }
}
