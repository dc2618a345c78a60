//! GitHub Copilot login: OAuth device-code flow (RFC 8628).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::errors::AuthError;
use super::{Auth, Authenticator, CopilotTokenStorage, LoginOptions, TokenStorage};
use crate::config::{Config, CopilotOAuthConfig};

const GITHUB_COPILOT_PROVIDER_NAME: &str = "github-copilot";
const DEVICE_FLOW_SCOPE: &str = "read:user";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_DEVICE_EXPIRY_SECS: u64 = 15 * 60;

pub struct CopilotAuthenticator {
    client: reqwest::Client,
}

impl CopilotAuthenticator {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn get_device_code(
        &self,
        cfg: &CopilotOAuthConfig,
    ) -> Result<DeviceCodeInfo, AuthError> {
        #[derive(Serialize)]
        struct DeviceCodeRequest<'a> {
            client_id: &'a str,
            scope: &'a str,
        }

        let response = self
            .client
            .post(&cfg.device_code_url)
            .headers(github_headers())
            .json(&DeviceCodeRequest {
                client_id: &cfg.client_id,
                scope: DEVICE_FLOW_SCOPE,
            })
            .send()
            .await?
            .error_for_status()?;

        response
            .json::<DeviceCodeInfo>()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("device code response: {e}")))
    }

    /// Polls the token endpoint at the server-provided cadence until the
    /// user approves, the code expires, or `cancel` fires.
    async fn poll_for_access_token(
        &self,
        cancel: &CancellationToken,
        cfg: &CopilotOAuthConfig,
        device: &DeviceCodeInfo,
    ) -> Result<String, AuthError> {
        #[derive(Serialize)]
        struct AccessTokenRequest<'a> {
            client_id: &'a str,
            device_code: &'a str,
            grant_type: &'a str,
        }

        #[derive(Debug, Deserialize)]
        struct AccessTokenResponse {
            access_token: Option<String>,
            error: Option<String>,
        }

        let mut interval = Duration::from_secs(
            device.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        );
        let expiry = Duration::from_secs(
            device.expires_in.unwrap_or(DEFAULT_DEVICE_EXPIRY_SECS),
        );
        let start = Instant::now();

        loop {
            if start.elapsed() >= expiry {
                return Err(AuthError::ExchangeFailed(
                    "device authorization expired before approval".to_string(),
                ));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }

            let response = self
                .client
                .post(&cfg.access_token_url)
                .headers(github_headers())
                .json(&AccessTokenRequest {
                    client_id: &cfg.client_id,
                    device_code: &device.device_code,
                    grant_type: "urn:ietf:params:oauth:grant-type:device_code",
                })
                .send()
                .await?
                .error_for_status()?
                .json::<AccessTokenResponse>()
                .await
                .map_err(|e| AuthError::ExchangeFailed(format!("access token response: {e}")))?;

            if let Some(access_token) = response.access_token {
                return Ok(access_token);
            }

            match response.error.as_deref() {
                Some("authorization_pending") => {
                    tracing::debug!("authorization pending");
                }
                Some("slow_down") => {
                    interval += Duration::from_secs(5);
                }
                Some(error) => {
                    return Err(AuthError::ExchangeFailed(format!(
                        "device flow failed: {error}"
                    )));
                }
                None => tracing::debug!("unexpected device flow response"),
            }
        }
    }

    async fn fetch_user(
        &self,
        cfg: &CopilotOAuthConfig,
        access_token: &str,
    ) -> Result<GithubUser, AuthError> {
        let response = self
            .client
            .get(&cfg.user_url)
            .headers(github_headers())
            .header(header::AUTHORIZATION, format!("token {access_token}"))
            .send()
            .await?
            .error_for_status()?;

        response
            .json::<GithubUser>()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("user response: {e}")))
    }

    /// Mints a short-lived Copilot API bearer from the GitHub OAuth token.
    async fn mint_api_token(
        &self,
        cancel: &CancellationToken,
        cfg: &CopilotOAuthConfig,
        access_token: &str,
    ) -> Result<CopilotTokenInfo, AuthError> {
        let send = self
            .client
            .get(&cfg.api_key_url)
            .headers(github_headers())
            .header(header::AUTHORIZATION, format!("bearer {access_token}"))
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            response = send => response?.error_for_status()?,
        };

        response
            .json::<CopilotTokenInfo>()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("copilot token response: {e}")))
    }
}

impl Default for CopilotAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for CopilotAuthenticator {
    fn provider(&self) -> &'static str {
        GITHUB_COPILOT_PROVIDER_NAME
    }

    fn refresh_lead(&self) -> Option<Duration> {
        Some(Duration::from_secs(10 * 60))
    }

    async fn login(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        opts: &LoginOptions,
    ) -> Result<Auth, AuthError> {
        let cfg = &config.copilot;
        if cfg.client_id.is_empty() {
            return Err(AuthError::MissingConfig(
                "copilot client_id is required".to_string(),
            ));
        }

        let device = self.get_device_code(cfg).await?;
        println!(
            "Please visit {} and enter code {}",
            device.verification_uri, device.user_code
        );

        let access_token = self.poll_for_access_token(cancel, cfg, &device).await?;

        let user = self.fetch_user(cfg, &access_token).await?;
        if user.login.is_empty() {
            return Err(AuthError::IncompleteStorage);
        }

        let file_name = format!("github-copilot-{}.json", user.login);
        let mut metadata = opts.metadata.clone();
        metadata.insert("login".to_string(), user.login.clone());

        Ok(Auth {
            id: file_name.clone(),
            provider: self.provider().to_string(),
            file_name,
            storage: TokenStorage::GithubCopilot(CopilotTokenStorage {
                access_token,
                login: user.login,
                email: user.email,
                api_token: None,
                api_token_expires_at: None,
                api_endpoint: None,
            }),
            metadata,
        })
    }

    async fn refresh(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        auth: &Auth,
    ) -> Result<Auth, AuthError> {
        let TokenStorage::GithubCopilot(current) = &auth.storage else {
            return Err(AuthError::IncompleteStorage);
        };

        let info = self
            .mint_api_token(cancel, &config.copilot, &current.access_token)
            .await?;

        let mut storage = current.clone();
        storage.api_token = Some(info.token);
        storage.api_token_expires_at = DateTime::<Utc>::from_timestamp(info.expires_at, 0);
        storage.api_endpoint = info.endpoints.and_then(|endpoints| endpoints.api);

        let mut refreshed = auth.clone();
        refreshed.storage = TokenStorage::GithubCopilot(storage);
        Ok(refreshed)
    }
}

fn github_headers() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, "application/json".parse().unwrap());
    headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    headers.insert(header::USER_AGENT, "GithubCopilot/1.155.0".parse().unwrap());
    headers.insert("editor-version", "vscode/1.85.1".parse().unwrap());
    headers.insert("editor-plugin-version", "copilot/1.155.0".parse().unwrap());
    headers
}

#[derive(Debug, Deserialize)]
struct DeviceCodeInfo {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CopilotTokenInfo {
    token: String,
    #[serde(default)]
    expires_at: i64,
    #[serde(default)]
    endpoints: Option<CopilotEndpoints>,
}

#[derive(Debug, Deserialize)]
struct CopilotEndpoints {
    #[serde(default)]
    api: Option<String>,
}
