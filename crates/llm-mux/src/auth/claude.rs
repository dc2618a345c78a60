//! Claude OAuth login: PKCE authorization-code flow with a pasted code.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::io::Write as _;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::errors::AuthError;
use super::pkce::{generate_pkce, generate_state, PkceCodes};
use super::{Auth, Authenticator, ClaudeTokenStorage, LoginOptions, TokenStorage};
use crate::config::{ClaudeOAuthConfig, Config};

const CLAUDE_PROVIDER_NAME: &str = "claude";

pub struct ClaudeAuthenticator {
    client: reqwest::Client,
}

impl ClaudeAuthenticator {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn exchange_code(
        &self,
        cancel: &CancellationToken,
        cfg: &ClaudeOAuthConfig,
        code: &str,
        state: &str,
        pkce: &PkceCodes,
    ) -> Result<ClaudeTokenResponse, AuthError> {
        // The hosted flow hands the user "code#state"; honor the embedded
        // state over the one we sent.
        let (code, embedded_state) = match code.split_once('#') {
            Some((code, embedded)) => (code, Some(embedded)),
            None => (code, None),
        };

        let body = json!({
            "grant_type": "authorization_code",
            "code": code,
            "state": embedded_state.unwrap_or(state),
            "client_id": cfg.client_id,
            "redirect_uri": cfg.redirect_uri,
            "code_verifier": pkce.code_verifier,
        });

        let send = self.client.post(&cfg.token_url).json(&body).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            response = send => {
                response.map_err(|e| AuthError::ExchangeFailed(e.to_string()))?
            }
        };

        if !response.status().is_success() {
            return Err(AuthError::ExchangeFailed(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<ClaudeTokenResponse>()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))
    }
}

impl Default for ClaudeAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for ClaudeAuthenticator {
    fn provider(&self) -> &'static str {
        CLAUDE_PROVIDER_NAME
    }

    fn refresh_lead(&self) -> Option<Duration> {
        Some(Duration::from_secs(4 * 60 * 60))
    }

    async fn login(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        opts: &LoginOptions,
    ) -> Result<Auth, AuthError> {
        let cfg = &config.claude;
        if cfg.client_id.is_empty() {
            return Err(AuthError::MissingConfig(
                "claude client_id is required".to_string(),
            ));
        }

        let pkce = generate_pkce()?;
        let state = generate_state()?;

        // Callers must use the state echoed by the URL builder, which may
        // rewrite the one it was handed.
        let (auth_url, state) = generate_auth_url(cfg, &state, &pkce)?;

        if !opts.no_browser {
            println!("Opening browser for Claude authentication...");
            if let Err(e) = webbrowser::open(&auth_url) {
                tracing::warn!("failed to open browser automatically: {e}");
            }
        }

        println!("Visit the following URL to authenticate:\n{auth_url}\n");
        print!("Paste the authorization code from the browser: ");
        std::io::stdout().flush()?;

        let line = read_stdin_line(cancel).await?;
        let code = normalize_authorization_code(&line)?;

        tracing::debug!("claude authorization code received; exchanging for tokens");

        let tokens = self.exchange_code(cancel, cfg, code, &state, &pkce).await?;
        let storage = token_storage(tokens);

        if storage.email.is_empty() {
            return Err(AuthError::IncompleteStorage);
        }

        if storage.api_key.is_some() {
            println!("Claude API key obtained and stored");
        }

        let file_name = format!("claude-{}.json", storage.email);
        let mut metadata = opts.metadata.clone();
        metadata.insert("email".to_string(), storage.email.clone());

        Ok(Auth {
            id: file_name.clone(),
            provider: self.provider().to_string(),
            file_name,
            storage: TokenStorage::Claude(storage),
            metadata,
        })
    }

    async fn refresh(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        auth: &Auth,
    ) -> Result<Auth, AuthError> {
        let TokenStorage::Claude(current) = &auth.storage else {
            return Err(AuthError::IncompleteStorage);
        };
        let cfg = &config.claude;

        let body = json!({
            "grant_type": "refresh_token",
            "refresh_token": current.refresh_token,
            "client_id": cfg.client_id,
        });

        let send = self.client.post(&cfg.token_url).json(&body).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            response = send => {
                response.map_err(|e| AuthError::ExchangeFailed(e.to_string()))?
            }
        };

        if !response.status().is_success() {
            return Err(AuthError::ExchangeFailed(format!(
                "refresh endpoint returned {}",
                response.status()
            )));
        }

        let tokens: ClaudeTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        let mut storage = token_storage(tokens);
        if storage.email.is_empty() {
            storage.email = current.email.clone();
        }
        if storage.refresh_token.is_empty() {
            storage.refresh_token = current.refresh_token.clone();
        }
        if storage.api_key.is_none() {
            storage.api_key = current.api_key.clone();
        }

        let mut refreshed = auth.clone();
        refreshed.storage = TokenStorage::Claude(storage);
        Ok(refreshed)
    }
}

/// Builds the authorization URL and echoes the state it embedded. Callers
/// must thread the returned state into the code exchange.
fn generate_auth_url(
    cfg: &ClaudeOAuthConfig,
    state: &str,
    pkce: &PkceCodes,
) -> Result<(String, String), AuthError> {
    if cfg.authorize_url.is_empty() {
        return Err(AuthError::AuthUrlBuild(
            "authorize_url is required".to_string(),
        ));
    }

    let query = [
        ("code", "true"),
        ("client_id", cfg.client_id.as_str()),
        ("response_type", "code"),
        ("redirect_uri", cfg.redirect_uri.as_str()),
        ("scope", cfg.scopes.as_str()),
        ("code_challenge", pkce.code_challenge.as_str()),
        ("code_challenge_method", "S256"),
        ("state", state),
    ];
    let qs = query
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    Ok((format!("{}?{qs}", cfg.authorize_url), state.to_string()))
}

/// Trims the pasted authorization code; empty input is a distinct,
/// retryable failure.
fn normalize_authorization_code(line: &str) -> Result<&str, AuthError> {
    let code = line.trim();
    if code.is_empty() {
        return Err(AuthError::MissingUserInput);
    }
    Ok(code)
}

async fn read_stdin_line(cancel: &CancellationToken) -> Result<String, AuthError> {
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let bytes = std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>((bytes, line))
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        joined = read => {
            let (bytes, line) = joined
                .map_err(|e| std::io::Error::other(format!("stdin task failed: {e}")))??;
            if bytes == 0 {
                // Closed stdin before any input.
                return Err(AuthError::MissingUserInput);
            }
            Ok(line)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaudeTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    account: Option<ClaudeAccount>,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeAccount {
    #[serde(default)]
    email_address: String,
}

fn token_storage(tokens: ClaudeTokenResponse) -> ClaudeTokenStorage {
    let email = tokens
        .account
        .map(|account| account.email_address)
        .unwrap_or_default();

    ClaudeTokenStorage {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: Utc::now() + chrono::Duration::seconds(tokens.expires_in),
        email,
        api_key: tokens.api_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_pkce() -> PkceCodes {
        generate_pkce().unwrap()
    }

    fn config_for(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.claude.token_url = format!("{}/v1/oauth/token", server.uri());
        config
    }

    #[test]
    fn auth_url_contains_required_params() {
        let cfg = ClaudeOAuthConfig::default();
        let pkce = PkceCodes {
            code_verifier: "verifierXYZ".to_string(),
            code_challenge: "challengeXYZ".to_string(),
        };
        let (url, state) = generate_auth_url(&cfg, "stateABC", &pkce).unwrap();

        assert!(url.starts_with("https://claude.ai/oauth/authorize?"));
        for needle in [
            "code=true",
            "response_type=code",
            "code_challenge=challengeXYZ",
            "code_challenge_method=S256",
            "state=stateABC",
            "scope=org%3Acreate_api_key%20user%3Aprofile%20user%3Ainference",
        ] {
            assert!(url.contains(needle), "missing query param: {needle}");
        }
        assert_eq!(state, "stateABC");
    }

    #[test]
    fn auth_url_requires_authorize_url() {
        let mut cfg = ClaudeOAuthConfig::default();
        cfg.authorize_url.clear();
        let result = generate_auth_url(&cfg, "s", &test_pkce());
        assert!(matches!(result, Err(AuthError::AuthUrlBuild(_))));
    }

    #[test]
    fn empty_authorization_code_is_rejected_before_exchange() {
        for input in ["", "   ", "\n"] {
            assert!(matches!(
                normalize_authorization_code(input),
                Err(AuthError::MissingUserInput)
            ));
        }
        assert_eq!(normalize_authorization_code("  abc#xyz \n").unwrap(), "abc#xyz");
    }

    #[tokio::test]
    async fn exchange_parses_token_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "authorization_code",
                "code": "the-code",
                "state": "the-state",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "account": {"email_address": "dev@example.com"}
            })))
            .mount(&server)
            .await;

        let authenticator = ClaudeAuthenticator::new();
        let config = config_for(&server);
        let tokens = authenticator
            .exchange_code(
                &CancellationToken::new(),
                &config.claude,
                "the-code",
                "the-state",
                &test_pkce(),
            )
            .await
            .unwrap();

        let storage = token_storage(tokens);
        assert_eq!(storage.access_token, "at");
        assert_eq!(storage.email, "dev@example.com");
        assert!(storage.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn pasted_code_with_embedded_state_overrides_sent_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "code": "the-code",
                "state": "embedded-state",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "refresh_token": "rt",
            })))
            .mount(&server)
            .await;

        let authenticator = ClaudeAuthenticator::new();
        let config = config_for(&server);
        let result = authenticator
            .exchange_code(
                &CancellationToken::new(),
                &config.claude,
                "the-code#embedded-state",
                "sent-state",
                &test_pkce(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn exchange_failure_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let authenticator = ClaudeAuthenticator::new();
        let config = config_for(&server);
        let result = authenticator
            .exchange_code(
                &CancellationToken::new(),
                &config.claude,
                "bad-code",
                "state",
                &test_pkce(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::ExchangeFailed(_))));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let authenticator = ClaudeAuthenticator::new();
        let config = config_for(&server);
        let result = authenticator
            .exchange_code(&cancel, &config.claude, "code", "state", &test_pkce())
            .await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn refresh_keeps_principal_when_response_omits_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": "rt",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at2",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;

        let authenticator = ClaudeAuthenticator::new();
        let config = config_for(&server);
        let auth = Auth {
            id: "claude-dev@example.com.json".to_string(),
            provider: "claude".to_string(),
            file_name: "claude-dev@example.com.json".to_string(),
            storage: TokenStorage::Claude(ClaudeTokenStorage {
                access_token: "at".to_string(),
                refresh_token: "rt".to_string(),
                expires_at: Utc::now(),
                email: "dev@example.com".to_string(),
                api_key: Some("sk-ant-test".to_string()),
            }),
            metadata: Default::default(),
        };

        let refreshed = authenticator
            .refresh(&CancellationToken::new(), &config, &auth)
            .await
            .unwrap();

        let TokenStorage::Claude(storage) = refreshed.storage else {
            panic!("wrong storage variant");
        };
        assert_eq!(storage.access_token, "at2");
        assert_eq!(storage.email, "dev@example.com");
        assert_eq!(storage.refresh_token, "rt");
        assert_eq!(storage.api_key.as_deref(), Some("sk-ant-test"));
    }
}
