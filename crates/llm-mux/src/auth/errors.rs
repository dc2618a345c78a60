use thiserror::Error;

/// Login and refresh failures. The CLI and the background refresh loop
/// decide whether to log, retry or abort; nothing in here is swallowed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration is required: {0}")]
    MissingConfig(String),

    #[error("pkce generation failed: {0}")]
    PkceGeneration(String),

    #[error("state generation failed: {0}")]
    StateGeneration(String),

    #[error("authorization url generation failed: {0}")]
    AuthUrlBuild(String),

    /// Empty paste or closed stdin; the caller may prompt again.
    #[error("no authorization code provided")]
    MissingUserInput,

    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("token storage missing account information")]
    IncompleteStorage,

    #[error("unknown auth provider: {0}")]
    UnknownProvider(String),

    #[error("login cancelled")]
    Cancelled,

    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
