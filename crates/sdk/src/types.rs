//! Top-level SDK error taxonomy.

/// Errors returned by [`crate::client::Client::init`] and friends.
#[derive(thiserror::Error, Debug)]
pub enum SdkError {
    #[error("missing credentials: no api_key argument, LOGSENTRY_API_KEY, or credentials file")]
    MissingCredentials,

    #[error("config: {0}")]
    Config(String),

    #[error("credentials file: {0}")]
    Credentials(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
