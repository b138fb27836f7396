//! Error types for the Battle.net API client.

#[derive(Debug, thiserror::Error)]
pub enum BlizzardApiError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("token request failed")]
    TokenRequest(#[source] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    TokenRejected { status: u16, body: String },
    #[error("failed to parse token response")]
    TokenParse {
        #[source]
        source: anyhow::Error,
    },
    #[error("requests per second must be non-zero")]
    InvalidRate,
}
