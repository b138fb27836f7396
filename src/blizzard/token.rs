//! OAuth2 client-credentials token acquisition.

use super::BlizzardApiError;
use super::json::parse_json_with_context;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Exchange client credentials for a bearer token.
///
/// Failure here is a startup precondition, not a per-resource fault.
pub async fn acquire_token(
    http: &reqwest::Client,
    oauth_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, BlizzardApiError> {
    let response = http
        .post(oauth_url)
        .basic_auth(client_id, Some(client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .map_err(BlizzardApiError::TokenRequest)?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(BlizzardApiError::TokenRequest)?;

    if !status.is_success() {
        return Err(BlizzardApiError::TokenRejected {
            status: status.as_u16(),
            body,
        });
    }

    let token: AccessTokenResponse = parse_json_with_context(&body)
        .map_err(|source| BlizzardApiError::TokenParse { source })?;
    info!(expires_in = token.expires_in, "Acquired API token");
    Ok(token.access_token)
}
