//! Battle.net game-data and profile API client.
//!
//! [`BlizzardApi::fetch`] is the only network entry point the pipeline uses.
//! Throttling (429) is retried without limit, server errors (5xx) a bounded
//! number of times, and everything else is reported as an absent resource.

pub mod errors;
pub mod json;
pub mod models;
pub mod token;

pub use errors::BlizzardApiError;

use crate::config::Config;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://{region}.api.blizzard.com";
const LOCALE: &str = "en_US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Us,
    Eu,
    Kr,
    Tw,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Eu => "EU",
            Region::Kr => "KR",
            Region::Tw => "TW",
        }
    }

    /// Lowercase form used in hostnames and namespaces.
    pub fn host_label(self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
            Region::Kr => "kr",
            Region::Tw => "tw",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "EU" => Ok(Region::Eu),
            "KR" => Ok(Region::Kr),
            "TW" => Ok(Region::Tw),
            other => Err(format!("unknown region '{other}'")),
        }
    }
}

/// Namespace category of a resource; combined with the region as `{category}-{region}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Static,
    Dynamic,
    Profile,
}

impl Namespace {
    fn prefix(self) -> &'static str {
        match self {
            Namespace::Static => "static",
            Namespace::Dynamic => "dynamic",
            Namespace::Profile => "profile",
        }
    }
}

/// Describes one logical "read resource" operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub namespace: Namespace,
    pub region: Region,
    pub path: String,
}

impl ResourceRequest {
    pub fn static_data(region: Region, path: impl fmt::Display) -> Self {
        Self {
            namespace: Namespace::Static,
            region,
            path: format!("data/wow/{path}"),
        }
    }

    pub fn dynamic(region: Region, path: impl fmt::Display) -> Self {
        Self {
            namespace: Namespace::Dynamic,
            region,
            path: format!("data/wow/{path}"),
        }
    }

    /// `path` is relative to the character, e.g. `tichondrius/someone/equipment`.
    pub fn profile(region: Region, path: impl fmt::Display) -> Self {
        Self {
            namespace: Namespace::Profile,
            region,
            path: format!("profile/wow/character/{path}"),
        }
    }

    pub fn namespace_param(&self) -> String {
        format!("{}-{}", self.namespace.prefix(), self.region.host_label())
    }
}

/// Anything that can resolve a [`ResourceRequest`] to a body.
///
/// `None` means "not available under current conditions"; callers degrade.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Option<String>;
}

/// What to do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accept,
    Retry,
    Abandon,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Fixed wait before re-issuing a throttled or failed request.
    pub delay: Duration,
    /// Total attempts allowed while the server keeps answering 5xx.
    pub server_error_attempts: u32,
}

impl RetryPolicy {
    /// `server_error_attempt` is the 1-based count of 5xx responses seen so
    /// far including this one; 429 responses never count against it.
    pub fn disposition(&self, status: StatusCode, server_error_attempt: u32) -> Disposition {
        if status.is_success() {
            Disposition::Accept
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Disposition::Retry
        } else if status.is_server_error() && server_error_attempt < self.server_error_attempts {
            Disposition::Retry
        } else {
            Disposition::Abandon
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            server_error_attempts: 3,
        }
    }
}

/// Client for the Battle.net API holding the bearer token for the process lifetime.
pub struct BlizzardApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl BlizzardApi {
    /// Build the client from config and acquire a token.
    pub async fn connect(config: &Config) -> Result<Self, BlizzardApiError> {
        let http = Self::http_client()?;
        let token = token::acquire_token(
            &http,
            &config.oauth_url,
            &config.battle_net_client_id,
            &config.battle_net_secret,
        )
        .await?;

        let retry = RetryPolicy {
            delay: config.throttle_retry_delay(),
            server_error_attempts: config.server_error_attempts.max(1),
        };
        let rate =
            NonZeroU32::new(config.requests_per_second).ok_or(BlizzardApiError::InvalidRate)?;

        Ok(Self {
            http,
            base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token,
            retry,
            limiter: Some(RateLimiter::direct(Quota::per_second(rate))),
        })
    }

    /// Build a client around an existing token, without request pacing.
    pub fn with_token(
        base_url: impl Into<String>,
        token: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, BlizzardApiError> {
        Ok(Self {
            http: Self::http_client()?,
            base_url: base_url.into(),
            token: token.into(),
            retry,
            limiter: None,
        })
    }

    fn http_client() -> Result<reqwest::Client, BlizzardApiError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(BlizzardApiError::Client)
    }

    pub fn url_for(&self, request: &ResourceRequest) -> String {
        let base = self
            .base_url
            .replace("{region}", request.region.host_label());
        format!("{}/{}", base.trim_end_matches('/'), request.path)
    }
}

#[async_trait]
impl ResourceFetcher for BlizzardApi {
    async fn fetch(&self, request: &ResourceRequest) -> Option<String> {
        let url = self.url_for(request);
        let namespace = request.namespace_param();
        let mut server_errors = 0u32;
        let mut throttled = 0u32;

        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let response = match self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .query(&[("namespace", namespace.as_str()), ("locale", LOCALE)])
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(path = %request.path, error = %e, "Request failed");
                    return None;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                server_errors += 1;
            }

            match self.retry.disposition(status, server_errors) {
                Disposition::Accept => {
                    return match response.text().await {
                        Ok(body) => Some(body),
                        Err(e) => {
                            warn!(path = %request.path, error = %e, "Failed to read body");
                            None
                        }
                    };
                }
                Disposition::Retry => {
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        throttled += 1;
                        debug!(path = %request.path, throttled, "Throttled, retrying");
                    } else {
                        warn!(
                            path = %request.path,
                            status = status.as_u16(),
                            attempt = server_errors,
                            max_attempts = self.retry.server_error_attempts,
                            "Server error, retrying"
                        );
                    }
                    tokio::time::sleep(self.retry.delay).await;
                }
                Disposition::Abandon => {
                    if status.is_server_error() {
                        warn!(
                            path = %request.path,
                            status = status.as_u16(),
                            attempts = server_errors,
                            "Giving up after repeated server errors"
                        );
                    } else {
                        debug!(path = %request.path, status = status.as_u16(), "Resource unavailable");
                    }
                    return None;
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(1),
            server_error_attempts: 3,
        }
    }

    #[test]
    fn success_is_accepted() {
        assert_eq!(policy().disposition(StatusCode::OK, 0), Disposition::Accept);
    }

    #[test]
    fn throttle_retries_regardless_of_attempts() {
        let p = policy();
        assert_eq!(p.disposition(StatusCode::TOO_MANY_REQUESTS, 0), Disposition::Retry);
        assert_eq!(
            p.disposition(StatusCode::TOO_MANY_REQUESTS, 1_000),
            Disposition::Retry
        );
    }

    #[test]
    fn server_errors_are_bounded() {
        let p = policy();
        assert_eq!(p.disposition(StatusCode::BAD_GATEWAY, 1), Disposition::Retry);
        assert_eq!(p.disposition(StatusCode::BAD_GATEWAY, 2), Disposition::Retry);
        assert_eq!(p.disposition(StatusCode::BAD_GATEWAY, 3), Disposition::Abandon);
    }

    #[test]
    fn client_errors_are_abandoned_immediately() {
        let p = policy();
        assert_eq!(p.disposition(StatusCode::NOT_FOUND, 0), Disposition::Abandon);
        assert_eq!(p.disposition(StatusCode::FORBIDDEN, 0), Disposition::Abandon);
    }

    #[test]
    fn request_paths_and_namespaces() {
        let req = ResourceRequest::profile(Region::Eu, "ravencrest/someone/equipment");
        assert_eq!(req.path, "profile/wow/character/ravencrest/someone/equipment");
        assert_eq!(req.namespace_param(), "profile-eu");

        let req = ResourceRequest::dynamic(Region::Us, "pvp-season/index");
        assert_eq!(req.path, "data/wow/pvp-season/index");
        assert_eq!(req.namespace_param(), "dynamic-us");
    }

    #[test]
    fn url_substitutes_region() {
        let api = BlizzardApi::with_token(DEFAULT_BASE_URL, "t", policy()).unwrap();
        let req = ResourceRequest::static_data(Region::Kr, "item/19019");
        assert_eq!(
            api.url_for(&req),
            "https://kr.api.blizzard.com/data/wow/item/19019"
        );
    }

    #[test]
    fn region_parsing() {
        assert_eq!("eu".parse::<Region>().unwrap(), Region::Eu);
        assert_eq!(" US ".parse::<Region>().unwrap(), Region::Us);
        assert!("XX".parse::<Region>().is_err());
    }
}
