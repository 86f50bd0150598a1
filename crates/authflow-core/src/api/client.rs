//! Login client for the authentication endpoint.
//!
//! `ApiClient` performs the credential exchange over HTTP and classifies
//! every outcome into an [`AuthError`]. The [`Authenticator`] trait is the
//! seam the session controller drives, so tests can substitute a fake.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{AuthToken, Credentials};
use crate::config::Config;

use super::error::{classify, AuthError, ResponseSignal};

// ============================================================================
// Constants
// ============================================================================

/// Path of the credential exchange endpoint, relative to the base URL
const LOGIN_PATH: &str = "/login";

/// Profile returned by a "current user" lookup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub username: String,
}

/// Remote credential exchange.
///
/// Each `login` call sends exactly one request; retry policy belongs to the
/// caller.
pub trait Authenticator: Send + Sync + 'static {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AuthToken, AuthError>> + Send;

    /// Exchange a refresh token for a new pair.
    fn refresh(
        &self,
        _token: &AuthToken,
    ) -> impl Future<Output = Result<AuthToken, AuthError>> + Send {
        async { Err(AuthError::NotImplemented("token refresh")) }
    }

    /// Look up the account the token belongs to.
    fn current_user(
        &self,
        _token: &AuthToken,
    ) -> impl Future<Output = Result<UserProfile, AuthError>> + Send {
        async { Err(AuthError::NotImplemented("current user lookup")) }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    success: bool,
    token: Option<String>,
    refresh: Option<String>,
}

/// HTTP implementation of [`Authenticator`].
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token_ttl: Option<chrono::Duration>,
}

impl ApiClient {
    /// Create a client from the loaded configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let token_ttl = match config.token_ttl_minutes {
            Some(minutes) => Some(Self::token_ttl(minutes)?),
            None => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_ttl,
        })
    }

    /// A token lifetime must be positive and keep `now + ttl` representable.
    fn token_ttl(minutes: i64) -> Result<chrono::Duration> {
        if minutes <= 0 {
            anyhow::bail!("token_ttl_minutes must be positive, got {}", minutes);
        }
        let ttl = chrono::Duration::try_minutes(minutes)
            .ok_or_else(|| anyhow::anyhow!("token_ttl_minutes out of range: {}", minutes))?;
        if Utc::now().checked_add_signed(ttl).is_none() {
            anyhow::bail!("token_ttl_minutes out of range: {}", minutes);
        }
        Ok(ttl)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn login_url(&self) -> String {
        format!("{}{}", self.base_url, LOGIN_PATH)
    }

    /// Run the request and turn every non-success outcome into a signal.
    async fn exchange(&self, credentials: &Credentials) -> Result<LoginResponse, ResponseSignal> {
        let response = self
            .client
            .post(self.login_url())
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| ResponseSignal::from_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResponseSignal::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResponseSignal::MalformedBody(e.to_string()))?;
        let parsed: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ResponseSignal::MalformedBody(e.to_string()))?;

        if !parsed.success {
            return Err(ResponseSignal::Rejected);
        }
        Ok(parsed)
    }
}

impl Authenticator for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken, AuthError> {
        debug!(url = %self.login_url(), "Sending login request");

        let response = match self.exchange(credentials).await {
            Ok(response) => response,
            Err(signal) => {
                let err = classify(signal);
                warn!(kind = %err.kind(), error = %err, "Login request failed");
                return Err(err);
            }
        };

        let non_empty = |field: Option<String>| field.filter(|value| !value.is_empty());
        let (Some(access_token), Some(refresh_token)) =
            (non_empty(response.token), non_empty(response.refresh))
        else {
            let err = classify(ResponseSignal::MalformedBody(
                "missing or empty token or refresh field".to_string(),
            ));
            warn!(kind = %err.kind(), error = %err, "Login response incomplete");
            return Err(err);
        };

        let expires_at = self
            .token_ttl
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        info!(has_expiry = expires_at.is_some(), "Login succeeded");
        Ok(AuthToken::new(access_token, refresh_token, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ApiClient {
        let config = Config {
            base_url: base_url.to_string(),
            ..Config::default()
        };
        ApiClient::new(&config).expect("build client")
    }

    #[test]
    fn test_login_url_trims_trailing_slash() {
        assert_eq!(client("http://localhost:8000/").login_url(), "http://localhost:8000/login");
        assert_eq!(client("http://localhost:8000/api").login_url(), "http://localhost:8000/api/login");
    }

    #[test]
    fn test_token_ttl_must_be_positive_and_in_range() {
        for minutes in [0, -5, i64::MAX, i64::MIN] {
            let config = Config {
                token_ttl_minutes: Some(minutes),
                ..Config::default()
            };
            assert!(ApiClient::new(&config).is_err(), "ttl {} accepted", minutes);
        }

        let config = Config {
            token_ttl_minutes: Some(30),
            ..Config::default()
        };
        assert!(ApiClient::new(&config).is_ok());
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"refresh":"c31c2b7b","success":true,"token":"18370fdf"}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("Failed to parse login JSON");
        assert!(resp.success);
        assert_eq!(resp.token.as_deref(), Some("18370fdf"));
        assert_eq!(resp.refresh.as_deref(), Some("c31c2b7b"));
    }

    #[test]
    fn test_parse_rejected_login_response() {
        let json = r#"{"success":false}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("Failed to parse login JSON");
        assert!(!resp.success);
        assert!(resp.token.is_none());
    }

    #[test]
    fn test_login_request_body_shape() {
        let body = serde_json::to_value(LoginRequest {
            username: "maxkorn",
            password: "maxkorn",
        })
        .expect("serialize");
        assert_eq!(body, serde_json::json!({"username": "maxkorn", "password": "maxkorn"}));
    }

    #[tokio::test]
    async fn test_refresh_and_current_user_not_implemented() {
        let api = client("http://localhost:8000");
        let token = AuthToken::new("a", "r", None);

        let refreshed = api.refresh(&token).await;
        assert_eq!(refreshed, Err(AuthError::NotImplemented("token refresh")));

        let user = api.current_user(&token).await;
        assert!(matches!(user, Err(AuthError::NotImplemented(_))));
    }
}
