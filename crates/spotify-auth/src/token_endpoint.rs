//! The authorization server's `/api/token` endpoint.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Token set returned by both grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Inputs to the `authorization_code` grant.
#[derive(Debug, Clone)]
pub struct CodeExchange {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

/// Exchanges codes and refresh tokens for access tokens.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// `authorization_code` grant.
    async fn exchange_code(&self, request: &CodeExchange) -> AuthResult<TokenResponse>;

    /// `refresh_token` grant.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse>;
}

/// Form-encoded token requests over HTTP for a public (secretless) client.
pub struct ReqwestTokenEndpoint {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
}

impl ReqwestTokenEndpoint {
    /// `accounts_base_url` is the authorization server root; `/api/token` is appended.
    pub fn new(accounts_base_url: &str, client_id: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), accounts_base_url, client_id)
    }

    pub fn with_client(
        client: reqwest::Client,
        accounts_base_url: &str,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url(accounts_base_url),
            client_id: client_id.into(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> AuthResult<reqwest::Response> {
        self.client
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(AuthError::from)
    }
}

#[async_trait]
impl TokenEndpoint for ReqwestTokenEndpoint {
    async fn exchange_code(&self, request: &CodeExchange) -> AuthResult<TokenResponse> {
        debug!(url = %self.token_url, "Exchanging authorization code");

        let response = self
            .post_form(&[
                ("grant_type", "authorization_code"),
                ("code", &request.code),
                ("redirect_uri", &request.redirect_uri),
                ("client_id", &self.client_id),
                ("code_verifier", &request.code_verifier),
            ])
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Token exchange failed");
            return Err(AuthError::TokenExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(AuthError::from)
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        debug!(url = %self.token_url, "Refreshing access token");

        let response = self
            .post_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
            ])
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Token refresh failed");
            return Err(AuthError::TokenRefreshFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        response.json().await.map_err(AuthError::from)
    }
}

pub(crate) fn token_url(accounts_base_url: &str) -> String {
    format!("{}/api/token", accounts_base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn exchange() -> CodeExchange {
        CodeExchange {
            code: "auth-code".to_string(),
            code_verifier: "verifier-123".to_string(),
            redirect_uri: "http://127.0.0.1:8888/callback".to_string(),
        }
    }

    #[test]
    fn test_token_url_trims_trailing_slash() {
        assert_eq!(
            token_url("https://accounts.example.com/"),
            "https://accounts.example.com/api/token"
        );
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("code_verifier=verifier-123"))
            .and(body_string_contains("client_id=client-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-1",
                "scope": "streaming"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = ReqwestTokenEndpoint::new(&server.uri(), "client-abc");
        let tokens = endpoint.exchange_code(&exchange()).await.unwrap();

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.expires_in, 3600);
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_exchange_code_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let endpoint = ReqwestTokenEndpoint::new(&server.uri(), "client-abc");
        let err = endpoint.exchange_code(&exchange()).await.unwrap_err();

        match err {
            AuthError::TokenExchangeFailed { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid_grant");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_without_rotation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-2",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = ReqwestTokenEndpoint::new(&server.uri(), "client-abc");
        let tokens = endpoint.refresh("refresh-1").await.unwrap();

        assert_eq!(tokens.access_token, "access-2");
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_is_token_refresh_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("revoked"))
            .mount(&server)
            .await;

        let endpoint = ReqwestTokenEndpoint::new(&server.uri(), "client-abc");
        let err = endpoint.refresh("refresh-1").await.unwrap_err();

        assert!(matches!(err, AuthError::TokenRefreshFailed(ref msg) if msg == "HTTP 400: revoked"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let endpoint = ReqwestTokenEndpoint::new("http://127.0.0.1:1", "client-abc");
        let err = endpoint.refresh("refresh-1").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
        assert!(err.is_transient());
    }
}
