//! Authenticated HTTP client returned by a completed flow

use crate::errors::{AuthError, AuthResult};
use crate::token_exchange::TokenExchanger;
use crate::types::{AuthConfig, OAuthTokens};
use reqwest::{Client, Method, RequestBuilder};
use tokio::sync::Mutex;
use tracing::info;

/// HTTP client pre-configured to attach and refresh a bearer token.
///
/// Returned by [`authorize`](crate::authorize); the caller owns it
/// thereafter. Requests built through [`request`](Self::request) carry
/// `Authorization: Bearer <access_token>`, and an expired access token is
/// refreshed transparently through the refresh grant first.
pub struct AuthorizedClient {
    config: AuthConfig,
    exchanger: TokenExchanger,
    tokens: Mutex<OAuthTokens>,
}

impl AuthorizedClient {
    pub(crate) fn new(config: AuthConfig, exchanger: TokenExchanger, tokens: OAuthTokens) -> Self {
        Self {
            config,
            exchanger,
            tokens: Mutex::new(tokens),
        }
    }

    /// The underlying HTTP client, without token handling.
    pub fn http(&self) -> &Client {
        self.exchanger.http()
    }

    /// Snapshot of the current tokens.
    pub async fn token(&self) -> OAuthTokens {
        self.tokens.lock().await.clone()
    }

    /// A currently-valid access token, refreshing first if expired.
    ///
    /// Fails with [`AuthError::Refresh`] when the token is expired and the
    /// provider issued no refresh token.
    pub async fn bearer_token(&self) -> AuthResult<String> {
        let mut tokens = self.tokens.lock().await;

        if tokens.is_expired() {
            let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
                AuthError::Refresh(
                    "Access token expired and no refresh token is available".to_string(),
                )
            })?;

            info!("Access token expired, refreshing");
            *tokens = self.exchanger.refresh(&self.config, &refresh_token).await?;
        }

        Ok(tokens.access_token.clone())
    }

    /// Build a request with the bearer token attached.
    pub async fn request(&self, method: Method, url: &str) -> AuthResult<RequestBuilder> {
        let token = self.bearer_token().await?;
        Ok(self.http().request(method, url).bearer_auth(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use chrono::{Duration, Utc};

    fn test_tokens(expired: bool) -> OAuthTokens {
        let offset = if expired {
            -Duration::seconds(10)
        } else {
            Duration::seconds(3300)
        };
        OAuthTokens {
            access_token: "initial_access".to_string(),
            refresh_token: Some("initial_refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            expires_at: Some(Utc::now() + offset),
            scope: None,
            acquired_at: Utc::now(),
        }
    }

    /// Token endpoint that answers every refresh with a fixed new token.
    async fn spawn_token_endpoint() -> String {
        let app = Router::new().route(
            "/token",
            post(|| async {
                Json(serde_json::json!({
                    "access_token": "refreshed_access",
                    "token_type": "Bearer",
                    "expires_in": 3600
                }))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/token", addr)
    }

    fn test_config(token_url: String) -> AuthConfig {
        AuthConfig {
            client_id: "client".to_string(),
            client_secret: None,
            auth_url: "https://example.com/authorize".to_string(),
            token_url,
            scopes: vec![],
        }
    }

    #[tokio::test]
    async fn test_bearer_token_without_refresh() {
        let config = test_config("http://127.0.0.1:1/token".to_string());
        let exchanger = TokenExchanger::new(false).unwrap();
        let client = AuthorizedClient::new(config, exchanger, test_tokens(false));

        // Fresh token is returned as-is, no network involved
        let token = client.bearer_token().await.unwrap();
        assert_eq!(token, "initial_access");
    }

    #[tokio::test]
    async fn test_bearer_token_refreshes_when_expired() {
        let token_url = spawn_token_endpoint().await;
        let config = test_config(token_url);
        let exchanger = TokenExchanger::new(false).unwrap();
        let client = AuthorizedClient::new(config, exchanger, test_tokens(true));

        let token = client.bearer_token().await.unwrap();
        assert_eq!(token, "refreshed_access");

        // Refresh token is preserved when the provider omits a new one
        let tokens = client.token().await;
        assert_eq!(tokens.refresh_token, Some("initial_refresh".to_string()));
        assert!(!tokens.is_expired());
    }

    #[tokio::test]
    async fn test_bearer_token_errors_without_refresh_token() {
        let config = test_config("http://127.0.0.1:1/token".to_string());
        let exchanger = TokenExchanger::new(false).unwrap();
        let mut tokens = test_tokens(true);
        tokens.refresh_token = None;
        let client = AuthorizedClient::new(config, exchanger, tokens);

        assert!(matches!(
            client.bearer_token().await,
            Err(AuthError::Refresh(_))
        ));
    }
}
