//! OAuth token exchange and refresh logic

use crate::errors::{AuthError, AuthResult};
use crate::types::{AuthConfig, OAuthTokens};
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Token response from the OAuth server
#[derive(Debug, Deserialize)]
struct TokenResponse {
    /// Access token
    access_token: String,

    /// Token type (usually "Bearer")
    #[serde(default)]
    token_type: String,

    /// Expires in seconds
    #[serde(default)]
    expires_in: Option<i64>,

    /// Refresh token (optional)
    #[serde(default)]
    refresh_token: Option<String>,

    /// Granted scope (optional)
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Calculate the absolute expiration time with a 5-minute safety buffer.
    /// Tokens shorter-lived than the buffer keep their full lifetime instead
    /// of being born expired.
    fn expires_at(&self) -> Option<chrono::DateTime<Utc>> {
        self.expires_in.map(|expires_in| {
            let buffered = if expires_in > 300 {
                expires_in - 300
            } else {
                expires_in
            };
            Utc::now() + Duration::seconds(buffered)
        })
    }
}

/// Performs the code-for-token exchange and refresh grants against the
/// provider's token endpoint.
#[derive(Clone)]
pub struct TokenExchanger {
    client: Client,
}

impl TokenExchanger {
    /// Create a new token exchanger.
    ///
    /// With `accept_invalid_certs` the exchange transport skips TLS
    /// verification; only meant for development authorization servers.
    pub fn new(accept_invalid_certs: bool) -> AuthResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| AuthError::Exchange(format!("Failed to build HTTP transport: {}", e)))?;
        Ok(Self { client })
    }

    /// The underlying HTTP client (shared with [`AuthorizedClient`]).
    ///
    /// [`AuthorizedClient`]: crate::AuthorizedClient
    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        config: &AuthConfig,
        code: &str,
        redirect_uri: &str,
    ) -> AuthResult<OAuthTokens> {
        debug!("Exchanging authorization code at {}", config.token_url);

        let mut params = HashMap::new();
        params.insert("grant_type".to_string(), "authorization_code".to_string());
        params.insert("code".to_string(), code.to_string());
        params.insert("redirect_uri".to_string(), redirect_uri.to_string());
        params.insert("client_id".to_string(), config.client_id.clone());
        if let Some(ref client_secret) = config.client_secret {
            params.insert("client_secret".to_string(), client_secret.clone());
        }

        let response = self
            .client
            .post(&config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Exchange(format!("Failed to send token request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed with status {}: {}", status, body);
            return Err(AuthError::Exchange(format!(
                "Token endpoint returned status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(format!("Failed to parse token response: {}", e)))?;

        info!("Token exchange successful");

        Ok(OAuthTokens {
            expires_at: token_response.expires_at(),
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            token_type: token_response.token_type,
            expires_in: token_response.expires_in,
            scope: token_response.scope,
            acquired_at: Utc::now(),
        })
    }

    /// Refresh tokens using a refresh token.
    ///
    /// Providers may omit the refresh token from the refresh response; the
    /// original one is preserved in that case so subsequent refreshes keep
    /// working.
    pub async fn refresh(
        &self,
        config: &AuthConfig,
        refresh_token: &str,
    ) -> AuthResult<OAuthTokens> {
        debug!("Refreshing tokens at {}", config.token_url);

        let mut params = HashMap::new();
        params.insert("grant_type".to_string(), "refresh_token".to_string());
        params.insert("refresh_token".to_string(), refresh_token.to_string());
        params.insert("client_id".to_string(), config.client_id.clone());
        if let Some(ref client_secret) = config.client_secret {
            params.insert("client_secret".to_string(), client_secret.clone());
        }

        let response = self
            .client
            .post(&config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Refresh(format!("Failed to send refresh request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token refresh failed with status {}: {}", status, body);
            return Err(AuthError::Refresh(format!(
                "Token endpoint returned status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Refresh(format!("Failed to parse refresh response: {}", e)))?;

        info!("Token refresh successful");

        Ok(OAuthTokens {
            expires_at: token_response.expires_at(),
            access_token: token_response.access_token,
            refresh_token: token_response
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            token_type: token_response.token_type,
            expires_in: token_response.expires_in,
            scope: token_response.scope,
            acquired_at: Utc::now(),
        })
    }
}
