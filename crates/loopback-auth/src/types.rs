//! Core types for the loopback authorization flow

use crate::errors::{AuthError, AuthResult};
use crate::flow::{BrowserLauncher, SystemBrowser};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default port for the local callback server. The loopback redirect URI
/// registered with the OAuth provider pins this value.
pub const DEFAULT_CALLBACK_PORT: u16 = 14565;

/// The single route the callback server exposes.
pub const CALLBACK_PATH: &str = "/oauth/callback";

/// OAuth authorization configuration (caller-supplied)
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret (optional, for confidential clients)
    pub client_secret: Option<String>,

    /// Authorization endpoint URL
    pub auth_url: String,

    /// Token endpoint URL
    pub token_url: String,

    /// Requested scopes
    pub scopes: Vec<String>,
}

impl AuthConfig {
    /// Validate the configuration before any network or server activity.
    ///
    /// Only the endpoint URLs are required; an empty client ID or secret is
    /// the provider's problem to reject, not ours.
    pub(crate) fn validate(&self) -> AuthResult<()> {
        if self.auth_url.trim().is_empty() {
            return Err(AuthError::InvalidConfig("auth_url is empty".to_string()));
        }
        if self.token_url.trim().is_empty() {
            return Err(AuthError::InvalidConfig("token_url is empty".to_string()));
        }
        Ok(())
    }
}

/// Options for a single [`authorize`](crate::authorize) call
#[derive(Clone)]
pub struct AuthorizeOptions {
    /// Port for the local callback server
    pub callback_port: u16,

    /// Additional query parameters appended to the authorization URL
    pub extra_auth_params: HashMap<String, String>,

    /// Accept self-signed certificates on the token endpoint.
    ///
    /// Off by default; only enable against development authorization servers,
    /// since it disables TLS verification for the exchange transport.
    pub accept_invalid_certs: bool,

    /// Overall deadline for the user to complete the browser interaction.
    /// `None` waits indefinitely.
    pub wait_timeout: Option<Duration>,

    /// Browser launcher collaborator. Defaults to the system browser.
    pub launcher: Arc<dyn BrowserLauncher>,
}

impl Default for AuthorizeOptions {
    fn default() -> Self {
        Self {
            callback_port: DEFAULT_CALLBACK_PORT,
            extra_auth_params: HashMap::new(),
            accept_invalid_certs: false,
            wait_timeout: None,
            launcher: Arc::new(SystemBrowser),
        }
    }
}

/// OAuth tokens returned by the token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Access token for API requests
    pub access_token: String,

    /// Refresh token (if available)
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// Token expiration in seconds (if provided by server)
    pub expires_in: Option<i64>,

    /// Absolute expiration timestamp, calculated from `expires_in` with a
    /// 5-minute safety buffer
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted scope (may differ from requested)
    pub scope: Option<String>,

    /// When tokens were acquired
    pub acquired_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Check whether the access token has passed its (buffered) expiry.
    /// Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }
}
