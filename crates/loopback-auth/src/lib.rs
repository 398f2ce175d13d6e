//! OAuth2 authorization code flow with a loopback redirect
//!
//! For native/CLI applications that cannot host a public redirect endpoint:
//! a short-lived HTTP listener on `127.0.0.1` receives the authorization
//! callback, the code is exchanged for tokens, and the caller gets back an
//! HTTP client that attaches and refreshes the bearer token.
//!
//! # Features
//! - OAuth 2.0 Authorization Code Flow over a loopback redirect URI
//! - Single-use anti-forgery state token with exact-match validation
//! - Exactly-once result delivery, duplicate callbacks ignored
//! - Guaranteed server teardown on success and failure paths alike
//! - Optional overall wait deadline and configurable TLS relaxation
//!
//! # Usage Example
//! ```no_run
//! use loopback_auth::{authorize, AuthConfig, AuthorizeOptions};
//!
//! # async fn run() -> loopback_auth::AuthResult<()> {
//! let config = AuthConfig {
//!     client_id: "my-client-id".to_string(),
//!     client_secret: None,
//!     auth_url: "https://provider.example/oauth/authorize".to_string(),
//!     token_url: "https://provider.example/oauth/token".to_string(),
//!     scopes: vec!["read".to_string()],
//! };
//! let client = authorize(config, AuthorizeOptions::default()).await?;
//! println!("access token: {}", client.token().await.access_token);
//! # Ok(())
//! # }
//! ```

mod callback_server;
mod client;
mod errors;
mod flow;
mod state;
mod token_exchange;
mod types;

// Re-export public API
pub use client::AuthorizedClient;
pub use errors::{AuthError, AuthResult};
pub use flow::{authorize, BrowserLauncher, SystemBrowser};
pub use state::generate_state;
pub use token_exchange::TokenExchanger;
pub use types::{AuthConfig, AuthorizeOptions, OAuthTokens, CALLBACK_PATH, DEFAULT_CALLBACK_PORT};
