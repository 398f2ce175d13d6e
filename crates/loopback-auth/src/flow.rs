//! Flow coordinator - orchestrates one loopback authorization flow
//!
//! [`authorize`] generates the state token, builds the authorization URL,
//! starts the callback server, opens the browser, and blocks until the
//! callback delivers a terminal result. The server is torn down exactly once
//! on every path before the call returns.

use crate::callback_server::{CallbackServer, CallbackSession};
use crate::client::AuthorizedClient;
use crate::errors::{AuthError, AuthResult};
use crate::state::generate_state;
use crate::token_exchange::TokenExchanger;
use crate::types::{AuthConfig, AuthorizeOptions, CALLBACK_PATH};
use std::collections::HashMap;
use tracing::{info, warn};

/// Opens a URL in the user's browser.
///
/// External collaborator of the flow; swap it out in tests or headless
/// environments.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Default launcher: the operating system's default browser.
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

/// Run the OAuth2 authorization code flow with a loopback redirect.
///
/// Starts a local callback server, sends the user to the provider's consent
/// page, and blocks until the redirected callback completes the flow. Returns
/// an [`AuthorizedClient`] that attaches and refreshes the bearer token.
///
/// The callback port is a process-wide resource: only one flow per port may
/// be in flight at a time, and a second call fails fast with
/// [`AuthError::Bind`].
///
/// # Example
/// ```no_run
/// use loopback_auth::{authorize, AuthConfig, AuthorizeOptions};
///
/// # async fn run() -> loopback_auth::AuthResult<()> {
/// let config = AuthConfig {
///     client_id: "my-client-id".to_string(),
///     client_secret: Some("my-secret".to_string()),
///     auth_url: "https://provider.example/oauth/authorize".to_string(),
///     token_url: "https://provider.example/oauth/token".to_string(),
///     scopes: vec!["photos.readonly".to_string()],
/// };
/// let client = authorize(config, AuthorizeOptions::default()).await?;
/// let response = client
///     .request(reqwest::Method::GET, "https://provider.example/api/me")
///     .await?
///     .send()
///     .await;
/// # Ok(())
/// # }
/// ```
pub async fn authorize(
    config: AuthConfig,
    options: AuthorizeOptions,
) -> AuthResult<AuthorizedClient> {
    config.validate()?;

    let state = generate_state();
    let redirect_uri = format!("http://127.0.0.1:{}{}", options.callback_port, CALLBACK_PATH);
    let auth_url =
        build_authorization_url(&config, &redirect_uri, &state, &options.extra_auth_params);

    let exchanger = TokenExchanger::new(options.accept_invalid_certs)?;
    let (session, result_rx) = CallbackSession::new(config, exchanger, state, redirect_uri);

    // The server must reach listening before the browser opens, otherwise a
    // fast click could hit a closed port.
    let mut server = CallbackServer::spawn(options.callback_port, session).await?;

    info!("Taking you to your browser for authentication");
    info!("If the browser does not open, visit: {}", auth_url);
    if let Err(e) = options.launcher.open(&auth_url) {
        // Launch failure is reported but does not abort the flow; the user
        // can still navigate to the URL manually.
        warn!("Failed to open browser: {}", e);
        println!("\nOpen this URL in your browser:\n\n  {}\n", auth_url);
    }

    // The single suspension point: wait for the one terminal result.
    let outcome = match options.wait_timeout {
        Some(deadline) => match tokio::time::timeout(deadline, result_rx).await {
            Ok(received) => received.unwrap_or(Err(AuthError::ChannelClosed)),
            Err(_) => Err(AuthError::Timeout(deadline)),
        },
        None => result_rx.await.unwrap_or(Err(AuthError::ChannelClosed)),
    };

    // Success and failure paths both shut the server down. A shutdown
    // timeout supersedes the callback outcome: the fixed port may be leaked,
    // which would break every subsequent flow.
    server.shutdown().await?;

    outcome
}

/// Assemble the authorization URL: the standard authorization-code
/// parameters first, then any caller-supplied extras. Extras never displace
/// a standard parameter.
fn build_authorization_url(
    config: &AuthConfig,
    redirect_uri: &str,
    state: &str,
    extra_params: &HashMap<String, String>,
) -> String {
    let mut url = format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&access_type=offline&state={}",
        config.auth_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state),
    );

    if !config.scopes.is_empty() {
        let scopes = config.scopes.join(" ");
        url.push_str(&format!("&scope={}", urlencoding::encode(&scopes)));
    }

    for (key, value) in extra_params {
        url.push_str(&format!(
            "&{}={}",
            urlencoding::encode(key),
            urlencoding::encode(value)
        ));
    }

    url
}
