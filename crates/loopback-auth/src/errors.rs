//! Error types for the loopback authorization flow

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The caller-supplied configuration is unusable. Raised before any
    /// network or server activity.
    #[error("Invalid authorization config: {0}")]
    InvalidConfig(String),

    /// The fixed loopback port could not be acquired. Fatal for the flow;
    /// retrying a busy port would not help since the redirect URI registered
    /// with the provider pins the port.
    #[error("Failed to bind callback server on 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The authorization server redirected back with an error instead of a
    /// code (e.g. the user denied consent).
    #[error("Authorization denied: {error}: {description}")]
    Denied { error: String, description: String },

    /// The callback carried a matching state but no usable authorization code.
    #[error("Callback did not include an authorization code")]
    MissingCode,

    /// The token endpoint rejected the code or was unreachable.
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    /// The refresh grant failed while renewing an expired access token.
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// Graceful shutdown of the callback server exceeded its deadline. The
    /// fixed port may remain leaked, which would break subsequent flows.
    #[error("Callback server did not shut down within {0:?}")]
    ShutdownTimeout(Duration),

    /// The optional overall wait deadline expired before the user completed
    /// the browser interaction.
    #[error("Authorization was not completed within {0:?}")]
    Timeout(Duration),

    /// The result channel closed without a delivery. Indicates the serve
    /// task died unexpectedly.
    #[error("Callback result channel closed before a result was delivered")]
    ChannelClosed,
}

pub type AuthResult<T> = Result<T, AuthError>;
