//! Local OAuth callback server
//!
//! A short-lived HTTP listener owned by a single authorization session. It
//! exposes exactly one route (`GET /oauth/callback`), validates the echoed
//! state token, exchanges the authorization code, and delivers the outcome
//! through a single-use channel. Lifecycle: bind → listen → handle the one
//! completing callback → graceful shutdown under a fixed deadline.

use crate::client::AuthorizedClient;
use crate::errors::{AuthError, AuthResult};
use crate::token_exchange::TokenExchanger;
use crate::types::{AuthConfig, CALLBACK_PATH};
use axum::{
    extract::Query,
    response::{Html, IntoResponse, Redirect, Response},
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Deadline for graceful shutdown. Requests already accepted may finish;
/// exceeding the deadline is fatal for the flow since the fixed port may
/// stay leaked.
pub(crate) const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Page served on a successful callback. Auto-closes the tab shortly after.
const SUCCESS_PAGE: &str = r#"
<html>
    <head><title>Authorization Successful</title></head>
    <body style="font-family: sans-serif; text-align: center; padding: 50px;">
        <h1>Authorization successful</h1>
        <p>You are authenticated and can return to the program.</p>
        <p>This window will close itself.</p>
        <script>
            setTimeout(function() { window.close(); }, 3000);
        </script>
    </body>
</html>
"#;

/// Query parameters of the OAuth callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

type ResultSender = oneshot::Sender<AuthResult<AuthorizedClient>>;

/// Shared state of one authorization session, captured by the route handler.
///
/// The expected state token lives here as a typed field; the result sender
/// sits in a single-use slot so that at most one callback can ever complete
/// the session.
pub(crate) struct CallbackSession {
    config: AuthConfig,
    exchanger: TokenExchanger,
    expected_state: String,
    redirect_uri: String,
    result_tx: Mutex<Option<ResultSender>>,
}

impl CallbackSession {
    pub(crate) fn new(
        config: AuthConfig,
        exchanger: TokenExchanger,
        expected_state: String,
        redirect_uri: String,
    ) -> (Arc<Self>, oneshot::Receiver<AuthResult<AuthorizedClient>>) {
        let (tx, rx) = oneshot::channel();
        let session = Arc::new(Self {
            config,
            exchanger,
            expected_state,
            redirect_uri,
            result_tx: Mutex::new(Some(tx)),
        });
        (session, rx)
    }

    /// Take the single-use result sender. Returns `None` once a callback has
    /// already claimed it.
    fn claim(&self) -> Option<ResultSender> {
        self.result_tx.lock().take()
    }
}

async fn handle_callback(session: Arc<CallbackSession>, params: CallbackQuery) -> Response {
    // The state must echo this session's token exactly, on every path:
    // providers echo the state on error redirects too, so a request without
    // a matching state is never a genuine callback and must not be able to
    // terminate the session. On mismatch nothing is delivered and the
    // session keeps waiting; a legitimate callback may still arrive, though
    // in practice this indicates an attack or stale link.
    match params.state.as_deref() {
        Some(state) if state == session.expected_state => {}
        other => {
            warn!("Callback state mismatch (got {:?}), ignoring request", other);
            return Redirect::temporary("/").into_response();
        }
    }

    // Claim the result slot before doing any work. A duplicate callback past
    // this point is redirected, never double-delivered, and the code is
    // exchanged at most once.
    let Some(result_tx) = session.claim() else {
        debug!("Duplicate callback after result delivery, ignoring");
        return Redirect::temporary("/").into_response();
    };

    // Provider signalled an error instead of a code (e.g. consent denied).
    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        error!("Authorization server returned an error: {} - {}", error, description);

        let _ = result_tx.send(Err(AuthError::Denied { error, description }));
        return Redirect::temporary("/").into_response();
    }

    let code = match params.code {
        Some(code) if !code.is_empty() => code,
        _ => {
            warn!("Callback carried no authorization code");
            let _ = result_tx.send(Err(AuthError::MissingCode));
            return Redirect::temporary("/").into_response();
        }
    };

    match session
        .exchanger
        .exchange_code(&session.config, &code, &session.redirect_uri)
        .await
    {
        Ok(tokens) => {
            let client =
                AuthorizedClient::new(session.config.clone(), session.exchanger.clone(), tokens);
            if result_tx.send(Ok(client)).is_err() {
                error!("Coordinator dropped before the callback result was delivered");
            }
            Html(SUCCESS_PAGE).into_response()
        }
        Err(e) => {
            error!("Authorization code exchange failed: {}", e);
            let _ = result_tx.send(Err(e));
            Redirect::temporary("/").into_response()
        }
    }
}

/// Handle to the running callback server.
pub(crate) struct CallbackServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    serve_handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind `127.0.0.1:<port>` and start serving the callback route.
    ///
    /// Binding failures are fatal and surfaced immediately: the port is
    /// pinned by the redirect URI registered with the provider, so there is
    /// nothing to retry.
    pub(crate) async fn spawn(port: u16, session: Arc<CallbackSession>) -> AuthResult<Self> {
        let handler = {
            let session = Arc::clone(&session);
            move |Query(params): Query<CallbackQuery>| {
                let session = Arc::clone(&session);
                async move { handle_callback(session, params).await }
            }
        };
        let app = Router::new().route(CALLBACK_PATH, axum::routing::get(handler));

        let addr = format!("127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| AuthError::Bind { port, source })?;
        let port = listener
            .local_addr()
            .map_err(|source| AuthError::Bind { port, source })?
            .port();

        info!("Callback server listening on http://127.0.0.1:{}{}", port, CALLBACK_PATH);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let serve_handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!("Callback server error on port {}: {}", port, e);
            }
            debug!("Callback server on port {} stopped", port);
        });

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
            serve_handle: Some(serve_handle),
        })
    }

    /// The port actually bound (useful when spawned on port 0).
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully shut the server down, joining the serve task under
    /// [`SHUTDOWN_DEADLINE`]. The listening socket closes immediately to new
    /// connections; requests already accepted may finish. Idempotent: calling
    /// again after the server stopped is a no-op.
    pub(crate) async fn shutdown(&mut self) -> AuthResult<()> {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return Ok(());
        };
        info!("Shutting down callback server on port {}", self.port);
        let _ = shutdown_tx.send(());

        let Some(mut serve_handle) = self.serve_handle.take() else {
            return Ok(());
        };
        match tokio::time::timeout(SHUTDOWN_DEADLINE, &mut serve_handle).await {
            Ok(join_result) => {
                if let Err(e) = join_result {
                    error!("Callback server task failed: {}", e);
                }
                Ok(())
            }
            Err(_) => {
                serve_handle.abort();
                Err(AuthError::ShutdownTimeout(SHUTDOWN_DEADLINE))
            }
        }
    }
}
