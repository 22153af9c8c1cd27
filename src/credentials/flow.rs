//! OAuth2 installed-app flow over a loopback redirect.

use super::{ClientSecrets, TokenResponse};
use crate::error::{CloserError, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// How long to wait for the user to finish consent in the browser.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// How long the loopback server may take to drain after the redirect.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>You can close this window.</body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Authorization failed.</h3>Return to the terminal for details.</body></html>";

/// What the browser redirect carried back.
#[derive(Debug, Clone, PartialEq)]
pub enum Redirect {
    /// Consent granted.
    Code { code: String, state: Option<String> },
    /// Consent denied or failed.
    Denied(String),
    /// A request without an authorization result, to be ignored.
    Unrelated,
}

/// Build the consent URL the user opens in a browser.
pub fn consent_url(
    auth_uri: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url> {
    let mut url = Url::parse(auth_uri)
        .map_err(|e| CloserError::Config(format!("Invalid auth_uri '{}': {}", auth_uri, e)))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    Ok(url)
}

/// Classify the query parameters of a request to the redirect URI.
pub fn classify_redirect(params: &HashMap<String, String>) -> Redirect {
    match (params.get("code"), params.get("error")) {
        (_, Some(err)) => Redirect::Denied(err.clone()),
        (Some(code), None) => Redirect::Code {
            code: code.clone(),
            state: params.get("state").cloned(),
        },
        (None, None) => Redirect::Unrelated,
    }
}

/// Run the interactive consent flow and return the authorization code
/// together with the redirect URI it was issued for.
pub async fn run_loopback_consent(
    secrets: &ClientSecrets,
    auth_uri: &str,
    scopes: &[String],
) -> Result<(String, String)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://127.0.0.1:{}/", port);
    let state = uuid::Uuid::new_v4().simple().to_string();

    let url = consent_url(auth_uri, &secrets.client_id, &redirect_uri, scopes, &state)?;

    eprintln!(
        "\n{} Authorize Google access by opening this URL in your browser:\n\n  {}\n",
        console::style(">>").cyan().bold(),
        url
    );
    info!("Waiting for OAuth redirect on port {}", port);

    let code = tokio::time::timeout(CONSENT_TIMEOUT, receive_redirect(listener, &state))
        .await
        .map_err(|_| {
            CloserError::Authorization(format!(
                "no authorization received within {} seconds",
                CONSENT_TIMEOUT.as_secs()
            ))
        })??;

    Ok((code, redirect_uri))
}

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    outcome: mpsc::Sender<Result<String>>,
}

/// Server task that is aborted if the consent wait is abandoned.
struct LoopbackServer(JoinHandle<std::io::Result<()>>);

impl Drop for LoopbackServer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Serve the redirect URI until a request carries the authorization result.
async fn receive_redirect(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let app = Router::new()
        .route("/", get(redirect_handler))
        .with_state(RedirectState {
            expected_state: Arc::from(expected_state),
            outcome: outcome_tx,
        });

    let mut server = LoopbackServer(tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                stop_rx.await.ok();
            })
            .await
    }));

    let outcome = outcome_rx.recv().await.unwrap_or_else(|| {
        Err(CloserError::Authorization(
            "loopback listener stopped before a redirect arrived".to_string(),
        ))
    });

    let _ = stop_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server.0).await {
        Ok(Ok(Err(e))) => warn!("Loopback server failed: {}", e),
        Ok(_) => debug!("Loopback server stopped"),
        Err(_) => debug!("Loopback server did not drain in time, aborting"),
    }

    outcome
}

async fn redirect_handler(
    State(state): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let outcome = match classify_redirect(&params) {
        Redirect::Unrelated => return StatusCode::NOT_FOUND.into_response(),
        Redirect::Denied(reason) => {
            Err(CloserError::Authorization(format!("consent denied: {}", reason)))
        }
        Redirect::Code { state: got, .. } if got.as_deref() != Some(&*state.expected_state) => {
            Err(CloserError::Authorization("state mismatch in OAuth redirect".to_string()))
        }
        Redirect::Code { code, .. } => Ok(code),
    };

    let page = if outcome.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
    // Only the first result counts; later redirects find the channel full.
    if state.outcome.try_send(outcome).is_err() {
        debug!("Ignoring repeated OAuth redirect");
    }
    Html(page).into_response()
}

/// Exchange an authorization code for tokens.
#[instrument(skip(http, secrets, code))]
pub async fn exchange_code(
    http: &reqwest::Client,
    token_uri: &str,
    secrets: &ClientSecrets,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("redirect_uri", redirect_uri),
    ];
    post_token_form(http, token_uri, &form).await
}

/// Mint a new access token from a refresh token.
#[instrument(skip(http, secrets, refresh_token))]
pub async fn refresh_token(
    http: &reqwest::Client,
    token_uri: &str,
    secrets: &ClientSecrets,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
    ];
    post_token_form(http, token_uri, &form).await
}

async fn post_token_form(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| CloserError::Authorization(format!("token request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CloserError::Authorization(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| CloserError::Authorization(format!("unreadable token response: {}", e)))
}
