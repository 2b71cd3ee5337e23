//! OAuth authorization-code acquisition
//!
//! PKCE (S256) authorization-code flow against the provider's accounts
//! endpoint: print the consent URL, catch the redirect on a loopback
//! server, exchange the code for a bearer token, and shut the server
//! down. On timeout or exchange failure the program exits with no side
//! effects beyond closing the server.

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::config::{Credentials, ProviderConfig, ProviderKind, CALLBACK_PORT};
use crate::error::{Error, Result};

const VERIFIER_LEN: usize = 64;

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Run the full flow and return the bearer token.
pub async fn authorize(config: &ProviderConfig, credentials: &Credentials) -> Result<String> {
    let verifier = generate_verifier();
    let challenge = code_challenge(&verifier);
    let consent_url = build_auth_url(config, credentials, &challenge)?;

    println!("Visit the URL for the auth dialog:\n{}", consent_url);

    let (code_tx, mut code_rx) = mpsc::channel::<String>(1);
    let app = Router::new()
        .route("/callback/spotify", get(callback))
        .route("/callback/youtube", get(callback))
        .with_state(code_tx);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", CALLBACK_PORT))
        .await
        .map_err(|e| Error::Auth(format!("cannot bind callback server: {}", e)))?;
    tracing::info!("callback server listening on 127.0.0.1:{}", CALLBACK_PORT);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = tokio::time::timeout(config.auth_wait, code_rx.recv()).await;

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(config.shutdown_grace, server)
        .await
        .is_err()
    {
        tracing::warn!("callback server did not stop within grace period");
    }

    let code = match outcome {
        Ok(Some(code)) => code,
        Ok(None) => return Err(Error::Auth("callback channel closed".to_string())),
        Err(_) => return Err(Error::Auth("timed out waiting for authorization".to_string())),
    };

    exchange_code(config, credentials, &code, &verifier).await
}

async fn callback(
    State(code_tx): State<mpsc::Sender<String>>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    match params.code {
        Some(code) => {
            let _ = code_tx.send(code).await;
            Html("<h1>Authenticated successfully!</h1><p>You can close this window.</p>")
        }
        None => Html("<h1>Authorization failed</h1><p>No code in the callback.</p>"),
    }
}

fn build_auth_url(
    config: &ProviderConfig,
    credentials: &Credentials,
    challenge: &str,
) -> Result<reqwest::Url> {
    let redirect = config.redirect_uri();
    let mut params = vec![
        ("client_id", credentials.client_id.as_str()),
        ("response_type", "code"),
        ("redirect_uri", redirect.as_str()),
        ("scope", config.scopes),
        ("code_challenge_method", "S256"),
        ("code_challenge", challenge),
    ];
    match config.kind {
        ProviderKind::Spotify => params.push(("show_dialog", "true")),
        ProviderKind::YouTube => {
            params.push(("access_type", "offline"));
            params.push(("prompt", "consent"));
        }
    }

    reqwest::Url::parse_with_params(&config.auth_url, &params)
        .map_err(|e| Error::Auth(format!("bad authorization URL: {}", e)))
}

async fn exchange_code(
    config: &ProviderConfig,
    credentials: &Credentials,
    code: &str,
    verifier: &str,
) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| Error::Auth(format!("failed to build HTTP client: {}", e)))?;

    let redirect = config.redirect_uri();
    let response = client
        .post(&config.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| Error::Auth(format!("token exchange request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Auth(format!(
            "token exchange failed ({}): {}",
            status, body
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::Auth(format!("undecodable token response: {}", e)))?;

    tracing::info!("access token acquired");
    Ok(token.access_token)
}

fn generate_verifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFIER_LEN)
        .map(char::from)
        .collect()
}

fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
