//! OIDC browser authentication.
//!
//! The flow mirrors the official `vault login -method=oidc` handshake:
//!
//! 1. Bind a loopback listener on port 8250 (the Vault CLI convention —
//!    the port must appear in the server's `allowed_redirect_uris`).
//! 2. Ask Vault for an `auth_url` + `client_nonce` for that redirect URI.
//! 3. Open the user's browser on the auth URL.
//! 4. Serve the provider's redirect back to `/oidc/callback`, extracting
//!    `code` and `state` from the query string.
//! 5. Exchange `{code, state, client_nonce}` for a client token.
//!
//! The whole wait is bounded at two minutes.

use std::convert::Infallible;
use std::process::Command;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::client::VaultClient;
use super::error::VaultError;

/// Loopback port for the OIDC redirect, shared with the vault CLI so one
/// `allowed_redirect_uris` entry covers both tools.
const CALLBACK_PORT: u16 = 8250;

/// How long to wait for the user to finish authenticating in the browser.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

const AUTH_URL_PATH: &str = "auth/oidc/oidc/auth_url";
const CALLBACK_EXCHANGE_PATH: &str = "auth/oidc/oidc/callback";

/// The provider's redirect parameters.
#[derive(Debug)]
struct Callback {
    code: String,
    state: String,
}

/// Authenticate via the OIDC browser flow, installing the returned token on
/// the client.
pub async fn oidc_auth(client: &mut VaultClient, role: &str) -> Result<(), VaultError> {
    let addr = format!("localhost:{CALLBACK_PORT}");
    let listener = TcpListener::bind(("127.0.0.1", CALLBACK_PORT))
        .await
        .map_err(|source| VaultError::ListenerBusy { addr, source })?;

    let redirect_uri = format!("http://localhost:{CALLBACK_PORT}/oidc/callback");

    let (auth_url, client_nonce) = request_auth_url(client, role, &redirect_uri).await?;
    debug!("requested OIDC auth URL");

    open_browser(&auth_url)?;

    let callback = wait_for_callback(listener).await?;
    debug!("received OIDC callback");

    let token = exchange_code(client, &callback, &client_nonce).await?;
    client.set_token(token);

    Ok(())
}

#[derive(Deserialize)]
struct AuthUrlResponse {
    data: Option<AuthUrlData>,
}

#[derive(Deserialize)]
struct AuthUrlData {
    #[serde(default)]
    auth_url: String,
    #[serde(default)]
    client_nonce: String,
}

/// Ask Vault for the provider URL the user must visit. The path is the
/// mount (`oidc`) plus the plugin route (`oidc/auth_url`).
async fn request_auth_url(
    client: &VaultClient,
    role: &str,
    redirect_uri: &str,
) -> Result<(String, String), VaultError> {
    const OP: &str = "requesting OIDC auth URL";

    let response = client
        .authed(client.http().put(client.api_url(AUTH_URL_PATH)))
        .json(&json!({ "role": role, "redirect_uri": redirect_uri }))
        .send()
        .await
        .map_err(|source| VaultError::Request {
            operation: OP,
            path: AUTH_URL_PATH.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(VaultError::UnexpectedStatus {
            operation: OP,
            path: AUTH_URL_PATH.to_string(),
            status: response.status().as_u16(),
        });
    }

    let body: AuthUrlResponse = response.json().await.map_err(|source| VaultError::Request {
        operation: OP,
        path: AUTH_URL_PATH.to_string(),
        source,
    })?;

    match body.data {
        Some(data) if !data.auth_url.is_empty() => Ok((data.auth_url, data.client_nonce)),
        _ => Err(VaultError::UnexpectedResponse {
            operation: OP,
            path: AUTH_URL_PATH.to_string(),
            message: "missing auth_url in response",
        }),
    }
}

/// Serve loopback connections until the provider redirects back, bounded by
/// [`CALLBACK_TIMEOUT`]. Stray requests (favicon probes and the like) get a
/// 404 and the wait continues.
async fn wait_for_callback(listener: TcpListener) -> Result<Callback, VaultError> {
    tokio::time::timeout(CALLBACK_TIMEOUT, accept_until_callback(listener))
        .await
        .map_err(|_| VaultError::CallbackTimeout { seconds: CALLBACK_TIMEOUT.as_secs() })?
}

async fn accept_until_callback(listener: TcpListener) -> Result<Callback, VaultError> {
    let (result_tx, mut result_rx) = mpsc::channel::<Result<Callback, VaultError>>(1);

    loop {
        tokio::select! {
            result = result_rx.recv() => {
                // The sender side lives in spawned connection tasks; at
                // least one clone is always alive in this scope.
                return result.unwrap_or(Err(VaultError::CallbackError {
                    message: "callback channel closed".to_string(),
                }));
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted.map_err(|source| VaultError::CallbackError {
                    message: format!("accepting callback connection: {source}"),
                })?;
                debug!(%peer, "OIDC callback connection");

                let result_tx = result_tx.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |request| {
                        let result_tx = result_tx.clone();
                        async move { Ok::<_, Infallible>(handle_request(request, &result_tx).await) }
                    });

                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("OIDC callback connection error: {e}");
                    }
                });
            }
        }
    }
}

/// Handle one HTTP request on the loopback listener.
async fn handle_request(
    request: Request<hyper::body::Incoming>,
    result_tx: &mpsc::Sender<Result<Callback, VaultError>>,
) -> Response<Full<Bytes>> {
    if request.uri().path() != "/oidc/callback" {
        return plain_response(StatusCode::NOT_FOUND, "Not found.");
    }

    let params = parse_query(request.uri().query().unwrap_or(""));

    let code = params.iter().find(|(k, _)| k == "code").map(|(_, v)| v.clone());
    let state = params.iter().find(|(k, _)| k == "state").map(|(_, v)| v.clone());

    match code {
        Some(code) if !code.is_empty() => {
            let callback = Callback { code, state: state.unwrap_or_default() };
            let _ = result_tx.send(Ok(callback)).await;
            plain_response(StatusCode::OK, "Authentication successful. You may close this tab.")
        }
        _ => {
            let message = params
                .iter()
                .find(|(k, _)| k == "error_description")
                .or_else(|| params.iter().find(|(k, _)| k == "error"))
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| "missing authorization code".to_string());

            let _ = result_tx.send(Err(VaultError::CallbackError { message })).await;
            plain_response(StatusCode::OK, "Authentication failed. You may close this tab.")
        }
    }
}

/// Decode a query string into key/value pairs. Uses the URL parser that
/// ships with reqwest so percent-encoded values round-trip correctly.
fn parse_query(query: &str) -> Vec<(String, String)> {
    match reqwest::Url::parse(&format!("http://localhost/?{query}")) {
        Ok(url) => url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect(),
        Err(e) => {
            warn!("unparseable OIDC callback query: {e}");
            Vec::new()
        }
    }
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(body.as_bytes()))))
}

#[derive(Deserialize)]
struct ExchangeResponse {
    auth: Option<ExchangeAuth>,
}

#[derive(Deserialize)]
struct ExchangeAuth {
    #[serde(default)]
    client_token: String,
}

/// Exchange the authorization code for a client token. The callback
/// endpoint expects a GET with query parameters, matching the official
/// vault CLI behaviour.
async fn exchange_code(
    client: &VaultClient,
    callback: &Callback,
    client_nonce: &str,
) -> Result<String, VaultError> {
    const OP: &str = "exchanging OIDC code for token";

    let response = client
        .authed(client.http().get(client.api_url(CALLBACK_EXCHANGE_PATH)))
        .query(&[
            ("code", callback.code.as_str()),
            ("state", callback.state.as_str()),
            ("client_nonce", client_nonce),
        ])
        .send()
        .await
        .map_err(|source| VaultError::Request {
            operation: OP,
            path: CALLBACK_EXCHANGE_PATH.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(VaultError::AuthFailed {
            method: "oidc",
            status: response.status().as_u16(),
        });
    }

    let body: ExchangeResponse =
        response.json().await.map_err(|source| VaultError::Request {
            operation: OP,
            path: CALLBACK_EXCHANGE_PATH.to_string(),
            source,
        })?;

    match body.auth {
        Some(auth) if !auth.client_token.is_empty() => Ok(auth.client_token),
        _ => Err(VaultError::EmptyAuthResponse { method: "oidc" }),
    }
}

/// Open `url` in the user's default browser.
fn open_browser(url: &str) -> Result<(), VaultError> {
    let spawn = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("rundll32").arg("url.dll,FileProtocolHandler").arg(url).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    spawn.map(drop).map_err(|source| VaultError::BrowserLaunch { source })
}
