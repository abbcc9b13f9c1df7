//! AppRole authentication.
//!
//! AppRole is the non-interactive path for CI pipelines and containers:
//! a `role_id`/`secret_id` pair is exchanged for a client token with no
//! browser involved.

use serde::Deserialize;
use serde_json::json;

use super::client::VaultClient;
use super::error::VaultError;

const LOGIN_PATH: &str = "auth/approle/login";

#[derive(Deserialize)]
struct AppRoleLoginResponse {
    auth: Option<AppRoleAuth>,
}

#[derive(Deserialize)]
struct AppRoleAuth {
    #[serde(default)]
    client_token: String,
}

/// Authenticate with AppRole credentials, installing the returned token on
/// the client. Both credentials are required.
pub async fn approle_auth(
    client: &mut VaultClient,
    role_id: &str,
    secret_id: &str,
) -> Result<(), VaultError> {
    if role_id.is_empty() {
        return Err(VaultError::MissingCredential { name: "role_id" });
    }
    if secret_id.is_empty() {
        return Err(VaultError::MissingCredential { name: "secret_id" });
    }

    let response = client
        .http()
        .post(client.api_url(LOGIN_PATH))
        .json(&json!({ "role_id": role_id, "secret_id": secret_id }))
        .send()
        .await
        .map_err(|source| VaultError::Request {
            operation: "approle login",
            path: LOGIN_PATH.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(VaultError::AuthFailed {
            method: "approle",
            status: response.status().as_u16(),
        });
    }

    let body: AppRoleLoginResponse =
        response.json().await.map_err(|source| VaultError::Request {
            operation: "approle login",
            path: LOGIN_PATH.to_string(),
            source,
        })?;

    match body.auth {
        Some(auth) if !auth.client_token.is_empty() => {
            client.set_token(auth.client_token);
            Ok(())
        }
        _ => Err(VaultError::EmptyAuthResponse { method: "approle" }),
    }
}
