//! HTTP client for Vault's KV v2 and token endpoints.
//!
//! Talks the plain Vault REST protocol with `X-Vault-Token` auth. KV v2
//! reads go through `{base}/data/{path}`, listings through
//! `{base}/metadata/{path}`, matching the engine's versioned layout.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::error::VaultError;
use crate::resolver::VaultReader;

/// Request timeout applied to every Vault API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a Vault server, configured with a KV v2 mount point.
pub struct VaultClient {
    address: String,
    base_path: String,
    token: String,
    http: reqwest::Client,
}

/// A key or directory in the Vault KV tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// Entry name as returned by Vault, e.g. `database` or `auth/`.
    pub name: String,
    /// Whether the entry is a directory (trailing `/` in the LIST response).
    pub is_dir: bool,
}

impl VaultClient {
    /// Create an unauthenticated client for the given address. `base_path`
    /// is the KV v2 mount point (e.g. `secret`).
    pub fn new(address: &str, base_path: &str) -> Result<Self, VaultError> {
        if address.is_empty() {
            return Err(VaultError::MissingAddress);
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(VaultError::Build)?;

        Ok(Self {
            address: address.trim_end_matches('/').to_string(),
            base_path: base_path.to_string(),
            token: String::new(),
            http,
        })
    }

    /// Create a client with an existing auth token.
    pub fn with_token(address: &str, base_path: &str, token: &str) -> Result<Self, VaultError> {
        let mut client = Self::new(address, base_path)?;
        client.set_token(token);
        Ok(client)
    }

    /// The current authentication token (empty when unauthenticated).
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Replace the authentication token.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// The configured Vault address, without a trailing slash.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Read all string-valued fields at a KV v2 path (relative to the
    /// mount). A missing path yields an empty map; 403 is surfaced as
    /// [`VaultError::PermissionDenied`] naming the path.
    pub async fn read_kv(&self, kv_path: &str) -> Result<HashMap<String, String>, VaultError> {
        const OP: &str = "reading KV path";

        let api_path = join_path(&[&self.base_path, "data", kv_path]);
        debug!(path = %kv_path, "vault KV read");

        let response = self
            .authed(self.http.get(self.api_url(&api_path)))
            .send()
            .await
            .map_err(|source| request_err(OP, kv_path, source))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(HashMap::new()),
            StatusCode::FORBIDDEN => {
                Err(VaultError::PermissionDenied { operation: OP, path: kv_path.to_string() })
            }
            status if status.is_success() => {
                let body: KvReadResponse = response
                    .json()
                    .await
                    .map_err(|source| request_err(OP, kv_path, source))?;
                Ok(extract_kv_data(body))
            }
            status => Err(VaultError::UnexpectedStatus {
                operation: OP,
                path: kv_path.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// List keys and directories at a KV v2 metadata path. Requires the
    /// `list` capability; a missing path yields an empty listing.
    pub async fn list_keys(&self, kv_path: &str) -> Result<Vec<KvEntry>, VaultError> {
        const OP: &str = "listing KV path";

        let api_path = join_path(&[&self.base_path, "metadata", kv_path]);
        let list = Method::from_bytes(b"LIST").expect("LIST is a valid method");

        let response = self
            .authed(self.http.request(list, self.api_url(&api_path)))
            .send()
            .await
            .map_err(|source| request_err(OP, kv_path, source))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            StatusCode::FORBIDDEN => {
                Err(VaultError::PermissionDenied { operation: OP, path: kv_path.to_string() })
            }
            status if status.is_success() => {
                let body: KvListResponse = response
                    .json()
                    .await
                    .map_err(|source| request_err(OP, kv_path, source))?;

                let keys = body.data.map(|d| d.keys).unwrap_or_default();
                Ok(keys
                    .into_iter()
                    .map(|name| {
                        let is_dir = name.ends_with('/');
                        KvEntry { name, is_dir }
                    })
                    .collect())
            }
            status => Err(VaultError::UnexpectedStatus {
                operation: OP,
                path: kv_path.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Look up the current token and return its remaining TTL.
    pub async fn token_ttl(&self) -> Result<Duration, VaultError> {
        const OP: &str = "looking up token TTL";
        const PATH: &str = "auth/token/lookup-self";

        let response = self
            .authed(self.http.get(self.api_url(PATH)))
            .send()
            .await
            .map_err(|source| request_err(OP, PATH, source))?;

        if !response.status().is_success() {
            return Err(VaultError::UnexpectedStatus {
                operation: OP,
                path: PATH.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: TokenLookupResponse =
            response.json().await.map_err(|source| request_err(OP, PATH, source))?;

        let ttl = body.data.map(|d| d.ttl).unwrap_or(0);
        Ok(Duration::from_secs(ttl.max(0) as u64))
    }

    /// Whether the client holds a token that has not expired. Lookup
    /// failures are treated as unauthenticated.
    pub async fn is_authenticated(&self) -> bool {
        if self.token.is_empty() {
            return false;
        }

        match self.token_ttl().await {
            Ok(ttl) => !ttl.is_zero(),
            Err(_) => false,
        }
    }

    /// Build a full API URL from a `v1`-relative path.
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path)
    }

    /// Attach the token header when a token is set.
    pub(crate) fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.header("X-Vault-Token", &self.token)
        }
    }

    /// The shared HTTP client, for the auth flows in this module.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

#[async_trait]
impl VaultReader for VaultClient {
    async fn read_kv(&self, path: &str) -> Result<HashMap<String, String>, VaultError> {
        VaultClient::read_kv(self, path).await
    }
}

/// Join path segments with `/`, skipping empty ones (an empty mount point
/// must not produce a leading slash).
fn join_path(segments: &[&str]) -> String {
    segments.iter().filter(|s| !s.is_empty()).copied().collect::<Vec<_>>().join("/")
}

fn request_err(operation: &'static str, path: &str, source: reqwest::Error) -> VaultError {
    VaultError::Request { operation, path: path.to_string(), source }
}

/// KV v2 read responses nest the fields under `data.data`.
#[derive(Deserialize)]
struct KvReadResponse {
    data: Option<KvReadEnvelope>,
}

#[derive(Deserialize)]
struct KvReadEnvelope {
    #[serde(default)]
    data: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct KvListResponse {
    data: Option<KvListKeys>,
}

#[derive(Deserialize)]
struct KvListKeys {
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Deserialize)]
struct TokenLookupResponse {
    data: Option<TokenLookupData>,
}

#[derive(Deserialize)]
struct TokenLookupData {
    #[serde(default)]
    ttl: i64,
}

/// Keep only string-valued fields, dropping numbers, booleans, and nested
/// structures the same way the KV engine's CLI presents them.
fn extract_kv_data(body: KvReadResponse) -> HashMap<String, String> {
    let Some(fields) = body.data.and_then(|envelope| envelope.data) else {
        return HashMap::new();
    };

    fields
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key, s)),
            _ => None,
        })
        .collect()
}
