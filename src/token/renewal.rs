//! Proactive token renewal.
//!
//! A Vault token's lease shrinks continuously; the renewer extends it via
//! `renew-self` once the remaining TTL drops below half of the original
//! lease. Renewal is idempotent on the server side, so when the original
//! lease is unknown the renewer simply renews on every check rather than
//! risk missing the window of a short-lived token.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::error::TokenError;
use super::sink::{read_trimmed, write_private};

/// How often the daemon asks the renewer to check the token.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Timeout for each token API call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Tighter budget for the reauth probe, which sits on interactive paths.
const REAUTH_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Renews the token persisted in the sink against a Vault server.
pub struct TokenRenewer {
    vault_addr: String,
    token_path: PathBuf,
    check_interval: Duration,
    http: reqwest::Client,
}

/// The fields of `auth/token/lookup-self` the renewer acts on.
#[derive(Debug, Deserialize)]
struct LookupData {
    #[serde(default)]
    ttl: i64,
    #[serde(default)]
    creation_ttl: i64,
    #[serde(default)]
    renewable: bool,
    #[serde(default)]
    expire_time: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct LookupResponse {
    data: Option<LookupData>,
}

#[derive(Deserialize)]
struct RenewResponse {
    auth: Option<RenewAuth>,
}

#[derive(Deserialize)]
struct RenewAuth {
    #[serde(default)]
    client_token: String,
}

impl TokenRenewer {
    /// Create a renewer for the given Vault address (trailing `/` trimmed)
    /// and token sink path.
    pub fn new(vault_addr: &str, token_path: impl Into<PathBuf>) -> Result<Self, TokenError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(TokenError::BuildHttp)?;

        Ok(Self {
            vault_addr: vault_addr.trim_end_matches('/').to_string(),
            token_path: token_path.into(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            http,
        })
    }

    /// Override how frequently the daemon checks the token.
    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// The configured check interval.
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Perform a single renewal check: look up the current token and renew
    /// it when the remaining TTL has dropped below the threshold. Returns
    /// `Ok` without side effects when no renewal is needed (non-renewable
    /// token, or plenty of lease left).
    pub async fn renew_once(&self) -> Result<(), TokenError> {
        let token = read_trimmed(&self.token_path)?;

        let lookup = self.lookup(&token, HTTP_TIMEOUT).await?;

        if !lookup.renewable {
            debug!("token is not renewable, skipping");
            return Ok(());
        }

        if !needs_renewal(lookup.ttl, lookup.creation_ttl) {
            debug!(ttl = lookup.ttl, "token does not need renewal yet");
            return Ok(());
        }

        let new_token = self.renew(&token).await?;
        write_private(&self.token_path, &new_token)?;

        debug!("token renewed");
        Ok(())
    }

    /// Whether a full re-authentication is required: the sink is missing or
    /// empty, the lookup fails, or the token has actually expired (TTL
    /// exhausted on a token the server gave an expiry). Never writes.
    pub async fn needs_reauth(&self) -> bool {
        let Ok(token) = read_trimmed(&self.token_path) else {
            return true;
        };

        let Ok(lookup) = self.lookup(&token, REAUTH_LOOKUP_TIMEOUT).await else {
            return true;
        };

        let has_expiry = lookup.expire_time.as_ref().is_some_and(|v| !v.is_null());
        lookup.ttl <= 0 && has_expiry
    }

    async fn lookup(&self, token: &str, timeout: Duration) -> Result<LookupData, TokenError> {
        const OP: &str = "lookup";

        let url = format!("{}/v1/auth/token/lookup-self", self.vault_addr);
        let response = self
            .http
            .get(url)
            .header("X-Vault-Token", token)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| TokenError::Http { operation: OP, source })?;

        if !response.status().is_success() {
            return Err(TokenError::UnexpectedStatus {
                operation: OP,
                status: response.status().as_u16(),
            });
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|source| TokenError::Http { operation: OP, source })?;

        Ok(body.data.unwrap_or(LookupData {
            ttl: 0,
            creation_ttl: 0,
            renewable: false,
            expire_time: None,
        }))
    }

    async fn renew(&self, token: &str) -> Result<String, TokenError> {
        const OP: &str = "renew-self";

        let url = format!("{}/v1/auth/token/renew-self", self.vault_addr);
        let response = self
            .http
            .post(url)
            .header("X-Vault-Token", token)
            .send()
            .await
            .map_err(|source| TokenError::Http { operation: OP, source })?;

        if !response.status().is_success() {
            return Err(TokenError::UnexpectedStatus {
                operation: OP,
                status: response.status().as_u16(),
            });
        }

        let body: RenewResponse = response
            .json()
            .await
            .map_err(|source| TokenError::Http { operation: OP, source })?;

        match body.auth {
            Some(auth) if !auth.client_token.is_empty() => Ok(auth.client_token),
            _ => Err(TokenError::EmptyClientToken),
        }
    }
}

/// Whether the remaining TTL warrants a renewal.
///
/// An exhausted TTL (≤ 0) is not renewable territory — that is
/// [`TokenRenewer::needs_reauth`]'s call. With a known original lease the
/// threshold is half of it. With an unknown original lease, always renew.
fn needs_renewal(ttl_seconds: i64, creation_ttl: i64) -> bool {
    if ttl_seconds <= 0 {
        return false;
    }
    if creation_ttl > 0 {
        return ttl_seconds < creation_ttl / 2;
    }
    true
}
