//! Vault client and authentication error types.

use thiserror::Error;

/// Errors from Vault API calls and authentication flows.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The client was constructed without a Vault address.
    #[error("vault address is required")]
    MissingAddress,

    /// The underlying HTTP client could not be built.
    #[error("creating vault http client: {0}")]
    Build(#[source] reqwest::Error),

    /// Transport or decode failure for a single API call. Always names the
    /// path involved.
    #[error("{operation} {path:?}: {source}")]
    Request {
        /// The operation being performed (e.g. "reading KV path").
        operation: &'static str,
        /// The KV or API path involved.
        path: String,
        /// The underlying reqwest error.
        source: reqwest::Error,
    },

    /// Vault returned 403 for a KV path.
    ///
    /// The path is always included so the operator can see which policy
    /// grant is missing.
    #[error("{operation} {path:?}: permission denied")]
    PermissionDenied {
        /// The operation being performed.
        operation: &'static str,
        /// The KV path the token was not allowed to access.
        path: String,
    },

    /// Vault returned an unexpected HTTP status.
    #[error("{operation} {path:?}: unexpected status {status}")]
    UnexpectedStatus {
        /// The operation being performed.
        operation: &'static str,
        /// The KV or API path involved.
        path: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A response body did not have the expected shape.
    #[error("{operation} {path:?}: {message}")]
    UnexpectedResponse {
        /// The operation being performed.
        operation: &'static str,
        /// The KV or API path involved.
        path: String,
        /// What was missing or malformed.
        message: &'static str,
    },

    /// The OIDC callback listener could not bind its port.
    #[error(
        "starting OIDC callback listener on {addr} (is another vault/vx process running?): {source}"
    )]
    ListenerBusy {
        /// The address the listener tried to bind.
        addr: String,
        /// The underlying bind error.
        source: std::io::Error,
    },

    /// The platform browser could not be launched.
    #[error("opening browser for OIDC login: {source}")]
    BrowserLaunch {
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// The OIDC provider redirected back with an error.
    #[error("OIDC callback error: {message}")]
    CallbackError {
        /// The provider's error description.
        message: String,
    },

    /// No OIDC callback arrived within the wait window.
    #[error("OIDC authentication timed out after {seconds} seconds")]
    CallbackTimeout {
        /// How long the flow waited.
        seconds: u64,
    },

    /// A required AppRole credential was not supplied.
    #[error("approle auth: {name} is required")]
    MissingCredential {
        /// The credential field name ("role_id" or "secret_id").
        name: &'static str,
    },

    /// An authentication exchange was rejected by Vault.
    #[error("{method} auth failed with status {status}")]
    AuthFailed {
        /// The auth method ("oidc" or "approle").
        method: &'static str,
        /// The HTTP status code Vault returned.
        status: u16,
    },

    /// An authentication exchange did not yield a client token.
    #[error("{method} auth: empty auth response")]
    EmptyAuthResponse {
        /// The auth method that failed ("oidc" or "approle").
        method: &'static str,
    },
}
