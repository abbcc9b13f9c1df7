//! Resolver error types.

use thiserror::Error;

use crate::vault::VaultError;

/// Errors from resolving secrets against Vault.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// A Vault path could not be read. The first failing path aborts the
    /// whole resolve; partial results are never returned.
    #[error("read vault path {path:?}: {source}")]
    Fetch {
        /// The full KV path that failed.
        path: String,
        /// The underlying client error.
        source: VaultError,
    },

    /// A fetch task panicked or was cancelled.
    #[error("vault fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
