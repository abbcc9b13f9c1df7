//! Token lifecycle error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the token sink, renewer, and daemon.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The user's home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDirectory,

    /// A sink file could not be read.
    #[error("read token: {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A sink file exists but holds nothing. Treated as an error so a
    /// partially written file fails loudly instead of authenticating with
    /// an empty token.
    #[error("read token: {path}: file is empty")]
    Empty {
        /// The empty file.
        path: PathBuf,
    },

    /// A sink file could not be written.
    #[error("write token: {path}: {source}")]
    Write {
        /// The file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A sink file could not be removed.
    #[error("remove token: {path}: {source}")]
    Remove {
        /// The file that could not be removed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The PID file does not contain a decimal process id.
    #[error("parse pid file {path}: {value:?} is not a pid")]
    InvalidPid {
        /// The PID file.
        path: PathBuf,
        /// Its offending contents.
        value: String,
    },

    /// The renewer's HTTP client could not be built.
    #[error("creating renewal http client: {0}")]
    BuildHttp(#[source] reqwest::Error),

    /// A token API call failed at the transport level.
    #[error("renew: {operation}: {source}")]
    Http {
        /// The operation being performed ("lookup" or "renew-self").
        operation: &'static str,
        /// The underlying reqwest error.
        source: reqwest::Error,
    },

    /// A token API call returned a non-success status.
    #[error("renew: {operation}: unexpected status {status}")]
    UnexpectedStatus {
        /// The operation being performed.
        operation: &'static str,
        /// The HTTP status code.
        status: u16,
    },

    /// Vault's renew-self response carried no client token.
    #[error("renew: renew-self: empty client token in response")]
    EmptyClientToken,

    /// `start` was called while a daemon is already alive.
    #[error("daemon: already running")]
    AlreadyRunning,

    /// `stop` was called after the daemon had already been stopped.
    #[error("daemon: not running")]
    NotRunning,

    /// The detached daemon process could not be spawned.
    #[error("start daemon process: {source}")]
    Spawn {
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// The detached daemon process died immediately after spawning.
    #[error("daemon process exited immediately (check {log_path})")]
    DaemonExited {
        /// The daemon log to inspect.
        log_path: PathBuf,
    },
}
