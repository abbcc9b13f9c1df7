//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, validating, or merging `vx.toml` configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("reading config file {path}: {source}")]
    Read {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a TOML configuration file.
    #[error("parsing config file {path}: {source}")]
    Parse {
        /// Path to the file that could not be parsed.
        path: PathBuf,
        /// The underlying TOML parse error.
        source: toml::de::Error,
    },

    /// No `vx.toml` was found walking upward from the start directory.
    #[error("vx.toml not found in {start} or any parent directory")]
    RootNotFound {
        /// The directory the search started from.
        start: PathBuf,
    },

    /// A required field is missing or has an invalid value.
    #[error("invalid config: {field}: {message}")]
    Invalid {
        /// The offending field, e.g. `vault.address`.
        field: &'static str,
        /// Why the value is invalid.
        message: String,
    },

    /// The requested environment is not declared in `environments.available`.
    #[error("environment {env:?} is not in available environments [{available}]")]
    UnknownEnvironment {
        /// The environment that was requested.
        env: String,
        /// Comma-separated list of declared environments.
        available: String,
    },

    /// A `workspaces` entry points at a file that does not exist.
    #[error("workspace path {path} does not exist")]
    WorkspaceMissing {
        /// The resolved workspace config path.
        path: PathBuf,
    },

    /// A workspace name did not match any configured workspace path.
    #[error("workspace {name:?} not found in configured workspace paths")]
    UnknownWorkspace {
        /// The workspace name that was requested.
        name: String,
    },
}
