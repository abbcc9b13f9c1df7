//! Child runner error types.

use thiserror::Error;

/// Errors from spawning and supervising the child process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// `run` was called with an empty argv.
    #[error("command must not be empty")]
    EmptyCommand,

    /// The child process could not be started.
    #[error("starting command {program:?}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// Waiting on the child failed.
    #[error("waiting for child process: {source}")]
    Wait {
        /// The underlying wait error.
        source: std::io::Error,
    },
}
