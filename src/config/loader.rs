//! Loading and locating `vx.toml` configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::{RootConfig, WorkspaceConfig};

/// File name of both root and workspace configuration files.
pub const CONFIG_FILE_NAME: &str = "vx.toml";

/// Parse a root `vx.toml` at the given path.
pub fn load_root(path: &Path) -> Result<RootConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a workspace-level `vx.toml` at the given path.
pub fn load_workspace(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Walk upward from `start_dir` and return the path of the first `vx.toml`
/// found.
///
/// This is what lets `vx` run from anywhere inside a monorepo: the root
/// config is discovered the same way git discovers `.git`.
pub fn find_root(start_dir: &Path) -> Result<PathBuf, ConfigError> {
    let start = std::path::absolute(start_dir).map_err(|source| ConfigError::Read {
        path: start_dir.to_path_buf(),
        source,
    })?;

    let mut dir = start.as_path();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "found root config");
            return Ok(candidate);
        }

        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Err(ConfigError::RootNotFound { start }),
        }
    }
}
