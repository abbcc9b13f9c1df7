//! Filesystem layout of the per-user vx state directory.
//!
//! Everything lives under one directory (default `~/.vx`): the cached
//! token, the daemon PID file, and the daemon log. The directory is
//! injectable so tests can relocate the whole layout without touching
//! process-level state.

use std::path::{Path, PathBuf};

use super::error::TokenError;

const DIR_NAME: &str = ".vx";
const TOKEN_FILE: &str = "token";
const PID_FILE: &str = "daemon.pid";
const LOG_FILE: &str = "daemon.log";

/// Locations of the vx state files.
#[derive(Debug, Clone)]
pub struct Paths {
    dir: PathBuf,
}

impl Paths {
    /// Use an explicit state directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The default per-user layout, `~/.vx`.
    pub fn default_dir() -> Result<Self, TokenError> {
        let home = dirs::home_dir().ok_or(TokenError::NoHomeDirectory)?;
        Ok(Self { dir: home.join(DIR_NAME) })
    }

    /// The state directory itself.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The token sink file.
    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// The daemon PID file.
    pub fn pid_path(&self) -> PathBuf {
        self.dir.join(PID_FILE)
    }

    /// The daemon's append-only log file.
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_the_given_directory() {
        let paths = Paths::new("/tmp/vx-test");

        assert_eq!(paths.token_path(), PathBuf::from("/tmp/vx-test/token"));
        assert_eq!(paths.pid_path(), PathBuf::from("/tmp/vx-test/daemon.pid"));
        assert_eq!(paths.log_path(), PathBuf::from("/tmp/vx-test/daemon.log"));
    }

    #[test]
    fn default_layout_is_dot_vx_in_home() {
        let paths = Paths::default_dir().unwrap();
        assert!(paths.dir().ends_with(".vx"));
    }
}
