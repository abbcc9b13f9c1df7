//! On-disk persistence of the Vault token.
//!
//! The token is a bearer credential, so the sink enforces the same
//! permissions `vault login` uses for `~/.vault-token`: directory `0700`,
//! file `0600`. The PID file shares these helpers (and the permission
//! contract) since it lives in the same directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::TokenError;

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Reads and writes the token file at a fixed path.
#[derive(Debug, Clone)]
pub struct Sink {
    path: PathBuf,
}

impl Sink {
    /// A sink at the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The sink's file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the token, stripping surrounding whitespace. A missing or
    /// empty file is an error.
    pub fn read(&self) -> Result<String, TokenError> {
        read_trimmed(&self.path)
    }

    /// Write the token (with a trailing newline), creating the parent
    /// directory on first use.
    pub fn write(&self, token: &str) -> Result<(), TokenError> {
        write_private(&self.path, token)
    }

    /// Remove the token file. A missing file counts as success.
    pub fn remove(&self) -> Result<(), TokenError> {
        remove_if_present(&self.path)
    }
}

/// Read a file and trim surrounding whitespace; empty content is an error.
pub(crate) fn read_trimmed(path: &Path) -> Result<String, TokenError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| TokenError::Read { path: path.to_path_buf(), source })?;

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(TokenError::Empty { path: path.to_path_buf() });
    }

    Ok(trimmed.to_string())
}

/// Write `contents` plus a trailing newline with owner-only permissions,
/// creating the parent directory (mode `0700`) if needed.
pub(crate) fn write_private(path: &Path, contents: &str) -> Result<(), TokenError> {
    let write_err = |source| TokenError::Write { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent() {
        create_private_dir(parent).map_err(write_err)?;
    }

    let mut file = open_private(path).map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.write_all(b"\n").map_err(write_err)?;

    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_if_present(path: &Path) -> Result<(), TokenError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(TokenError::Remove { path: path.to_path_buf(), source }),
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }

    builder.create(dir)
}

fn open_private(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }

    options.open(path)
}
