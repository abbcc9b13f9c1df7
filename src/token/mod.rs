//! Vault token lifecycle: persistence, renewal, and the background daemon.
//!
//! The token obtained at login is persisted to an owner-only sink file and
//! kept alive by a renewal daemon that extends the lease before it expires.
//! When renewal is no longer possible the daemon steps aside and the next
//! interactive command re-authenticates.

mod daemon;
mod error;
mod paths;
mod renewal;
mod sink;
mod spawn;

pub use daemon::{Daemon, DaemonStatus, daemon_is_running};
pub use error::TokenError;
pub use paths::Paths;
pub use renewal::TokenRenewer;
pub use sink::Sink;
pub use spawn::start_daemon_process;
