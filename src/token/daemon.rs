//! Background renewal daemon.
//!
//! One long-lived supervisor task drives the renewer: an immediate check on
//! entry, then one per check interval. Liveness is advertised through a PID
//! file in the state directory; `is_running` probes the recorded process
//! with a zero signal, so a stale PID file left by a crash reads as "not
//! running".

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::error::TokenError;
use super::paths::Paths;
use super::renewal::TokenRenewer;
use super::sink::{read_trimmed, remove_if_present, write_private};

/// Point-in-time daemon health.
#[derive(Debug, Clone)]
pub struct DaemonStatus {
    /// Whether the recorded daemon process is alive.
    pub running: bool,
    /// The recorded PID (0 when no PID file exists).
    pub pid: i32,
    /// When this daemon instance last renewed successfully.
    pub last_renewal: Option<DateTime<Utc>>,
}

/// Supervises periodic token renewal for one process.
pub struct Daemon {
    renewer: TokenRenewer,
    paths: Paths,
    stop: watch::Sender<bool>,
    last_renewal: Mutex<Option<DateTime<Utc>>>,
}

impl Daemon {
    /// Create a daemon around the given renewer and state layout.
    pub fn new(renewer: TokenRenewer, paths: Paths) -> Self {
        let (stop, _) = watch::channel(false);

        Self {
            renewer,
            paths,
            stop,
            last_renewal: Mutex::new(None),
        }
    }

    /// Start the supervisor task. Writes this process's PID file and
    /// returns immediately; fails with [`TokenError::AlreadyRunning`] when
    /// a live daemon is already recorded.
    ///
    /// The task exits when [`stop`](Self::stop) is called or `shutdown_rx`
    /// flips, removing the PID file on the way out.
    pub fn start(
        self: &Arc<Self>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), TokenError> {
        if self.is_running() {
            return Err(TokenError::AlreadyRunning);
        }

        let pid = std::process::id();
        write_private(&self.paths.pid_path(), &pid.to_string())?;
        debug!(pid, "daemon started");

        let daemon = Arc::clone(self);
        tokio::spawn(daemon.supervise(shutdown_rx));

        Ok(())
    }

    /// Signal the supervisor to stop and remove the PID file. Fails with
    /// [`TokenError::NotRunning`] when already stopped.
    pub fn stop(&self) -> Result<(), TokenError> {
        if *self.stop.borrow() {
            return Err(TokenError::NotRunning);
        }

        let _ = self.stop.send(true);
        remove_if_present(&self.paths.pid_path())
    }

    /// Whether a live daemon process is recorded in the PID file.
    pub fn is_running(&self) -> bool {
        daemon_is_running(&self.paths)
    }

    /// Report liveness, recorded PID, and the last successful renewal.
    pub fn status(&self) -> DaemonStatus {
        let pid = read_pid_file(&self.paths.pid_path()).ok();
        let running = pid.map(process_alive).unwrap_or(false);

        let last_renewal = *self
            .last_renewal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        DaemonStatus { running, pid: pid.unwrap_or(0), last_renewal }
    }

    /// The supervisor loop. The interval's first tick fires immediately,
    /// giving the on-entry renewal check.
    async fn supervise(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut stop_rx = self.stop.subscribe();
        let mut ticker = tokio::time::interval(self.renewer.check_interval());

        // A stop that raced ahead of this task would otherwise be missed:
        // subscribe() marks the current value as already seen.
        while !*stop_rx.borrow() {
            tokio::select! {
                _ = ticker.tick() => self.try_renew().await,
                _ = stop_rx.changed() => break,
                _ = shutdown_rx.changed() => break,
            }
        }

        if let Err(e) = remove_if_present(&self.paths.pid_path()) {
            warn!("removing PID file on shutdown: {e}");
        }
        debug!("daemon supervisor exited");
    }

    /// One renewal attempt; failures are logged, never fatal to the loop.
    async fn try_renew(&self) {
        match self.renewer.renew_once().await {
            Ok(()) => {
                let mut last = self
                    .last_renewal
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *last = Some(Utc::now());
            }
            Err(e) => warn!("token renewal check failed: {e}"),
        }
    }
}

/// Whether the PID file under `paths` names a live process.
pub fn daemon_is_running(paths: &Paths) -> bool {
    match read_pid_file(&paths.pid_path()) {
        Ok(pid) => process_alive(pid),
        Err(_) => false,
    }
}

/// Read and parse the PID file.
pub(crate) fn read_pid_file(path: &Path) -> Result<i32, TokenError> {
    let contents = read_trimmed(path)?;

    contents.parse().map_err(|_| TokenError::InvalidPid {
        path: path.to_path_buf(),
        value: contents,
    })
}

/// Probe a process with the zero signal.
pub(crate) fn process_alive(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid), None).is_ok()
}
