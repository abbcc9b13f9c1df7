//! Signal forwarding to the child process.
//!
//! While the child runs, the parent relays SIGINT, SIGTERM, and SIGHUP to
//! it so Ctrl-C and service-manager stops reach the process that should
//! handle them. Installing the handlers also keeps the parent alive long
//! enough to propagate the child's exit code afterwards.

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawn the forwarding loop for the child with the given PID.
///
/// The loop relays each received signal until the returned handle is
/// aborted; callers abort it once the child has been awaited.
pub fn forward_signals(child_pid: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (mut interrupt, mut terminate, mut hangup) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(i), Ok(t), Ok(h)) => (i, t, h),
            _ => {
                warn!("could not install signal handlers, not forwarding");
                return;
            }
        };

        let pid = Pid::from_raw(child_pid as i32);

        loop {
            let sig = tokio::select! {
                _ = interrupt.recv() => Signal::SIGINT,
                _ = terminate.recv() => Signal::SIGTERM,
                _ = hangup.recv() => Signal::SIGHUP,
            };

            debug!(signal = %sig, "forwarding signal to child");
            if let Err(e) = kill(pid, sig) {
                // The child may already have exited; the runner aborts this
                // loop right after reaping it.
                debug!("forwarding {sig} failed: {e}");
            }
        }
    })
}
