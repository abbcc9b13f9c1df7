//! Detached daemon process spawning.
//!
//! `vx login` and `vx exec` want the renewal daemon alive after they exit,
//! so the daemon is spawned as `vx daemon start` in its own session with
//! stdout/stderr redirected into the daemon log.
//!
//! There is a small TOCTOU window between the `daemon_is_running` check and
//! the child's own PID-file write: two racing callers may both pass the
//! guard, but the loser's child detects the duplicate through its own
//! `Daemon::start` and exits. Acceptable for a CLI tool; a file lock could
//! close the window if contention ever matters.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;

use super::daemon::{daemon_is_running, process_alive};
use super::error::TokenError;
use super::paths::Paths;

/// How long to wait before verifying the spawned daemon survived startup.
const SPAWN_VERIFY_DELAY: Duration = Duration::from_millis(200);

/// Spawn `vx daemon start` as a fully detached background process.
///
/// Returns the child PID, or `None` when a daemon is already running and
/// nothing was spawned.
pub async fn start_daemon_process(
    vx_binary: &Path,
    paths: &Paths,
) -> Result<Option<i32>, TokenError> {
    if daemon_is_running(paths) {
        debug!("daemon already running, not spawning");
        return Ok(None);
    }

    let log = open_log_file(paths)?;
    let log_err = log.try_clone().map_err(|source| TokenError::Spawn { source })?;

    let mut command = Command::new(vx_binary);
    command
        .args(["daemon", "start"])
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err);
    detach(&mut command);

    let child = command.spawn().map_err(|source| TokenError::Spawn { source })?;
    let pid = child.id() as i32;
    debug!(pid, "spawned daemon process");

    // Brief wait, then verify the child did not die during its own
    // already-running check or config load.
    tokio::time::sleep(SPAWN_VERIFY_DELAY).await;
    if !process_alive(pid) {
        return Err(TokenError::DaemonExited { log_path: paths.log_path() });
    }

    Ok(Some(pid))
}

/// Open the daemon log for appending, creating the state directory with
/// the usual owner-only permissions on first use.
fn open_log_file(paths: &Paths) -> Result<std::fs::File, TokenError> {
    let log_path = paths.log_path();
    let spawn_err = |source| TokenError::Spawn { source };

    let mut dir_builder = std::fs::DirBuilder::new();
    dir_builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        dir_builder.mode(0o700);
    }
    dir_builder.create(paths.dir()).map_err(spawn_err)?;

    let mut options = std::fs::OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(&log_path).map_err(spawn_err)
}

/// Break the child out of the parent's session so the CLI can exit without
/// taking the daemon down with it.
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    // Safety: setsid is async-signal-safe and the closure does nothing else.
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid().map(drop).map_err(std::io::Error::from)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn short_circuits_when_daemon_is_running() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        // Record this test process itself as the "daemon".
        crate::token::sink::write_private(&paths.pid_path(), &std::process::id().to_string())
            .unwrap();

        let spawned = start_daemon_process(Path::new("/bin/true"), &paths).await.unwrap();

        assert!(spawned.is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        let err = start_daemon_process(Path::new("/nonexistent/vx"), &paths)
            .await
            .unwrap_err();

        assert!(matches!(err, TokenError::Spawn { .. }));
    }

    #[tokio::test]
    async fn immediately_exiting_child_is_reported() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        // `true` ignores "daemon start" and exits 0 right away.
        let err = start_daemon_process(Path::new("/bin/true"), &paths).await.unwrap_err();

        match err {
            TokenError::DaemonExited { log_path } => assert_eq!(log_path, paths.log_path()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn long_lived_child_passes_verification() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        // A stand-in binary that ignores its args and outlives the
        // verification window.
        let fake_vx = dir.path().join("fake-vx");
        std::fs::write(&fake_vx, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&fake_vx, std::fs::Permissions::from_mode(0o755)).unwrap();

        let pid = start_daemon_process(&fake_vx, &paths)
            .await
            .unwrap()
            .expect("child should have been spawned");

        assert!(process_alive(pid));

        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid),
            nix::sys::signal::Signal::SIGKILL,
        );
    }
}
