//! Child process execution with injected environment.

use std::collections::HashMap;
use std::process::ExitStatus;

use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

use super::error::RunnerError;
use super::signals::forward_signals;

/// Run `command` with `extra_env` merged over the current process
/// environment (extras win on key collision). Stdin, stdout, and stderr
/// are inherited, and SIGINT/SIGTERM/SIGHUP are forwarded to the child
/// until it exits.
///
/// When `shutdown_rx` flips, the child receives SIGKILL and its resulting
/// status is returned.
pub async fn run(
    command: &[String],
    extra_env: &HashMap<String, String>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<ExitStatus, RunnerError> {
    let Some((program, args)) = command.split_first() else {
        return Err(RunnerError::EmptyCommand);
    };

    let env = merge_env(std::env::vars(), extra_env);

    let mut child = Command::new(program)
        .args(args)
        .env_clear()
        .envs(&env)
        .spawn()
        .map_err(|source| RunnerError::Spawn { program: program.clone(), source })?;

    // The PID is present until the child has been reaped, which only
    // happens in the wait below.
    let forwarder = child.id().map(forward_signals);
    debug!(program = %program, "child started");

    let status = tokio::select! {
        status = child.wait() => status,
        () = shutdown_requested(&mut shutdown_rx) => {
            debug!("shutdown signalled, killing child");
            let _ = child.start_kill();
            child.wait().await
        }
    }
    .map_err(|source| RunnerError::Wait { source });

    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }

    status
}

/// Resolve once the shutdown flag flips to true. A dropped sender means
/// shutdown can no longer be requested, so the future pends forever rather
/// than killing the child spuriously.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Extract the exit code to propagate: the child's own code when it exited,
/// 1 when it was killed by a signal or the runner itself failed.
pub fn exit_code(result: &Result<ExitStatus, RunnerError>) -> i32 {
    match result {
        Ok(status) => status.code().unwrap_or(1),
        Err(_) => 1,
    }
}

/// Merge the current environment with additional variables; additional
/// values override existing ones with the same key.
fn merge_env(
    current: impl Iterator<Item = (String, String)>,
    extra: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = current.collect();

    for (key, value) in extra {
        env.insert(key.clone(), value.clone());
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extra(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn no_shutdown() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Dropping the sender must not read as a shutdown request.
        drop(tx);
        rx
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let result = run(&[], &HashMap::new(), no_shutdown()).await;
        assert!(matches!(result, Err(RunnerError::EmptyCommand)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let command = vec!["/nonexistent/definitely-not-a-binary".to_string()];
        let result = run(&command, &HashMap::new(), no_shutdown()).await;

        match result {
            Err(RunnerError::Spawn { program, .. }) => {
                assert_eq!(program, "/nonexistent/definitely-not-a-binary");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn propagates_child_exit_code() {
        let command: Vec<String> =
            ["sh", "-c", "exit 42"].iter().map(|s| s.to_string()).collect();

        let result = run(&command, &HashMap::new(), no_shutdown()).await;

        assert_eq!(exit_code(&result), 42);
    }

    #[tokio::test]
    async fn successful_child_yields_zero() {
        let command: Vec<String> = ["sh", "-c", "true"].iter().map(|s| s.to_string()).collect();

        let result = run(&command, &HashMap::new(), no_shutdown()).await;

        assert!(result.as_ref().unwrap().success());
        assert_eq!(exit_code(&result), 0);
    }

    #[tokio::test]
    async fn injected_env_reaches_the_child() {
        let command: Vec<String> = ["sh", "-c", r#"test "$VX_TEST_VALUE" = injected"#]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = run(&command, &extra(&[("VX_TEST_VALUE", "injected")]), no_shutdown()).await;

        assert_eq!(exit_code(&result), 0);
    }

    #[tokio::test]
    async fn injected_env_overrides_inherited() {
        // Safety: test-only mutation before the child is spawned.
        unsafe { std::env::set_var("VX_TEST_OVERRIDE", "inherited") };

        let command: Vec<String> = ["sh", "-c", r#"test "$VX_TEST_OVERRIDE" = wins"#]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = run(&command, &extra(&[("VX_TEST_OVERRIDE", "wins")]), no_shutdown()).await;

        assert_eq!(exit_code(&result), 0);
    }

    #[tokio::test]
    async fn shutdown_kills_a_long_running_child() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let command: Vec<String> =
            ["sh", "-c", "sleep 30"].iter().map(|s| s.to_string()).collect();

        let runner =
            tokio::spawn(async move { run(&command, &HashMap::new(), shutdown_rx).await });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), runner)
            .await
            .expect("runner should return promptly after shutdown")
            .unwrap();

        // SIGKILL leaves no exit code; the runner maps that to 1.
        assert_eq!(exit_code(&result), 1);
    }

    #[test]
    fn exit_code_maps_runner_errors_to_one() {
        let err: Result<ExitStatus, RunnerError> = Err(RunnerError::EmptyCommand);
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn merge_env_prefers_extras() {
        let current = vec![
            ("KEEP".to_string(), "a".to_string()),
            ("REPLACE".to_string(), "old".to_string()),
        ];

        let merged = merge_env(current.into_iter(), &extra(&[("REPLACE", "new")]));

        assert_eq!(merged["KEEP"], "a");
        assert_eq!(merged["REPLACE"], "new");
    }
}
