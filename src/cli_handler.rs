//! Command handlers and the shared config/auth plumbing behind them.
//!
//! Every verb goes through the same steps: locate and load the root
//! config, pick an environment and workspace, and (for verbs that touch
//! Vault) ensure a live token — cached, renewed by the daemon, or obtained
//! through a fresh authentication.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cli::{Cli, ListFormat};
use crate::config::{self, MergedConfig, RootConfig};
use crate::resolver::{Resolver, interpolate};
use crate::token::{Daemon, Paths, Sink, TokenRenewer, start_daemon_process};
use crate::vault::{VaultClient, approle_auth, oidc_auth};

/// Locate and parse the root `vx.toml`, returning the config and the
/// directory it was found in.
pub fn load_config(cli: &Cli) -> Result<(RootConfig, PathBuf)> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir().context("getting working directory")?;
            config::find_root(&cwd)?
        }
    };

    let cfg = config::load_root(&config_path)?;
    let root_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((cfg, root_dir))
}

/// The environment to use: CLI flag over config default.
pub fn resolve_env(cli: &Cli, cfg: &RootConfig) -> String {
    match &cli.env {
        Some(env) => env.clone(),
        None => cfg.environments.default.clone(),
    }
}

/// The Vault address to use: CLI flag over config.
fn vault_addr(cli: &Cli, cfg: &RootConfig) -> String {
    match &cli.vault_addr {
        Some(addr) => addr.clone(),
        None => cfg.vault.address.clone(),
    }
}

/// Determine the workspace for this invocation: the explicit `-w` flag,
/// markers in the child command's args, or the current directory.
pub fn select_workspace(
    cli: &Cli,
    cfg: &RootConfig,
    command_args: &[String],
) -> Result<Option<String>> {
    if let Some(ws) = &cli.workspace {
        debug!(workspace = %ws, "using explicit workspace flag");
        return Ok(Some(ws.clone()));
    }

    let cwd = std::env::current_dir().context("getting working directory")?;
    let detected = config::detect_workspace(command_args, &cwd, &cfg.workspaces)?;

    match &detected {
        Some(ws) => debug!(workspace = %ws, "auto-detected workspace"),
        None => debug!("no workspace detected, loading all secrets"),
    }

    Ok(detected)
}

/// Load the named workspace config (or overlay all of them when none is
/// selected) and merge with the root for `env`.
pub fn merge_for_workspace(
    cfg: &RootConfig,
    root_dir: &Path,
    workspace: Option<&str>,
    env: &str,
) -> Result<MergedConfig> {
    let Some(workspace) = workspace else {
        return merge_all_workspaces(cfg, root_dir, env);
    };

    let ws_path = config::resolve_workspace_path(root_dir, workspace, &cfg.workspaces)?;
    let ws_cfg = config::load_workspace(&ws_path)?;

    Ok(config::merge(cfg, Some(&ws_cfg), env)?)
}

/// With no workspace selected, overlay every workspace's secrets and
/// defaults over the root view. Unreadable workspaces are skipped with a
/// warning rather than failing the whole command.
fn merge_all_workspaces(cfg: &RootConfig, root_dir: &Path, env: &str) -> Result<MergedConfig> {
    let mut merged = config::merge(cfg, None, env)?;

    for ws_rel_path in &cfg.workspaces {
        let ws_path = root_dir.join(ws_rel_path);

        let ws_cfg = match config::load_workspace(&ws_path) {
            Ok(ws_cfg) => ws_cfg,
            Err(e) => {
                warn!(path = %ws_rel_path, "skipping workspace: {e}");
                continue;
            }
        };

        match config::merge(cfg, Some(&ws_cfg), env) {
            Ok(ws_merged) => {
                merged.secrets.extend(ws_merged.secrets);
                merged.defaults.extend(ws_merged.defaults);
            }
            Err(e) => warn!(path = %ws_rel_path, "skipping workspace merge: {e}"),
        }
    }

    Ok(merged)
}

/// Produce a Vault client holding a live token: the cached one when it
/// still verifies, otherwise a fresh authentication (which also restarts
/// the renewal daemon unless suppressed).
pub async fn authenticated_client(cli: &Cli, cfg: &RootConfig) -> Result<VaultClient> {
    let addr = vault_addr(cli, cfg);
    let paths = Paths::default_dir()?;
    let sink = Sink::new(paths.token_path());

    let Ok(token) = sink.read() else {
        warn!("no cached Vault token, authenticating...");
        return authenticate_and_start_daemon(cli, cfg, &paths).await;
    };

    let client = VaultClient::with_token(&addr, &cfg.vault.base_path, &token)?;

    if !client.is_authenticated().await {
        warn!("Vault token expired, re-authenticating...");
        return authenticate_and_start_daemon(cli, cfg, &paths).await;
    }

    debug!("using cached vault token");
    Ok(client)
}

/// Fresh authentication followed by a best-effort daemon start so the new
/// token stays alive.
async fn authenticate_and_start_daemon(
    cli: &Cli,
    cfg: &RootConfig,
    paths: &Paths,
) -> Result<VaultClient> {
    let client = authenticate_new(cli, cfg).await?;

    if !cli.no_daemon {
        start_daemon_background(paths).await;
    }

    Ok(client)
}

/// Authenticate against Vault with the configured method and cache the
/// resulting token in the sink.
pub async fn authenticate_new(cli: &Cli, cfg: &RootConfig) -> Result<VaultClient> {
    let addr = vault_addr(cli, cfg);
    let method = cli.auth.clone().unwrap_or_else(|| cfg.vault.auth_method.clone());
    let paths = Paths::default_dir()?;
    let sink = Sink::new(paths.token_path());

    let mut client = client_for_auth(&addr, &cfg.vault.base_path, &method, &sink)?;

    match method.as_str() {
        "oidc" => {
            info!("opening browser for OIDC authentication...");
            oidc_auth(&mut client, &cfg.vault.auth_role)
                .await
                .context("OIDC authentication")?;
        }
        "approle" => {
            let role_id = credential(cli.role_id.as_deref(), "VX_ROLE_ID");
            let secret_id = credential(cli.secret_id.as_deref(), "VX_SECRET_ID");

            if role_id.is_empty() || secret_id.is_empty() {
                bail!(
                    "AppRole auth requires --role-id and --secret-id \
                     (or VX_ROLE_ID/VX_SECRET_ID env vars)"
                );
            }

            approle_auth(&mut client, &role_id, &secret_id)
                .await
                .context("AppRole authentication")?;
        }
        other => bail!("unsupported auth method: {other}"),
    }

    if let Err(e) = sink.write(client.token()) {
        warn!("failed to cache token: {e}");
    }

    Ok(client)
}

/// A credential from a CLI flag, falling back to an environment variable.
fn credential(flag: Option<&str>, env_var: &str) -> String {
    match flag {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => std::env::var(env_var).unwrap_or_default(),
    }
}

/// Create a client suitable for starting an auth flow. OIDC keeps any
/// stale cached token: some Vault servers require a token (even an expired
/// one) on `auth/oidc/auth_url` for policy evaluation.
fn client_for_auth(
    addr: &str,
    base_path: &str,
    method: &str,
    sink: &Sink,
) -> Result<VaultClient> {
    if method == "oidc"
        && let Ok(stale) = sink.read()
    {
        return Ok(VaultClient::with_token(addr, base_path, &stale)?);
    }

    Ok(VaultClient::new(addr, base_path)?)
}

/// Fetch all of a merged view's secrets from Vault concurrently.
///
/// The resolver's own base path stays empty: the client's `read_kv`
/// already applies the KV mount, and prefixing twice would double it.
pub async fn resolve_secrets(
    client: VaultClient,
    merged: &MergedConfig,
) -> Result<HashMap<String, String>> {
    let resolver = Resolver::new(Arc::new(client), "");

    resolver
        .resolve(&merged.secrets, &merged.environment)
        .await
        .context("resolving secrets")
}

/// Spawn the detached renewal daemon, logging rather than failing: a dead
/// daemon only means the token expires sooner.
pub async fn start_daemon_background(paths: &Paths) {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            warn!("cannot locate vx binary, not starting daemon: {e}");
            return;
        }
    };

    match start_daemon_process(&exe, paths).await {
        Ok(Some(pid)) => info!(pid, "token daemon started"),
        Ok(None) => debug!("token daemon already running"),
        Err(e) => warn!("failed to start token daemon: {e}"),
    }
}

/// Handle `vx list`.
pub async fn run_list(cli: &Cli, format: ListFormat) -> Result<()> {
    let (cfg, root_dir) = load_config(cli)?;
    let env = resolve_env(cli, &cfg);

    let workspace = select_workspace(cli, &cfg, &[])?;
    let merged = merge_for_workspace(&cfg, &root_dir, workspace.as_deref(), &env)?;

    debug!(
        env = %env,
        secrets = merged.secrets.len(),
        defaults = merged.defaults.len(),
        "resolved config"
    );

    match format {
        ListFormat::Table => {
            print_table(&merged, workspace.as_deref());
            Ok(())
        }
        ListFormat::Dotenv => print_dotenv(cli, &cfg, &merged).await,
    }
}

/// Human-readable mapping table; never touches Vault.
fn print_table(merged: &MergedConfig, workspace: Option<&str>) {
    println!("Environment: {}", merged.environment);
    if let Some(ws) = workspace {
        println!("Workspace:   {ws}");
    }
    println!();

    if !merged.secrets.is_empty() {
        println!("Secrets ({}):", merged.secrets.len());
        for name in sorted_keys(&merged.secrets) {
            let path = interpolate(&merged.secrets[name], &merged.environment);
            println!("  {name:<35} -> {path}");
        }
        println!();
    }

    if !merged.defaults.is_empty() {
        println!("Defaults ({}):", merged.defaults.len());
        for name in sorted_keys(&merged.defaults) {
            println!("  {name:<35} = {}", merged.defaults[name]);
        }
    }
}

/// Resolved `KEY=VALUE` lines, defaults overlaid under secrets.
async fn print_dotenv(cli: &Cli, cfg: &RootConfig, merged: &MergedConfig) -> Result<()> {
    let client = authenticated_client(cli, cfg).await?;
    let secrets = resolve_secrets(client, merged).await?;

    let mut all = merged.defaults.clone();
    all.extend(secrets);

    for name in sorted_keys(&all) {
        println!("{name}={}", all[name]);
    }

    Ok(())
}

fn sorted_keys(map: &HashMap<String, String>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}

/// Handle `vx login`.
pub async fn run_login(cli: &Cli) -> Result<()> {
    let (cfg, _root_dir) = load_config(cli)?;

    authenticate_new(cli, &cfg).await?;
    info!("authenticated successfully");

    if cli.no_daemon {
        debug!("skipping daemon start (--no-daemon)");
        return Ok(());
    }

    let paths = Paths::default_dir()?;
    start_daemon_background(&paths).await;

    Ok(())
}

/// Handle `vx daemon start`: run the supervisor in the foreground until
/// interrupted.
pub async fn run_daemon_start(cli: &Cli) -> Result<()> {
    let (cfg, _root_dir) = load_config(cli)?;
    let addr = vault_addr(cli, &cfg);
    let paths = Paths::default_dir()?;

    let renewer = TokenRenewer::new(&addr, paths.token_path())?;
    let daemon = Arc::new(Daemon::new(renewer, paths));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    daemon.start(shutdown_rx).context("starting daemon")?;

    info!("daemon started, press Ctrl+C to stop");

    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("installing SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }

    info!("stopping daemon...");
    if let Err(e) = daemon.stop() {
        warn!("error stopping daemon: {e}");
    }

    Ok(())
}

/// Handle `vx daemon stop`: signal the recorded PID and clean up.
pub fn run_daemon_stop() -> Result<()> {
    let paths = Paths::default_dir()?;
    let pid_path = paths.pid_path();

    let contents = std::fs::read_to_string(&pid_path)
        .map_err(|_| anyhow::anyhow!("daemon is not running (no PID file)"))?;

    let pid: i32 = contents
        .trim()
        .parse()
        .with_context(|| format!("invalid PID file {}", pid_path.display()))?;

    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGTERM)
        .context("sending stop signal")?;

    if let Err(e) = std::fs::remove_file(&pid_path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("removing PID file: {e}");
    }

    info!(pid, "daemon stopped");
    Ok(())
}

/// Handle `vx daemon status`.
pub fn run_daemon_status(cli: &Cli) -> Result<()> {
    let (cfg, _root_dir) = load_config(cli)?;
    let addr = vault_addr(cli, &cfg);
    let paths = Paths::default_dir()?;

    let renewer = TokenRenewer::new(&addr, paths.token_path())?;
    let daemon = Daemon::new(renewer, paths);

    let status = daemon.status();
    if !status.running {
        println!("Daemon: not running");
        return Ok(());
    }

    println!("Daemon: running (PID {})", status.pid);
    if let Some(last) = status.last_renewal {
        println!("Last renewal: {}", last.format("%Y-%m-%d %H:%M:%S"));
    }

    Ok(())
}

/// Handle `vx token status`.
pub async fn run_token_status(cli: &Cli) -> Result<()> {
    let (cfg, _root_dir) = load_config(cli)?;
    let addr = vault_addr(cli, &cfg);
    let paths = Paths::default_dir()?;
    let sink = Sink::new(paths.token_path());

    let Ok(token) = sink.read() else {
        println!("Token: not found");
        println!("Token path: {}", sink.path().display());
        return Ok(());
    };

    let client = VaultClient::with_token(&addr, &cfg.vault.base_path, &token)?;

    let Ok(ttl) = client.token_ttl().await else {
        println!("Token: present but cannot verify (lookup failed)");
        return Ok(());
    };

    if ttl.is_zero() {
        println!("Token: expired");
        return Ok(());
    }

    let expires = chrono::Local::now()
        + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());

    println!("Token: valid");
    println!("TTL: {}", format_duration(ttl));
    println!("Expires: {}", expires.format("%Y-%m-%d %H:%M:%S"));

    Ok(())
}

/// Handle `vx status`: token and daemon health in one view.
pub async fn run_status(cli: &Cli) -> Result<()> {
    let (cfg, _root_dir) = load_config(cli)?;
    let addr = vault_addr(cli, &cfg);
    let paths = Paths::default_dir()?;

    print_token_line(&addr, &cfg, &paths).await;
    print_daemon_line(&addr, &paths);

    Ok(())
}

async fn print_token_line(addr: &str, cfg: &RootConfig, paths: &Paths) {
    let sink = Sink::new(paths.token_path());

    let Ok(token) = sink.read() else {
        println!("Token:  not found");
        return;
    };

    let Ok(client) = VaultClient::with_token(addr, &cfg.vault.base_path, &token) else {
        println!("Token:  error (cannot create client)");
        return;
    };

    let Ok(ttl) = client.token_ttl().await else {
        println!("Token:  present but unverifiable");
        return;
    };

    if ttl.is_zero() {
        println!("Token:  expired");
        return;
    }

    let expires = chrono::Local::now()
        + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
    println!(
        "Token:  valid ({} remaining, expires {})",
        format_duration(ttl),
        expires.format("%H:%M:%S")
    );
}

fn print_daemon_line(addr: &str, paths: &Paths) {
    let Ok(renewer) = TokenRenewer::new(addr, paths.token_path()) else {
        println!("Daemon: error");
        return;
    };

    let status = Daemon::new(renewer, paths.clone()).status();
    if status.running {
        println!("Daemon: running (PID {})", status.pid);
    } else {
        println!("Daemon: not running");
    }
}

/// Handle `vx validate`.
pub fn run_validate(cli: &Cli) -> Result<()> {
    let (cfg, root_dir) = load_config(cli)?;

    config::validate_with_root(&cfg, &root_dir).context("root vx.toml")?;
    debug!(root = %root_dir.display(), "root config valid");
    println!("root vx.toml: valid");

    let mut errors = 0;
    for ws_rel_path in &cfg.workspaces {
        let ws_path = root_dir.join(ws_rel_path);

        match config::load_workspace(&ws_path) {
            Ok(_) => println!("{ws_rel_path}: valid"),
            Err(e) => {
                println!("{ws_rel_path}: ERROR - {e}");
                errors += 1;
            }
        }
    }

    if errors > 0 {
        bail!("{errors} workspace config(s) have errors");
    }

    println!("\nAll {} config files are valid.", 1 + cfg.workspaces.len());
    Ok(())
}

/// Render a duration the way operators read TTLs: `3h25m` or `45m`.
fn format_duration(d: Duration) -> String {
    let hours = d.as_secs() / 3600;
    let minutes = (d.as_secs() % 3600) / 60;

    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}
