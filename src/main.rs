//! vx: Vault-backed secret manager for monorepos.
//!
//! This is the main entry point for the vx binary. It parses CLI
//! arguments, initializes logging, and dispatches to the command handlers.
//!
//! The interesting flow is `vx exec`: locate the root config, merge it
//! with the detected workspace for the chosen environment, ensure a live
//! Vault token, resolve every secret concurrently, and hand the combined
//! environment to the child process. All logging goes to stderr so the
//! child owns stdout.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use vx::cli::{Cli, Commands, DaemonAction, TokenAction};
use vx::cli_handler;
use vx::exec;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;
    debug!("parsed CLI arguments: {:?}", cli);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    runtime.block_on(dispatch(cli))
}

/// Initialize the tracing subscriber. Everything goes to stderr so command
/// output (and the wrapped child's stdout) stays clean for piping.
///
/// # Verbosity Levels
/// - 0 (default): warnings and errors (or `RUST_LOG` when set)
/// - 1 (-v): info level
/// - 2 (-vv): debug level
/// - 3+ (-vvv): trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("initializing tracing subscriber")?;

    Ok(())
}

/// Route the parsed command to its handler.
async fn dispatch(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Exec { command } => run_exec(&cli, &command.clone()).await,
        Commands::List { format } => cli_handler::run_list(&cli, *format).await,
        Commands::Login => cli_handler::run_login(&cli).await,
        Commands::Daemon { action } => match action {
            DaemonAction::Start => cli_handler::run_daemon_start(&cli).await,
            DaemonAction::Stop => cli_handler::run_daemon_stop(),
            DaemonAction::Status => cli_handler::run_daemon_status(&cli),
        },
        Commands::Token { action } => match action {
            TokenAction::Status => cli_handler::run_token_status(&cli).await,
        },
        Commands::Status => cli_handler::run_status(&cli).await,
        Commands::Validate => cli_handler::run_validate(&cli),
    }
}

/// Run `vx exec`: resolve secrets for the current context and execute the
/// command with them injected, propagating the child's exit code.
async fn run_exec(cli: &Cli, command: &[String]) -> Result<()> {
    let (cfg, root_dir) = cli_handler::load_config(cli)?;

    let env = cli_handler::resolve_env(cli, &cfg);
    debug!(env = %env, "resolved environment");

    let workspace = cli_handler::select_workspace(cli, &cfg, command)?;
    let merged =
        cli_handler::merge_for_workspace(&cfg, &root_dir, workspace.as_deref(), &env)?;

    let client = cli_handler::authenticated_client(cli, &cfg).await?;
    let secrets = cli_handler::resolve_secrets(client, &merged).await?;

    // Overlay defaults under secrets (secrets take precedence).
    let mut env_vars = merged.defaults.clone();
    env_vars.extend(secrets);

    info!(
        vars = env_vars.len(),
        workspace = workspace.as_deref().unwrap_or(""),
        "injecting environment"
    );

    // The runner owns cancellation through this channel; the CLI itself
    // never triggers it and lets signal forwarding do the work.
    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let result = exec::run(command, &env_vars, shutdown_rx).await;
    match result {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => std::process::exit(exec::exit_code(&result)),
        Err(e) => Err(e.into()),
    }
}
