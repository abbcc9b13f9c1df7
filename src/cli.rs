//! Command-line interface definitions for vx.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Vault-backed secret manager for monorepos.
///
/// vx resolves secrets from HashiCorp Vault and injects them as environment
/// variables into child processes. It supports workspace-scoped secret
/// loading, parallel Vault reads, and automatic token renewal.
#[derive(Parser, Debug)]
#[command(name = "vx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Environment to use (overrides the config default).
    #[arg(short = 'e', long = "env", global = true, value_name = "NAME")]
    pub env: Option<String>,

    /// Workspace to scope secrets to (auto-detected if omitted).
    #[arg(short = 'w', long = "workspace", global = true, value_name = "NAME")]
    pub workspace: Option<String>,

    /// Path to the root vx.toml (auto-detected by walking upward if omitted).
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip the token daemon; authenticate inline only.
    #[arg(long = "no-daemon", global = true)]
    pub no_daemon: bool,

    /// Authentication method (oidc, approle); overrides the config.
    #[arg(long = "auth", global = true, value_name = "METHOD")]
    pub auth: Option<String>,

    /// Vault address; overrides the config.
    #[arg(long = "vault-addr", global = true, value_name = "URL")]
    pub vault_addr: Option<String>,

    /// AppRole role ID (for --auth approle; falls back to VX_ROLE_ID).
    #[arg(long = "role-id", global = true, value_name = "ID")]
    pub role_id: Option<String>,

    /// AppRole secret ID (for --auth approle; falls back to VX_SECRET_ID).
    #[arg(long = "secret-id", global = true, value_name = "ID")]
    pub secret_id: Option<String>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Subcommands for vx.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command with secrets injected as environment variables.
    ///
    /// Resolves secrets from Vault for the detected environment and
    /// workspace and executes the given command with them injected. The
    /// child's exit code becomes vx's exit code.
    Exec {
        /// The command to run, with its arguments.
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true,
            value_name = "COMMAND"
        )]
        command: Vec<String>,
    },

    /// List secrets that would be resolved for the current context.
    ///
    /// The default "table" format shows Vault paths without fetching
    /// values. Use --format=dotenv to resolve secrets from Vault and print
    /// KEY=VALUE pairs suitable for piping to a .env file:
    ///
    ///   vx list --format=dotenv > .env.docker
    List {
        /// Output format.
        #[arg(long = "format", value_enum, default_value = "table")]
        format: ListFormat,
    },

    /// Authenticate with Vault and start the token renewal daemon.
    ///
    /// Uses the configured auth method (browser-based OIDC or AppRole). On
    /// success the token is saved to ~/.vx/token and the background renewal
    /// daemon is started unless --no-daemon is given.
    Login,

    /// Manage the token renewal daemon.
    ///
    /// The daemon automatically renews your Vault token before it expires.
    Daemon {
        /// Daemon operation.
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Manage Vault tokens.
    Token {
        /// Token operation.
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Show token and daemon health at a glance.
    Status,

    /// Validate all vx.toml configuration files.
    ///
    /// Checks the root vx.toml and all referenced workspace configs for
    /// structural validity. Reports errors for missing fields, invalid
    /// values, and workspace paths that don't exist on disk.
    Validate,
}

/// Daemon subcommands.
#[derive(Subcommand, Debug)]
pub enum DaemonAction {
    /// Start the token renewal daemon in the foreground.
    Start,
    /// Stop the running token renewal daemon.
    Stop,
    /// Show the daemon status.
    Status,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Show the current Vault token status and TTL.
    Status,
}

/// Output formats for `vx list`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListFormat {
    /// Human-readable mapping table (no Vault fetch).
    Table,
    /// Resolved KEY=VALUE lines for piping.
    Dotenv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exec_with_trailing_command() {
        let cli = Cli::parse_from(["vx", "exec", "--", "npm", "run", "dev"]);

        match cli.command {
            Commands::Exec { command } => assert_eq!(command, vec!["npm", "run", "dev"]),
            other => panic!("expected exec, got {other:?}"),
        }
    }

    #[test]
    fn exec_passes_hyphenated_args_through() {
        let cli = Cli::parse_from(["vx", "exec", "--", "cargo", "test", "--workspace"]);

        match cli.command {
            Commands::Exec { command } => {
                assert_eq!(command, vec!["cargo", "test", "--workspace"]);
            }
            other => panic!("expected exec, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_apply_to_subcommands() {
        let cli = Cli::parse_from([
            "vx", "list", "-e", "staging", "-w", "api", "--no-daemon", "-vv",
        ]);

        assert_eq!(cli.env.as_deref(), Some("staging"));
        assert_eq!(cli.workspace.as_deref(), Some("api"));
        assert!(cli.no_daemon);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn list_format_defaults_to_table() {
        let cli = Cli::parse_from(["vx", "list"]);

        match cli.command {
            Commands::List { format } => assert_eq!(format, ListFormat::Table),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn parses_dotenv_format() {
        let cli = Cli::parse_from(["vx", "list", "--format", "dotenv"]);

        match cli.command {
            Commands::List { format } => assert_eq!(format, ListFormat::Dotenv),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn parses_daemon_subcommands() {
        let cli = Cli::parse_from(["vx", "daemon", "start"]);
        assert!(matches!(
            cli.command,
            Commands::Daemon { action: DaemonAction::Start }
        ));

        let cli = Cli::parse_from(["vx", "daemon", "stop"]);
        assert!(matches!(
            cli.command,
            Commands::Daemon { action: DaemonAction::Stop }
        ));
    }

    #[test]
    fn parses_token_status() {
        let cli = Cli::parse_from(["vx", "token", "status"]);
        assert!(matches!(
            cli.command,
            Commands::Token { action: TokenAction::Status }
        ));
    }

    #[test]
    fn parses_approle_credentials() {
        let cli = Cli::parse_from([
            "vx",
            "login",
            "--auth",
            "approle",
            "--role-id",
            "rid",
            "--secret-id",
            "sid",
        ]);

        assert_eq!(cli.auth.as_deref(), Some("approle"));
        assert_eq!(cli.role_id.as_deref(), Some("rid"));
        assert_eq!(cli.secret_id.as_deref(), Some("sid"));
    }
}
