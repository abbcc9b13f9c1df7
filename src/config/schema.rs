//! Configuration schema for `vx.toml` files.
//!
//! A monorepo has one root `vx.toml` declaring the Vault connection,
//! environments, shared secrets, and workspace subtrees. Each workspace's
//! own `vx.toml` overlays additional secrets and defaults for that
//! subdirectory.

use serde::Deserialize;
use std::collections::HashMap;

/// The root `vx.toml` configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RootConfig {
    /// Vault server connection settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Declared environments and the default selection.
    #[serde(default)]
    pub environments: EnvironmentsConfig,

    /// Relative paths to workspace `vx.toml` files.
    #[serde(default)]
    pub workspaces: Vec<String>,

    /// Env var name → Vault path template (may contain `${env}`).
    #[serde(default)]
    pub secrets: HashMap<String, String>,

    /// Env var name → literal default or per-environment overrides.
    #[serde(default)]
    pub defaults: HashMap<String, DefaultValue>,
}

/// Vault server connection settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VaultConfig {
    /// Vault server URL, e.g. `https://vault.example.com`.
    #[serde(default)]
    pub address: String,

    /// Authentication method: `oidc` or `approle`.
    #[serde(default)]
    pub auth_method: String,

    /// Role passed to the auth backend.
    #[serde(default)]
    pub auth_role: String,

    /// KV v2 mount point, e.g. `secret`.
    #[serde(default)]
    pub base_path: String,
}

/// Declared environments and the default selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentsConfig {
    /// Environment used when none is requested explicitly.
    #[serde(default)]
    pub default: String,

    /// All selectable environment names, in declaration order.
    #[serde(default)]
    pub available: Vec<String>,
}

/// A workspace-level `vx.toml`: only secrets and defaults, no vault or
/// environment declarations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceConfig {
    /// Env var name → Vault path template, overlaid on the root's secrets.
    #[serde(default)]
    pub secrets: HashMap<String, String>,

    /// Env var name → default value, overlaid on the root's defaults.
    #[serde(default)]
    pub defaults: HashMap<String, DefaultValue>,
}

/// A `[defaults]` entry: either a literal base value or a nested table of
/// per-environment overrides.
///
/// ```toml
/// [defaults]
/// NODE_ENV = "development"        # Literal
///
/// [defaults.production]
/// NODE_ENV = "production"         # PerEnv, keyed by environment name
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// A base default applied in every environment.
    Literal(String),

    /// Overrides applied only when the table key matches the active
    /// environment.
    PerEnv(HashMap<String, String>),
}

/// The effective configuration for one `(root, workspace, environment)`
/// combination, produced by [`merge`](super::merge).
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    /// Vault connection settings, taken from the root.
    pub vault: VaultConfig,

    /// The environment this view was merged for.
    pub environment: String,

    /// Env var name → path template, workspace entries winning on collision.
    pub secrets: HashMap<String, String>,

    /// Env var name → fully resolved literal default.
    pub defaults: HashMap<String, String>,
}
