//! Configuration model for monorepo secret management.
//!
//! A root `vx.toml` declares the Vault connection, environments, shared
//! secrets, and workspace subtrees; workspace `vx.toml` files overlay
//! additional secrets and defaults. [`merge`] produces the effective view
//! for one `(root, workspace, environment)` combination.

mod error;
mod loader;
mod merge;
mod schema;
mod validate;
mod workspace;

pub use error::ConfigError;
pub use loader::{CONFIG_FILE_NAME, find_root, load_root, load_workspace};
pub use merge::merge;
pub use schema::{
    DefaultValue, EnvironmentsConfig, MergedConfig, RootConfig, VaultConfig, WorkspaceConfig,
};
pub use validate::{validate, validate_with_root};
pub use workspace::{detect_workspace, resolve_workspace_path};
