//! Secret resolution pipeline.
//!
//! Turns merged secret mappings into resolved environment values:
//! `${env}` interpolation ([`template`]), grouping by Vault path
//! ([`grouper`]), an optional TTL cache ([`cache`]), and the bounded
//! concurrent fetch ([`resolver`]).

mod cache;
mod error;
mod grouper;
#[allow(clippy::module_inception)]
mod resolver;
mod template;

pub use cache::Cache;
pub use error::ResolverError;
pub use grouper::{SecretMapping, group_by_path};
pub use resolver::{Resolver, VaultReader};
pub use template::{has_env_var, interpolate};
