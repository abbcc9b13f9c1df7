//! Path template interpolation.
//!
//! Secret paths in `vx.toml` may contain the literal placeholder `${env}`,
//! which is substituted with the active environment name at resolution time
//! (e.g. `"${env}/database/url"` becomes `"dev/database/url"`).

/// The placeholder substituted with the active environment name.
const ENV_PLACEHOLDER: &str = "${env}";

/// Replace every occurrence of `${env}` in `path` with the environment name.
///
/// An empty `env` removes the placeholder, which can produce empty path
/// segments; callers that care validate the result.
pub fn interpolate(path: &str, env: &str) -> String {
    path.replace(ENV_PLACEHOLDER, env)
}

/// Report whether `path` contains at least one `${env}` placeholder.
pub fn has_env_var(path: &str) -> bool {
    path.contains(ENV_PLACEHOLDER)
}
