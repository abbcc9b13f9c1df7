//! Merging root and workspace configuration for one environment.

use std::collections::HashMap;

use super::error::ConfigError;
use super::schema::{DefaultValue, MergedConfig, RootConfig, WorkspaceConfig};

/// Combine a root config and an optional workspace config into the
/// effective view for `env`.
///
/// An empty `env` selects the root's default environment; anything else
/// must appear in `environments.available`. Workspace secrets and defaults
/// override the root's on key collision, and per-environment defaults
/// override base literals within each layer. Inputs are borrowed and never
/// mutated; the result owns fresh containers.
pub fn merge(
    root: &RootConfig,
    workspace: Option<&WorkspaceConfig>,
    env: &str,
) -> Result<MergedConfig, ConfigError> {
    let env = if env.is_empty() { root.environments.default.as_str() } else { env };

    if !root.environments.available.iter().any(|e| e == env) {
        return Err(ConfigError::UnknownEnvironment {
            env: env.to_string(),
            available: root.environments.available.join(", "),
        });
    }

    let mut defaults = resolve_defaults(&root.defaults, env);
    if let Some(ws) = workspace {
        for (key, value) in resolve_defaults(&ws.defaults, env) {
            defaults.insert(key, value);
        }
    }

    let mut secrets = root.secrets.clone();
    if let Some(ws) = workspace {
        for (key, value) in &ws.secrets {
            secrets.insert(key.clone(), value.clone());
        }
    }

    Ok(MergedConfig {
        vault: root.vault.clone(),
        environment: env.to_string(),
        secrets,
        defaults,
    })
}

/// Flatten one `defaults` table for `env`: base literals first, then the
/// matching per-environment table on top.
fn resolve_defaults(
    defaults: &HashMap<String, DefaultValue>,
    env: &str,
) -> HashMap<String, String> {
    let mut result = HashMap::new();

    for (key, value) in defaults {
        if let DefaultValue::Literal(s) = value {
            result.insert(key.clone(), s.clone());
        }
    }

    if let Some(DefaultValue::PerEnv(overrides)) = defaults.get(env) {
        for (key, value) in overrides {
            result.insert(key.clone(), value.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EnvironmentsConfig;

    fn root_with_envs(envs: &[&str]) -> RootConfig {
        RootConfig {
            environments: EnvironmentsConfig {
                default: envs[0].to_string(),
                available: envs.iter().map(|e| e.to_string()).collect(),
            },
            ..Default::default()
        }
    }

    fn literal(s: &str) -> DefaultValue {
        DefaultValue::Literal(s.to_string())
    }

    fn per_env(pairs: &[(&str, &str)]) -> DefaultValue {
        DefaultValue::PerEnv(
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }

    #[test]
    fn empty_env_selects_the_default() {
        let root = root_with_envs(&["dev", "production"]);

        let merged = merge(&root, None, "").unwrap();

        assert_eq!(merged.environment, "dev");
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let root = root_with_envs(&["dev", "staging"]);

        let err = merge(&root, None, "production").unwrap_err();

        match err {
            ConfigError::UnknownEnvironment { env, available } => {
                assert_eq!(env, "production");
                assert_eq!(available, "dev, staging");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn workspace_secrets_override_root() {
        let mut root = root_with_envs(&["staging"]);
        root.secrets.insert("DATABASE_URL".to_string(), "${env}/db/url".to_string());

        let mut ws = WorkspaceConfig::default();
        ws.secrets.insert("DATABASE_URL".to_string(), "${env}/db/url2".to_string());

        let merged = merge(&root, Some(&ws), "staging").unwrap();

        assert_eq!(merged.secrets["DATABASE_URL"], "${env}/db/url2");
    }

    #[test]
    fn env_specific_default_overrides_base() {
        let mut root = root_with_envs(&["dev", "production"]);
        root.defaults.insert("NODE_ENV".to_string(), literal("development"));
        root.defaults
            .insert("production".to_string(), per_env(&[("NODE_ENV", "production")]));

        let prod = merge(&root, None, "production").unwrap();
        let dev = merge(&root, None, "dev").unwrap();

        assert_eq!(prod.defaults["NODE_ENV"], "production");
        assert_eq!(dev.defaults["NODE_ENV"], "development");
    }

    #[test]
    fn workspace_defaults_layer_over_root_defaults() {
        let mut root = root_with_envs(&["dev"]);
        root.defaults.insert("PORT".to_string(), literal("3000"));
        root.defaults.insert("HOST".to_string(), literal("0.0.0.0"));

        let mut ws = WorkspaceConfig::default();
        ws.defaults.insert("PORT".to_string(), literal("4000"));
        ws.defaults.insert("dev".to_string(), per_env(&[("HOST", "127.0.0.1")]));

        let merged = merge(&root, Some(&ws), "dev").unwrap();

        assert_eq!(merged.defaults["PORT"], "4000");
        assert_eq!(merged.defaults["HOST"], "127.0.0.1");
    }

    #[test]
    fn per_env_table_for_other_environment_is_ignored() {
        let mut root = root_with_envs(&["dev", "production"]);
        root.defaults
            .insert("production".to_string(), per_env(&[("NODE_ENV", "production")]));

        let merged = merge(&root, None, "dev").unwrap();

        assert!(!merged.defaults.contains_key("NODE_ENV"));
        assert!(!merged.defaults.contains_key("production"));
    }

    #[test]
    fn merge_is_pure_and_repeatable() {
        let mut root = root_with_envs(&["dev"]);
        root.secrets.insert("A".to_string(), "${env}/a/k".to_string());
        root.defaults.insert("B".to_string(), literal("b"));

        let mut ws = WorkspaceConfig::default();
        ws.secrets.insert("C".to_string(), "shared/c/k".to_string());

        let root_before = root.clone();
        let ws_before = ws.clone();

        let first = merge(&root, Some(&ws), "dev").unwrap();
        let second = merge(&root, Some(&ws), "dev").unwrap();

        assert_eq!(first, second);
        assert_eq!(root.secrets, root_before.secrets);
        assert_eq!(root.defaults, root_before.defaults);
        assert_eq!(ws.secrets, ws_before.secrets);
        assert_eq!(ws.defaults, ws_before.defaults);
    }

    #[test]
    fn carries_vault_settings_from_root() {
        let mut root = root_with_envs(&["dev"]);
        root.vault.address = "https://vault.example.com".to_string();
        root.vault.base_path = "secret".to_string();

        let merged = merge(&root, None, "dev").unwrap();

        assert_eq!(merged.vault.address, "https://vault.example.com");
        assert_eq!(merged.vault.base_path, "secret");
    }
}
