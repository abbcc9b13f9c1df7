//! Grouping of secret mappings by their Vault path.
//!
//! KV v2 stores many fields under one path, so secrets that resolve to the
//! same path prefix can be fetched with a single read. The grouper splits
//! each interpolated template at the last `/` into `(vault_path, key)` and
//! buckets the mappings by path.

use std::collections::HashMap;

use super::template::interpolate;

/// One environment variable bound to a field within a grouped Vault path.
///
/// For example `DATABASE_URL` may map to key `url` under the Vault path
/// `dev/database`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMapping {
    /// The environment variable to inject.
    pub env_var: String,
    /// The field name within the path's KV data.
    pub key: String,
}

/// Group secrets by their Vault path prefix after interpolating `env`.
///
/// Each template is split at the *last* `/`: the prefix becomes the Vault
/// read path and the suffix the key within that path's data. Templates
/// without a `/` cannot address a KV v2 field and are dropped.
///
/// The input map is not mutated.
pub fn group_by_path(
    secrets: &HashMap<String, String>,
    env: &str,
) -> HashMap<String, Vec<SecretMapping>> {
    let mut groups: HashMap<String, Vec<SecretMapping>> = HashMap::with_capacity(secrets.len());

    for (env_var, template) in secrets {
        let resolved = interpolate(template, env);

        let Some((vault_path, key)) = split_path(&resolved) else {
            continue;
        };

        groups.entry(vault_path.to_string()).or_default().push(SecretMapping {
            env_var: env_var.clone(),
            key: key.to_string(),
        });
    }

    groups
}

/// Split a resolved path at the last `/` into a Vault path prefix and a key
/// suffix. Returns `None` when either side would be empty.
fn split_path(path: &str) -> Option<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((prefix, key)) if !prefix.is_empty() && !key.is_empty() => Some((prefix, key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn groups_shared_paths_together() {
        let input = secrets(&[
            ("DATABASE_URL", "${env}/database/url"),
            ("DATABASE_PASSWORD", "${env}/database/password"),
            ("OPENAI_API_KEY", "shared/openai/api_key"),
        ]);

        let groups = group_by_path(&input, "dev");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups["dev/database"].len(), 2);
        assert_eq!(groups["shared/openai"].len(), 1);
        assert_eq!(groups["shared/openai"][0].env_var, "OPENAI_API_KEY");
        assert_eq!(groups["shared/openai"][0].key, "api_key");
    }

    #[test]
    fn interpolates_env_before_grouping() {
        let input = secrets(&[("DATABASE_URL", "${env}/database/url")]);

        let groups = group_by_path(&input, "staging");

        assert!(groups.contains_key("staging/database"));
        assert!(!groups.contains_key("dev/database"));
    }

    #[test]
    fn drops_entries_without_separator() {
        let input = secrets(&[("BARE", "no-slash-here"), ("OK", "a/b")]);

        let groups = group_by_path(&input, "dev");

        assert_eq!(groups.len(), 1);
        assert_eq!(groups["a"][0].env_var, "OK");
    }

    #[test]
    fn splits_at_last_separator() {
        let input = secrets(&[("DEEP", "a/b/c/d")]);

        let groups = group_by_path(&input, "dev");

        assert_eq!(groups["a/b/c"][0].key, "d");
    }

    #[test]
    fn round_trips_path_and_key() {
        let input = secrets(&[
            ("A", "${env}/db/url"),
            ("B", "shared/api/token"),
            ("C", "x/y"),
        ]);
        let env = "prod";

        let groups = group_by_path(&input, env);

        for (path, mappings) in &groups {
            for m in mappings {
                let rebuilt = format!("{path}/{}", m.key);
                assert_eq!(rebuilt, interpolate(&input[&m.env_var], env));
            }
        }
    }

    #[test]
    fn empty_input_yields_empty_groups() {
        let groups = group_by_path(&HashMap::new(), "dev");
        assert!(groups.is_empty());
    }
}
