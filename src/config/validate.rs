//! Structural validation of loaded configuration.

use std::path::Path;

use super::error::ConfigError;
use super::schema::RootConfig;

/// Check that a root config has all required fields and a coherent
/// environment declaration.
pub fn validate(root: &RootConfig) -> Result<(), ConfigError> {
    if root.vault.address.is_empty() {
        return Err(ConfigError::Invalid {
            field: "vault.address",
            message: "address is required".to_string(),
        });
    }

    if root.vault.auth_method.is_empty() {
        return Err(ConfigError::Invalid {
            field: "vault.auth_method",
            message: "auth_method is required".to_string(),
        });
    }

    if root.environments.default.is_empty() {
        return Err(ConfigError::Invalid {
            field: "environments.default",
            message: "default environment is required".to_string(),
        });
    }

    if root.environments.available.is_empty() {
        return Err(ConfigError::Invalid {
            field: "environments.available",
            message: "at least one available environment is required".to_string(),
        });
    }

    if !root.environments.available.contains(&root.environments.default) {
        return Err(ConfigError::Invalid {
            field: "environments.default",
            message: format!(
                "default environment {:?} is not in available environments [{}]",
                root.environments.default,
                root.environments.available.join(", "),
            ),
        });
    }

    Ok(())
}

/// Validate a root config and additionally require every `workspaces` entry
/// to resolve to an existing file under `root_dir`.
pub fn validate_with_root(root: &RootConfig, root_dir: &Path) -> Result<(), ConfigError> {
    validate(root)?;

    for workspace in &root.workspaces {
        let path = root_dir.join(workspace);
        if !path.is_file() {
            return Err(ConfigError::WorkspaceMissing { path });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EnvironmentsConfig, VaultConfig};
    use std::fs;
    use tempfile::tempdir;

    fn valid_root() -> RootConfig {
        RootConfig {
            vault: VaultConfig {
                address: "https://vault.example.com".to_string(),
                auth_method: "oidc".to_string(),
                auth_role: "developer".to_string(),
                base_path: "secret".to_string(),
            },
            environments: EnvironmentsConfig {
                default: "dev".to_string(),
                available: vec!["dev".to_string(), "production".to_string()],
            },
            ..Default::default()
        }
    }

    #[test]
    fn accepts_a_valid_config() {
        assert!(validate(&valid_root()).is_ok());
    }

    #[test]
    fn rejects_missing_address() {
        let mut root = valid_root();
        root.vault.address.clear();

        let err = validate(&root).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "vault.address", .. }));
    }

    #[test]
    fn rejects_missing_auth_method() {
        let mut root = valid_root();
        root.vault.auth_method.clear();

        let err = validate(&root).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "vault.auth_method", .. }));
    }

    #[test]
    fn rejects_missing_default_environment() {
        let mut root = valid_root();
        root.environments.default.clear();

        assert!(validate(&root).is_err());
    }

    #[test]
    fn rejects_empty_available_environments() {
        let mut root = valid_root();
        root.environments.available.clear();

        assert!(validate(&root).is_err());
    }

    #[test]
    fn rejects_default_outside_available() {
        let mut root = valid_root();
        root.environments.default = "qa".to_string();

        let err = validate(&root).unwrap_err();
        match err {
            ConfigError::Invalid { field, message } => {
                assert_eq!(field, "environments.default");
                assert!(message.contains("qa"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_with_root_requires_workspace_files() {
        let dir = tempdir().unwrap();
        let mut root = valid_root();
        root.workspaces.push("web/vx.toml".to_string());

        let err = validate_with_root(&root, dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::WorkspaceMissing { .. }));

        fs::create_dir_all(dir.path().join("web")).unwrap();
        fs::write(dir.path().join("web/vx.toml"), "").unwrap();

        assert!(validate_with_root(&root, dir.path()).is_ok());
    }
}
