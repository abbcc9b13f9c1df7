//! Workspace detection and resolution.
//!
//! A workspace can be chosen three ways, in priority order: an explicit
//! `-w` value embedded in the child command's args, a `--cwd <path>` pair
//! in those args (tools like turborepo pass one through), or the current
//! working directory falling inside a configured workspace subtree. When
//! none match, no workspace is selected and callers load every workspace.

use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Determine which workspace (by directory basename) the current invocation
/// should scope secrets to. Returns `None` when nothing matches.
pub fn detect_workspace(
    args: &[String],
    cwd: &Path,
    workspaces: &[String],
) -> Result<Option<String>, ConfigError> {
    if let Some(ws) = find_flag_value(args, "-w") {
        return Ok(Some(ws.to_string()));
    }

    if let Some(cwd_arg) = find_flag_value(args, "--cwd") {
        return Ok(match_workspace_by_path(Path::new(cwd_arg), workspaces));
    }

    let abs_cwd = std::path::absolute(cwd).map_err(|source| ConfigError::Read {
        path: cwd.to_path_buf(),
        source,
    })?;

    Ok(match_workspace_by_path(&abs_cwd, workspaces))
}

/// Resolve a workspace name to the absolute path of its `vx.toml`.
///
/// The name matches the basename of the directory containing the workspace
/// config (`web/vx.toml` is the workspace `web`).
pub fn resolve_workspace_path(
    root_dir: &Path,
    workspace: &str,
    workspace_paths: &[String],
) -> Result<PathBuf, ConfigError> {
    for entry in workspace_paths {
        let rel = Path::new(entry);
        let dir_name = rel.parent().and_then(|d| d.file_name()).and_then(|n| n.to_str());

        if dir_name == Some(workspace) {
            return Ok(root_dir.join(rel));
        }
    }

    Err(ConfigError::UnknownWorkspace { name: workspace.to_string() })
}

/// Extract the value following `flag` in an argument list.
fn find_flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|pair| pair[0] == flag)
        .map(|pair| pair[1].as_str())
}

/// Return the workspace whose directory is a prefix of `path`.
fn match_workspace_by_path(path: &Path, workspaces: &[String]) -> Option<String> {
    for entry in workspaces {
        let Some(ws_dir) = Path::new(entry).parent() else {
            continue;
        };

        // Workspace entries are root-relative; compare against the tail of
        // the (possibly absolute) candidate path component-wise.
        if path_contains_suffix_dir(path, ws_dir) {
            return ws_dir.file_name().and_then(|n| n.to_str()).map(|s| s.to_string());
        }
    }

    None
}

/// Whether any suffix of `path`'s components starts with `dir`'s components.
fn path_contains_suffix_dir(path: &Path, dir: &Path) -> bool {
    let wanted: Vec<_> = dir.components().collect();
    if wanted.is_empty() {
        return false;
    }

    let have: Vec<_> = path.components().collect();
    have.windows(wanted.len()).any(|window| window == wanted.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn workspaces() -> Vec<String> {
        vec!["web/vx.toml".to_string(), "packages/api/vx.toml".to_string()]
    }

    #[test]
    fn explicit_flag_wins() {
        let ws = detect_workspace(&args(&["-w", "api"]), Path::new("/tmp"), &workspaces())
            .unwrap();

        assert_eq!(ws.as_deref(), Some("api"));
    }

    #[test]
    fn cwd_argument_matches_workspace_directory() {
        let ws = detect_workspace(
            &args(&["pnpm", "--cwd", "/repo/packages/api", "dev"]),
            Path::new("/tmp"),
            &workspaces(),
        )
        .unwrap();

        assert_eq!(ws.as_deref(), Some("api"));
    }

    #[test]
    fn current_directory_inside_workspace_matches() {
        let ws = detect_workspace(
            &args(&["npm", "start"]),
            Path::new("/repo/web/src/components"),
            &workspaces(),
        )
        .unwrap();

        assert_eq!(ws.as_deref(), Some("web"));
    }

    #[test]
    fn no_match_yields_none() {
        let ws =
            detect_workspace(&args(&["npm", "start"]), Path::new("/elsewhere"), &workspaces())
                .unwrap();

        assert!(ws.is_none());
    }

    #[test]
    fn resolves_workspace_config_path() {
        let path =
            resolve_workspace_path(Path::new("/repo"), "api", &workspaces()).unwrap();

        assert_eq!(path, PathBuf::from("/repo/packages/api/vx.toml"));
    }

    #[test]
    fn unknown_workspace_name_is_an_error() {
        let err =
            resolve_workspace_path(Path::new("/repo"), "mobile", &workspaces()).unwrap_err();

        assert!(matches!(err, ConfigError::UnknownWorkspace { .. }));
    }
}
