//! Workspace confinement for action paths

use std::path::{Component, Path, PathBuf};

/// A path that resolves outside the workspace
#[derive(Debug, Clone)]
pub struct PathValidationError {
    pub path: String,
    pub workspace: String,
}

impl std::fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "path {} is outside workspace {}",
            self.path, self.workspace
        )
    }
}

impl std::error::Error for PathValidationError {}

/// Resolve `path` against the workspace and ensure it stays inside.
///
/// Relative paths are joined to the workspace, `~/` expands to home. `..`
/// is resolved lexically, then the longest existing prefix is canonicalized
/// so symlinks cannot escape. The path itself need not exist.
pub async fn validate_workspace_path(
    path: &str,
    workspace: &Path,
) -> Result<PathBuf, PathValidationError> {
    let expanded = if path.starts_with('~') {
        expand_tilde(path)
    } else {
        workspace.join(path)
    };

    let resolved = canonicalize_existing(&normalize(&expanded)).await;
    let root = canonicalize_existing(&normalize(workspace)).await;

    if !resolved.starts_with(&root) {
        return Err(PathValidationError {
            path: path.to_string(),
            workspace: root.display().to_string(),
        });
    }
    Ok(resolved)
}

/// Drop `.` and fold `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-append the rest
async fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = tokio::fs::canonicalize(&existing).await {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
