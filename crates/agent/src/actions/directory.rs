//! Directory actions: list and glob

use async_trait::async_trait;
use globset::Glob;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::path_utils::validate_workspace_path;
use super::{Action, ActionOutput};
use crate::BoxError;

/// List the entries directly inside a directory
pub struct ListDirectoryAction {
    workspace: PathBuf,
}

impl ListDirectoryAction {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct ListArgs {
    path: String,
}

#[async_trait]
impl Action for ListDirectoryAction {
    fn name(&self) -> &str {
        "list_directory"
    }
    fn description(&self) -> &str {
        "List the files and subdirectories directly within a directory."
    }
    fn required(&self) -> &[&str] {
        &["path"]
    }
    fn usage(&self) -> String {
        "<list_directory>\n<path>src</path>\n</list_directory>".to_string()
    }
    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: ListArgs = serde_json::from_value(args)?;
        let path = validate_workspace_path(&args.path, &self.workspace).await?;

        debug!("◆ Listing {:?}", path);
        if !path.exists() {
            return Ok(format!("Directory at path {} does not exist", args.path).into());
        }
        if !path.is_dir() {
            return Ok(format!("Path {} is not a directory", args.path).into());
        }

        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = entry_kind(&entry.path()).await;
            items.push(format!("{} ({})", name, kind));
        }
        items.sort();

        if items.is_empty() {
            Ok(format!("Directory at {} is empty.", args.path).into())
        } else {
            Ok(items.join("\n").into())
        }
    }
}

async fn entry_kind(path: &Path) -> &'static str {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => "Directory",
        Ok(meta) if meta.is_file() => "File",
        _ => "Unknown",
    }
}

/// Find files under a directory by glob pattern
pub struct GlobDirectoryAction {
    workspace: PathBuf,
}

impl GlobDirectoryAction {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct GlobArgs {
    path: String,
    pattern: String,
}

/// Paths under `root` whose root-relative form matches `pattern`, sorted
pub fn glob_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, globset::Error> {
    let matcher = Glob::new(pattern)?.compile_matcher();
    let mut matches: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?.to_path_buf();
            matcher.is_match(&relative).then_some(relative)
        })
        .collect();
    matches.sort();
    Ok(matches)
}

#[async_trait]
impl Action for GlobDirectoryAction {
    fn name(&self) -> &str {
        "glob_directory"
    }
    fn description(&self) -> &str {
        "Find files matching a glob pattern (e.g. `**/*.rs`, `docs/*.md`) inside a \
         directory. Returns matching paths."
    }
    fn required(&self) -> &[&str] {
        &["path", "pattern"]
    }
    fn usage(&self) -> String {
        "<glob_directory>\n<path>src</path>\n<pattern>**/*.rs</pattern>\n</glob_directory>"
            .to_string()
    }
    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: GlobArgs = serde_json::from_value(args)?;
        let path = validate_workspace_path(&args.path, &self.workspace).await?;

        if !path.exists() {
            return Ok(format!("Directory at path {} does not exist", args.path).into());
        }
        if !path.is_dir() {
            return Ok(format!("Path {} is not a directory", args.path).into());
        }

        debug!("◆ Globbing {} under {:?}", args.pattern, path);
        let pattern = args.pattern.clone();
        let root = path.clone();
        let found = tokio::task::spawn_blocking(move || glob_files(&root, &pattern)).await?;
        let found = match found {
            Ok(found) => found,
            Err(e) => return Ok(format!("Invalid glob pattern {}: {}", args.pattern, e).into()),
        };

        if found.is_empty() {
            return Ok(format!(
                "No file found matching pattern {} at path {}",
                args.pattern, args.path
            )
            .into());
        }
        let base = Path::new(&args.path);
        let lines: Vec<String> = found
            .iter()
            .map(|relative| base.join(relative).display().to_string())
            .collect();
        Ok(lines.join("\n").into())
    }
}
