//! File actions: read, write, SEARCH/REPLACE edit

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use super::path_utils::validate_workspace_path;
use super::{Action, ActionOutput};
use crate::BoxError;

/// Read a file
pub struct ReadFileAction {
    workspace: PathBuf,
}

impl ReadFileAction {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[async_trait]
impl Action for ReadFileAction {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read the contents of a file at the given path. Use this to examine files \
         whose contents you do not know, such as source code or configuration."
    }
    fn required(&self) -> &[&str] {
        &["path"]
    }
    fn usage(&self) -> String {
        "<read_file>\n<path>src/main.rs</path>\n</read_file>".to_string()
    }
    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: PathArgs = serde_json::from_value(args)?;
        let path = validate_workspace_path(&args.path, &self.workspace).await?;

        debug!("◆ Reading {:?}", path);
        if !path.exists() {
            return Ok(format!("File at path {} does not exist", args.path).into());
        }
        if !path.is_file() {
            return Ok(format!("Path {} is not a file", args.path).into());
        }
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content.into()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Ok(format!("Permission denied: {}", args.path).into())
            }
            Err(e) => Ok(format!("Error reading {}: {}", args.path, e).into()),
        }
    }
}

/// Create or overwrite a file
pub struct WriteToFileAction {
    workspace: PathBuf,
}

impl WriteToFileAction {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[async_trait]
impl Action for WriteToFileAction {
    fn name(&self) -> &str {
        "write_to_file"
    }
    fn description(&self) -> &str {
        "Write content to a file, creating it and any missing parent directories, \
         or overwriting it if it exists. Always provide the COMPLETE file content."
    }
    fn required(&self) -> &[&str] {
        &["path", "content"]
    }
    fn usage(&self) -> String {
        "<write_to_file>\n<path>src/config.json</path>\n<content>\n{ \"debug\": true }\n</content>\n</write_to_file>"
            .to_string()
    }
    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: WriteArgs = serde_json::from_value(args)?;
        let path = validate_workspace_path(&args.path, &self.workspace).await?;

        debug!("◆ Writing {:?}", path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::write(&path, &args.content).await {
            Ok(()) => Ok(format!(
                "Wrote {} bytes to {}",
                args.content.len(),
                args.path
            )
            .into()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Ok(format!("Permission denied: {}", args.path).into())
            }
            Err(e) => Ok(format!("Error writing {}: {}", args.path, e).into()),
        }
    }
}

/// Edit a file with SEARCH/REPLACE blocks
pub struct ReplaceInFileAction {
    workspace: PathBuf,
}

impl ReplaceInFileAction {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct ReplaceArgs {
    path: String,
    diff: String,
}

const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
const DIVIDER: &str = "=======";
const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

/// One SEARCH/REPLACE pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub search: String,
    pub replace: String,
}

enum BlockState {
    Outside,
    Search(Vec<String>),
    Replace(Vec<String>, Vec<String>),
}

/// Parse `<<<<<<< SEARCH` / `=======` / `>>>>>>> REPLACE` blocks.
///
/// Lines inside a section are joined with `\n`. Text outside blocks and
/// unterminated blocks are ignored.
pub fn parse_blocks(diff: &str) -> Vec<Replacement> {
    let mut blocks = Vec::new();
    let mut state = BlockState::Outside;

    for line in diff.lines() {
        let marker = line.trim();
        state = match state {
            _ if marker == SEARCH_MARKER => BlockState::Search(Vec::new()),
            BlockState::Outside => BlockState::Outside,
            BlockState::Search(search) if marker == DIVIDER => {
                BlockState::Replace(search, Vec::new())
            }
            BlockState::Search(mut search) => {
                search.push(line.to_string());
                BlockState::Search(search)
            }
            BlockState::Replace(search, replace) if marker == REPLACE_MARKER => {
                blocks.push(Replacement {
                    search: search.join("\n"),
                    replace: replace.join("\n"),
                });
                BlockState::Outside
            }
            BlockState::Replace(search, mut replace) => {
                replace.push(line.to_string());
                BlockState::Replace(search, replace)
            }
        };
    }
    blocks
}

/// Apply each block to its first occurrence. Returns the new content and
/// how many blocks matched.
pub fn apply_blocks(content: &str, blocks: &[Replacement]) -> (String, usize) {
    let mut content = content.to_string();
    let mut applied = 0;
    for block in blocks {
        if block.search.is_empty() || !content.contains(&block.search) {
            continue;
        }
        content = content.replacen(&block.search, &block.replace, 1);
        applied += 1;
    }
    (content, applied)
}

#[async_trait]
impl Action for ReplaceInFileAction {
    fn name(&self) -> &str {
        "replace_in_file"
    }
    fn description(&self) -> &str {
        "Make targeted edits to an existing file with SEARCH/REPLACE blocks. \
         SEARCH text must match the file exactly, including whitespace, and only \
         its first occurrence is replaced. Use several small blocks, in file order, \
         for several changes. An empty REPLACE section deletes the matched text."
    }
    fn required(&self) -> &[&str] {
        &["path", "diff"]
    }
    fn usage(&self) -> String {
        format!(
            "<replace_in_file>\n<path>src/main.rs</path>\n<diff>\n{}\nuse std::io;\n{}\nuse std::fs;\n{}\n</diff>\n</replace_in_file>",
            SEARCH_MARKER, DIVIDER, REPLACE_MARKER
        )
    }
    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: ReplaceArgs = serde_json::from_value(args)?;
        let path = validate_workspace_path(&args.path, &self.workspace).await?;

        if !path.exists() {
            return Ok(format!("ERROR: File not found: {}", args.path).into());
        }
        if !path.is_file() {
            return Ok(format!("ERROR: Path is not a file: {}", args.path).into());
        }
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(format!("ERROR: Error reading file {}: {}", args.path, e).into()),
        };
        if args.diff.trim().is_empty() {
            return Ok(content.into());
        }

        let blocks = parse_blocks(&args.diff);
        if blocks.is_empty() {
            return Ok(format!("ERROR: No valid SEARCH/REPLACE blocks in diff for {}", args.path).into());
        }
        let (updated, applied) = apply_blocks(&content, &blocks);
        debug!("◆ {} of {} blocks matched in {:?}", applied, blocks.len(), path);
        if applied == 0 {
            return Ok(format!(
                "NO_CHANGE_APPLIED: none of the {} SEARCH blocks matched {}",
                blocks.len(),
                args.path
            )
            .into());
        }

        if let Err(e) = tokio::fs::write(&path, &updated).await {
            return Ok(format!("ERROR: Error writing file {}: {}", args.path, e).into());
        }
        Ok(updated.into())
    }
}
