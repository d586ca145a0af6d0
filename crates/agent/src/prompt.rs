//! System prompt assembly

use chrono::Local;
use std::path::{Path, PathBuf};

use crate::actions::ActionRegistry;

/// Builds the system prompt from the environment and the registered actions
pub struct PromptBuilder {
    workspace: PathBuf,
    os: String,
    shell: String,
}

impl PromptBuilder {
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .and_then(|s| {
                Path::new(&s)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "bash".to_string());
        Self {
            workspace: workspace.as_ref().to_path_buf(),
            os: std::env::consts::OS.to_string(),
            shell,
        }
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn build(&self, registry: &ActionRegistry) -> String {
        let mut parts = vec![self.identity(), Self::rules()];

        let mut catalogue = String::from("# Actions");
        for action in registry.iter() {
            catalogue.push_str(&format!(
                "\n\n## {}\n{}\nUsage:\n{}",
                action.name(),
                action.description(),
                action.usage()
            ));
        }
        parts.push(catalogue);

        parts.join("\n\n---\n\n")
    }

    fn identity(&self) -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
        format!(
            r#"# tagloop

You are tagloop, a software engineering agent. You complete tasks by requesting
actions and reading their results, one step at a time.

## Current Time
{}

## Environment
Operating system: {}
Shell: {}
Workspace: {}

Relative paths are resolved against the workspace. Paths outside it are refused."#,
            now,
            self.os,
            self.shell,
            self.workspace.display()
        )
    }

    fn rules() -> String {
        r#"# Action Use

Request an action by writing its name as an XML-style tag, with each argument
in its own tag inside it:

<action_name>
<argument_name>value</argument_name>
</action_name>

- Write arguments verbatim. There is no escaping; do not nest actions.
- Prefer one action per reply and wait for its result before the next step.
- Results arrive in the next message. Check them before assuming success.
- If an action fails, read the error and try a different approach.
- When the task is done and every action succeeded, present the result with
  attempt_completion. Do not end a reply with a question unless you use ask_user."#
            .to_string()
    }
}
