//! Shell action backed by a persistent terminal session

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::terminal::TerminalSession;
use super::user::{is_yes, UserChannel};
use super::{Action, ActionOutput};
use crate::BoxError;

/// Bytes of command output kept per call
pub const MAX_OUTPUT_BYTES: usize = 10000;

pub struct ShellAction {
    workspace: PathBuf,
    timeout: Duration,
    auto_approve: bool,
    user: Arc<dyn UserChannel>,
    session: Mutex<Option<TerminalSession>>,
}

impl ShellAction {
    pub fn new(
        workspace: PathBuf,
        timeout: Duration,
        auto_approve: bool,
        user: Arc<dyn UserChannel>,
    ) -> Self {
        Self {
            workspace,
            timeout,
            auto_approve,
            user,
            session: Mutex::new(None),
        }
    }

    async fn approved(&self, command: &str) -> Result<bool, BoxError> {
        let answer = self
            .user
            .ask(&format!(
                "Approval required (y/n) for executing following command:\n{}",
                command
            ))
            .await?;
        Ok(is_yes(&answer))
    }
}

#[derive(Deserialize)]
struct ShellArgs {
    command: String,
    requires_approval: Option<String>,
}

#[async_trait]
impl Action for ShellAction {
    fn name(&self) -> &str {
        "shell"
    }
    fn description(&self) -> &str {
        "Execute a CLI command in a persistent shell rooted at the workspace. \
         Working directory and exported variables carry over between commands. \
         Set requires_approval to true for impactful operations such as installing \
         packages, deleting files or network access, and to false for safe reads \
         and builds. Do not start interactive programs."
    }
    fn required(&self) -> &[&str] {
        &["command"]
    }
    fn optional(&self) -> &[&str] {
        &["requires_approval"]
    }
    fn usage(&self) -> String {
        "<shell>\n<command>ls -la</command>\n<requires_approval>false</requires_approval>\n</shell>"
            .to_string()
    }

    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: ShellArgs = serde_json::from_value(args)?;
        let command = args.command.trim();
        if command.is_empty() {
            return Ok(ActionOutput::text("Error: empty command"));
        }

        let needs_approval = args
            .requires_approval
            .as_deref()
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if needs_approval && !self.auto_approve && !self.approved(command).await? {
            return Ok(ActionOutput::text(format!(
                "User denied request to execute command: {}",
                command
            )));
        }

        let mut guard = self.session.lock().await;
        if !guard.as_mut().map(TerminalSession::is_alive).unwrap_or(false) {
            *guard = Some(TerminalSession::spawn(&self.workspace).await?);
        }
        let Some(session) = guard.as_mut() else {
            return Ok(ActionOutput::text("Error: shell session unavailable"));
        };

        debug!("◆ Shell: {}", command);
        let output =
            match tokio::time::timeout(self.timeout, session.run(command, MAX_OUTPUT_BYTES)).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!("◆ Command timed out after {:?}: {}", self.timeout, command);
                    session.kill().await;
                    *guard = None;
                    return Ok(ActionOutput::text(format!(
                        "Command timed out after {} seconds and the shell was restarted. \
                         Working directory and environment were reset.",
                        self.timeout.as_secs()
                    )));
                }
            };

        let mut text = format!("Stdout/Stderr:\n{}", output.output);
        if output.truncated > 0 {
            text.push_str(&format!(
                "\n... output truncated, {} bytes omitted",
                output.truncated
            ));
        }
        match output.exit_code {
            Some(code) => text.push_str(&format!("\nExit code: {}", code)),
            None => {
                *guard = None;
                text.push_str("\nThe shell exited; a new session starts with the next command.");
            }
        }
        Ok(ActionOutput::text(text))
    }

    async fn shutdown(&self) {
        if let Some(mut session) = self.session.lock().await.take() {
            session.kill().await;
            debug!("◆ Shell session closed");
        }
    }
}
