//! Actions the model can request

pub mod browser;
pub mod directory;
pub mod filesystem;
pub mod path_utils;
pub mod shell;
pub mod terminal;
pub mod user;

pub use browser::BrowserAction;
pub use directory::{GlobDirectoryAction, ListDirectoryAction};
pub use filesystem::{ReadFileAction, ReplaceInFileAction, WriteToFileAction};
pub use shell::ShellAction;
pub use terminal::TerminalSession;
pub use user::{AskUserAction, AttemptCompletionAction, ConsoleUser, UserChannel};

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tagloop_parser::{ActionCall, ActionSignature, Vocabulary};
use tracing::debug;

use crate::{AgentError, BoxError};

/// What an action hands back to the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    pub content: String,
    /// Ends the run (an accepted completion)
    pub terminal: bool,
}

impl ActionOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            terminal: false,
        }
    }

    pub fn terminal(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            terminal: true,
        }
    }
}

impl From<String> for ActionOutput {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn required(&self) -> &[&str];

    fn optional(&self) -> &[&str] {
        &[]
    }

    /// Markup example shown to the model
    fn usage(&self) -> String {
        let mut out = format!("<{}>\n", self.name());
        for arg in self.required() {
            out.push_str(&format!("<{arg}>{arg} here</{arg}>\n"));
        }
        for arg in self.optional() {
            out.push_str(&format!("<{arg}>{arg} here (optional)</{arg}>\n"));
        }
        out.push_str(&format!("</{}>", self.name()));
        out
    }

    /// `args` is a JSON object of string values keyed by argument name
    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError>;

    /// Release held resources
    async fn shutdown(&self) {}
}

pub fn signature(action: &dyn Action) -> ActionSignature {
    ActionSignature::new(
        action.name(),
        action.required().iter().copied(),
        action.optional().iter().copied(),
    )
}

type BoxedAction = Box<dyn Action>;

/// Actions in registration order, which is also the parser's vocabulary order
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<BoxedAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action, replacing one with the same name in place
    pub fn register<A: Action + 'static>(&mut self, action: A) {
        match self.actions.iter().position(|a| a.name() == action.name()) {
            Some(index) => self.actions[index] = Box::new(action),
            None => self.actions.push(Box::new(action)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Action> {
        self.actions.iter().map(|a| a.as_ref())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn vocabulary(&self) -> Vocabulary {
        self.iter().map(signature).collect()
    }

    /// Check argument names against the action's declaration
    pub fn validate(&self, call: &ActionCall) -> Result<&dyn Action, AgentError> {
        let action = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ActionNotFound(call.name.clone()))?;

        let invalid = |reason: String| AgentError::InvalidArguments {
            action: call.name.clone(),
            reason,
        };
        if let Some(missing) = action
            .required()
            .iter()
            .find(|arg| !call.arguments.contains(arg))
        {
            return Err(invalid(format!("missing required argument '{}'", missing)));
        }
        if let Some(extra) = call.arguments.names().find(|name| {
            !action.required().contains(name) && !action.optional().contains(name)
        }) {
            return Err(invalid(format!("undeclared argument '{}'", extra)));
        }
        Ok(action)
    }

    pub async fn execute(&self, call: &ActionCall) -> Result<ActionOutput, BoxError> {
        let action = self.validate(call)?;
        debug!("◆ Executing {}", call.name);
        action.execute(call.arguments.to_json()).await
    }

    /// Shut every action down, in registration order
    pub async fn shutdown(&self) {
        for action in &self.actions {
            action.shutdown().await;
        }
    }
}

/// Knobs for the default action set
#[derive(Debug, Clone)]
pub struct ActionSettings {
    pub shell_timeout: Duration,
    pub auto_approve: bool,
    pub max_page_chars: usize,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self::from(&tagloop_config::ActionsConfig::default())
    }
}

impl From<&tagloop_config::ActionsConfig> for ActionSettings {
    fn from(config: &tagloop_config::ActionsConfig) -> Self {
        Self {
            shell_timeout: Duration::from_secs(config.shell_timeout_secs),
            auto_approve: config.auto_approve,
            max_page_chars: config.max_page_chars,
        }
    }
}

/// Register the standard actions rooted at `workspace`
pub fn register_default_actions(
    registry: &mut ActionRegistry,
    workspace: &Path,
    settings: &ActionSettings,
    user: Arc<dyn UserChannel>,
) {
    let workspace = workspace.to_path_buf();

    registry.register(ReadFileAction::new(workspace.clone()));
    registry.register(WriteToFileAction::new(workspace.clone()));
    registry.register(ReplaceInFileAction::new(workspace.clone()));
    registry.register(ListDirectoryAction::new(workspace.clone()));
    registry.register(GlobDirectoryAction::new(workspace.clone()));

    registry.register(ShellAction::new(
        workspace,
        settings.shell_timeout,
        settings.auto_approve,
        user.clone(),
    ));

    registry.register(BrowserAction::new(settings.max_page_chars));

    registry.register(AskUserAction::new(user.clone()));
    registry.register(AttemptCompletionAction::new(user));
}
