//! Agent core
//!
//! Drives the model through the tag language: render the conversation,
//! parse the reply, run the requested actions and feed their results back.

use thiserror::Error;

pub mod actions;
pub mod loop_agent;
pub mod prompt;

pub use actions::{Action, ActionOutput, ActionRegistry, ActionSettings};
pub use loop_agent::{AgentLoop, LoopSettings, Outcome, RunReport};
pub use prompt::PromptBuilder;

/// Error type returned by actions
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("unknown action: {0}")]
    ActionNotFound(String),

    #[error("invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model error: {0}")]
    Provider(#[from] tagloop_provider::ProviderError),

    #[error("context error: {0}")]
    Context(#[from] tagloop_context::ContextError),

    #[error("max iterations ({0}) exceeded")]
    MaxIterations(u32),
}

pub type Result<T> = std::result::Result<T, AgentError>;
