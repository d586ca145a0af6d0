//! Conversation store with compaction
//!
//! Keeps the dialogue between the agent and the model bounded: assistant
//! turns are summarized, and chains of failed attempts are pruned once a
//! later success is judged to have reached the original goal.

use thiserror::Error;

pub mod judge;
pub mod store;
pub mod turn;

pub use judge::{Judge, LlmJudge};
pub use store::{CompactionOptions, ConversationStore, LedgerEntry, StatusReport};
pub use turn::{Role, Turn, TurnId, TurnInput};

/// Context errors
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("judgment failed: {0}")]
    Judgment(String),

    #[error("model error: {0}")]
    Provider(#[from] tagloop_provider::ProviderError),
}

pub type Result<T> = std::result::Result<T, ContextError>;

/// Whitespace-separated word count used by the context counters
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
