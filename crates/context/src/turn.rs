//! Conversation turns

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tagloop_parser::ActionCall;

static NEXT_TURN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique turn identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TurnId(u64);

impl TurnId {
    pub(crate) fn next() -> Self {
        TurnId(NEXT_TURN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ActionResult,
}

impl Role {
    /// Label shown to the model in the rendered context
    pub fn label(self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::ActionResult => "Action Result",
        }
    }
}

/// A stored unit of conversation
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub raw_content: String,
    /// What the model sees; differs from `raw_content` only for summarized
    /// assistant turns
    pub rendered_content: String,
    pub action_calls: Vec<ActionCall>,
    /// Assistant turn this action result answers
    pub resolves: Option<TurnId>,
    /// Judged outcome of this assistant turn's tracked call
    pub successful: Option<bool>,
}

impl Turn {
    pub(crate) fn new(
        role: Role,
        raw_content: String,
        rendered_content: String,
        action_calls: Vec<ActionCall>,
    ) -> Self {
        Self {
            id: TurnId::next(),
            role,
            raw_content,
            rendered_content,
            action_calls,
            resolves: None,
            successful: None,
        }
    }

    /// The call that takes part in success bookkeeping.
    ///
    /// Only the first call of a multi-call turn is tracked.
    pub fn action_call(&self) -> Option<&ActionCall> {
        self.action_calls.first()
    }

    /// `"{label}:\n{content}"`, followed by call markup for assistant turns
    pub fn render(&self) -> String {
        let mut body = Vec::with_capacity(1 + self.action_calls.len());
        if !self.rendered_content.is_empty() {
            body.push(self.rendered_content.clone());
        }
        body.extend(self.action_calls.iter().map(ActionCall::to_markup));
        format!("{}:\n{}", self.role.label(), body.join("\n"))
    }
}

/// Input to [`ConversationStore::append`](crate::ConversationStore::append)
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub role: Role,
    pub content: String,
    pub action_calls: Vec<ActionCall>,
}

impl TurnInput {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, action_calls: Vec<ActionCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            action_calls,
        }
    }

    pub fn action_result(content: impl Into<String>) -> Self {
        Self::plain(Role::ActionResult, content)
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            action_calls: Vec::new(),
        }
    }
}
