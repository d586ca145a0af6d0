//! Judgments used by compaction

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tagloop_parser::ActionCall;
use tagloop_provider::{ChatParams, Message, Provider};
use tracing::debug;

use crate::{ContextError, Result};

/// The three questions the store asks while compacting
#[async_trait]
pub trait Judge: Send + Sync {
    /// Condense an assistant message
    async fn summarize(&self, text: &str) -> Result<String>;

    /// Did `result` show that `call` succeeded?
    async fn classify_success(&self, call: &ActionCall, result: &str) -> Result<bool>;

    /// Does the transcript of attempts end with the original goal reached?
    async fn classify_goal_achieved(&self, transcript: &str) -> Result<bool>;
}

const SUMMARIZE_PROMPT: &str = "You compress messages written by an autonomous coding agent. \
Rewrite the message below in as few words as possible while keeping every decision, \
file path, command, identifier and stated next step. Reply with the rewritten message only.";

const SUCCESS_PROMPT: &str = "You review the outcome of an action run by an autonomous agent. \
Given the action and its result, decide whether the action succeeded. \
Answer with a single word: yes or no.";

const GOAL_PROMPT: &str = "You review a sequence of attempts made by an autonomous agent. \
The first attempt states what the agent set out to do; later attempts retry it. \
Decide whether the final attempt achieved what the first attempt was trying to do. \
Answer with a single word: yes or no.";

/// Judge backed by a chat model
pub struct LlmJudge<P: Provider> {
    provider: Arc<P>,
    model: String,
    max_tokens: u32,
}

impl<P: Provider> LlmJudge<P> {
    pub fn new(provider: Arc<P>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn ask(&self, instructions: &str, content: String) -> Result<String> {
        let params = ChatParams {
            model: self.model.clone(),
            messages: vec![Message::system(instructions), Message::user(content)],
            max_tokens: self.max_tokens,
            temperature: 0.0,
        };
        let response = self.provider.chat(params).await?;
        Ok(response.content)
    }
}

#[async_trait]
impl<P: Provider> Judge for LlmJudge<P> {
    async fn summarize(&self, text: &str) -> Result<String> {
        let summary = self.ask(SUMMARIZE_PROMPT, text.to_string()).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(ContextError::Judgment("empty summary".to_string()));
        }
        debug!("Summarized {} chars into {}", text.len(), summary.len());
        Ok(summary.to_string())
    }

    async fn classify_success(&self, call: &ActionCall, result: &str) -> Result<bool> {
        let content = format!("Action:\n{}\n\nResult:\n{}", call.to_markup(), result);
        let answer = self.ask(SUCCESS_PROMPT, content).await?;
        let verdict = parse_verdict(&answer)?;
        debug!("Action {} judged successful: {}", call.name, verdict);
        Ok(verdict)
    }

    async fn classify_goal_achieved(&self, transcript: &str) -> Result<bool> {
        let answer = self.ask(GOAL_PROMPT, transcript.to_string()).await?;
        let verdict = parse_verdict(&answer)?;
        debug!("Goal judged achieved: {}", verdict);
        Ok(verdict)
    }
}

fn verdict_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b(yes|no)\b").ok())
        .as_ref()
}

/// First standalone yes/no word of a model answer
pub fn parse_verdict(answer: &str) -> Result<bool> {
    verdict_pattern()
        .and_then(|pattern| pattern.captures(answer))
        .map(|caps| caps[1].eq_ignore_ascii_case("yes"))
        .ok_or_else(|| ContextError::Judgment(format!("no yes/no verdict in {:?}", answer)))
}
