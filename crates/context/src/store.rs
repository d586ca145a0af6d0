//! Conversation history and the pending failure ledger

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::judge::Judge;
use crate::turn::{Role, Turn, TurnId, TurnInput};
use crate::{word_count, Result};

/// Compaction switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionOptions {
    /// Summarize assistant turns before storing them
    pub summarize: bool,
    /// Judge action results and prune resolved failure chains
    pub prune: bool,
    /// Keep the first failed result alongside the first attempt when pruning
    pub retain_first_result: bool,
    /// Warn when the rendered history grows past this many words (0 = off)
    pub max_context_words: usize,
}

impl Default for CompactionOptions {
    fn default() -> Self {
        Self {
            summarize: true,
            prune: true,
            retain_first_result: true,
            max_context_words: 0,
        }
    }
}

/// One failed (or not yet goal-reaching) attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub assistant: TurnId,
    pub result: TurnId,
}

/// Counters reported at teardown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub turns: usize,
    pub pruned_turns: usize,
    pub pending_failures: usize,
    pub raw_words: usize,
    pub rendered_words: usize,
}

impl StatusReport {
    /// Share of raw words that never reached the model
    pub fn savings(&self) -> f64 {
        if self.raw_words == 0 {
            return 0.0;
        }
        1.0 - self.rendered_words as f64 / self.raw_words as f64
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} turns ({} pruned, {} pending failures), {} words raw, {} words rendered",
            self.turns, self.pruned_turns, self.pending_failures, self.raw_words, self.rendered_words
        )
    }
}

/// Ordered conversation history with summarization and failure pruning.
///
/// `append` takes `&mut self`, so there is a single writer at a time.
pub struct ConversationStore {
    judge: Arc<dyn Judge>,
    options: CompactionOptions,
    order: Vec<TurnId>,
    turns: HashMap<TurnId, Turn>,
    last: Option<TurnId>,
    ledger: Vec<LedgerEntry>,
    raw_words: usize,
    rendered_words: usize,
    pruned_turns: usize,
}

impl ConversationStore {
    pub fn new(judge: Arc<dyn Judge>, options: CompactionOptions) -> Self {
        Self {
            judge,
            options,
            order: Vec::new(),
            turns: HashMap::new(),
            last: None,
            ledger: Vec::new(),
            raw_words: 0,
            rendered_words: 0,
            pruned_turns: 0,
        }
    }

    pub fn options(&self) -> &CompactionOptions {
        &self.options
    }

    /// Store a turn, compacting as configured. Judge errors propagate.
    pub async fn append(&mut self, input: TurnInput) -> Result<TurnId> {
        let TurnInput {
            role,
            content,
            action_calls,
        } = input;

        match role {
            Role::System | Role::User => {
                Ok(self.insert(Turn::new(role, content.clone(), content, Vec::new())))
            }
            Role::Assistant => {
                let rendered = if self.options.summarize && !content.trim().is_empty() {
                    self.judge.summarize(&content).await?
                } else {
                    content.clone()
                };
                Ok(self.insert(Turn::new(role, content, rendered, action_calls)))
            }
            Role::ActionResult => self.append_result(content).await,
        }
    }

    async fn append_result(&mut self, content: String) -> Result<TurnId> {
        let mut turn = Turn::new(Role::ActionResult, content.clone(), content, Vec::new());
        let Some(assistant) = self.unresolved_assistant() else {
            return Ok(self.insert(turn));
        };
        turn.resolves = Some(assistant);
        let result = self.insert(turn);

        let Some(call) = self.turns.get(&assistant).and_then(|t| t.action_call()).cloned() else {
            return Ok(result);
        };
        let content = self.turns.get(&result).map(|t| t.raw_content.as_str()).unwrap_or_default();
        let successful = self.judge.classify_success(&call, content).await?;
        if let Some(turn) = self.turns.get_mut(&assistant) {
            turn.successful = Some(successful);
        }
        debug!("Action {} in turn {} successful: {}", call.name, assistant, successful);

        if !self.options.prune {
            return Ok(result);
        }

        let entry = LedgerEntry { assistant, result };
        if !successful {
            self.ledger.push(entry);
            return Ok(result);
        }
        if self.ledger.is_empty() {
            return Ok(result);
        }

        let transcript = self.transcript(entry);
        if self.judge.classify_goal_achieved(&transcript).await? {
            self.prune_ledger();
        } else {
            debug!("Success in turn {} does not reach the goal yet", assistant);
            self.ledger.push(entry);
        }
        Ok(result)
    }

    /// Nearest assistant turn, if it carries a call that no result answers yet
    fn unresolved_assistant(&self) -> Option<TurnId> {
        for turn in self.order.iter().rev().filter_map(|id| self.turns.get(id)) {
            match turn.role {
                Role::Assistant => return turn.action_call().map(|_| turn.id),
                Role::ActionResult if turn.resolves.is_some() => return None,
                _ => {}
            }
        }
        None
    }

    fn insert(&mut self, turn: Turn) -> TurnId {
        let id = turn.id;
        self.raw_words += word_count(&turn.raw_content);
        self.rendered_words += word_count(&turn.rendered_content);
        self.order.push(id);
        self.turns.insert(id, turn);
        self.last = Some(id);

        if self.options.max_context_words > 0 {
            let words = self.context_words();
            if words > self.options.max_context_words {
                warn!(
                    "Context holds {} words, over the limit of {}",
                    words, self.options.max_context_words
                );
            }
        }
        id
    }

    fn transcript(&self, current: LedgerEntry) -> String {
        let mut parts = Vec::new();
        for (n, entry) in self.ledger.iter().chain(Some(&current)).enumerate() {
            if let Some(turn) = self.turns.get(&entry.assistant) {
                let markup = turn
                    .action_call()
                    .map(|call| call.to_markup())
                    .unwrap_or_default();
                parts.push(format!(
                    "Attempt {}:\n{}\n{}",
                    n + 1,
                    turn.rendered_content,
                    markup
                ));
            }
            if let Some(turn) = self.turns.get(&entry.result) {
                parts.push(format!("Result:\n{}", turn.raw_content));
            }
        }
        parts.join("\n\n")
    }

    /// Drop every ledger turn except the first attempt, then clear the ledger
    fn prune_ledger(&mut self) {
        let ledger = std::mem::take(&mut self.ledger);
        let mut doomed = HashSet::new();
        for (n, entry) in ledger.iter().enumerate() {
            if n == 0 {
                if !self.options.retain_first_result {
                    doomed.insert(entry.result);
                }
                continue;
            }
            doomed.insert(entry.assistant);
            doomed.insert(entry.result);
        }

        let removed = doomed
            .iter()
            .filter(|id| self.turns.remove(id).is_some())
            .count();
        self.order.retain(|id| self.turns.contains_key(id));
        if self.last.is_some_and(|id| !self.turns.contains_key(&id)) {
            self.last = self.order.last().copied();
        }
        self.pruned_turns += removed;
        info!(
            "Goal reached after {} failed attempts, pruned {} turns",
            ledger.len(),
            removed
        );
    }

    /// History as the model sees it
    pub fn render(&self) -> String {
        self.turns()
            .map(Turn::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Turns in history order
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.order.iter().filter_map(|id| self.turns.get(id))
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.get(&id)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.last.and_then(|id| self.turns.get(&id))
    }

    pub fn ledger(&self) -> &[LedgerEntry] {
        &self.ledger
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Words currently rendered to the model
    pub fn context_words(&self) -> usize {
        self.turns().map(|t| word_count(&t.rendered_content)).sum()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            turns: self.order.len(),
            pruned_turns: self.pruned_turns,
            pending_failures: self.ledger.len(),
            raw_words: self.raw_words,
            rendered_words: self.rendered_words,
        }
    }
}
