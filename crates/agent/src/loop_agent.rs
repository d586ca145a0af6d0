//! Agent loop - drives the model through the tag language

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tagloop_config::AgentConfig;
use tagloop_context::{ConversationStore, StatusReport, TurnInput};
use tagloop_parser::{parse, ActionCall, Segment};
use tagloop_provider::{ChatParams, Message, Provider};

use crate::actions::{ActionOutput, ActionRegistry};
use crate::prompt::PromptBuilder;
use crate::{AgentError, Result};

const RESULT_HEADER: &str = "Result of action invocation:\n\n";
const NO_ACTION_REMINDER: &str = "No action was requested. Every reply must use an action. \
     Continue the task with the next action, or use attempt_completion if the task is done.";

/// Model sampling and iteration limits
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_iterations: u32,
    /// When false, calls cut off before their closing tag are reported
    /// back instead of run. Partial `write_to_file` bodies are the case
    /// this guards against.
    pub execute_truncated: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for LoopSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_iterations: config.max_iterations,
            execute_truncated: config.execute_truncated_calls,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The user accepted the result
    Completed { result: String },
    /// The cancellation token fired
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    /// Model calls made during the run
    pub iterations: u32,
    pub status: StatusReport,
}

/// Result of dispatching one reply's calls
struct Dispatch {
    text: String,
    completion: Option<String>,
}

pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    registry: ActionRegistry,
    store: ConversationStore,
    prompt: PromptBuilder,
    settings: LoopSettings,
    cancel: CancellationToken,
    started: bool,
}

impl<P: Provider> AgentLoop<P> {
    pub fn new(
        provider: Arc<P>,
        registry: ActionRegistry,
        store: ConversationStore,
        prompt: PromptBuilder,
        settings: LoopSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            store,
            prompt,
            settings,
            cancel: CancellationToken::new(),
            started: false,
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run one task to completion, interruption or error.
    ///
    /// Teardown runs on every exit path.
    pub async fn run(&mut self, task: &str) -> Result<RunReport> {
        info!("◆ Starting task: {}", preview(task, 80));
        let mut iterations = 0;
        let result = self.drive(task, &mut iterations).await;
        let status = self.teardown().await;

        let outcome = result?;
        match &outcome {
            Outcome::Completed { .. } => info!("◆ Task completed after {} iterations", iterations),
            Outcome::Interrupted => info!("◆ Task interrupted after {} iterations", iterations),
        }
        Ok(RunReport {
            outcome,
            iterations,
            status,
        })
    }

    async fn drive(&mut self, task: &str, iterations: &mut u32) -> Result<Outcome> {
        if !self.started {
            let system = self.prompt.build(&self.registry);
            self.store.append(TurnInput::system(system)).await?;
            self.started = true;
        }
        self.store.append(TurnInput::user(task)).await?;

        let vocabulary = self.registry.vocabulary();
        loop {
            if self.cancel.is_cancelled() {
                return Ok(Outcome::Interrupted);
            }
            if *iterations >= self.settings.max_iterations {
                return Err(AgentError::MaxIterations(self.settings.max_iterations));
            }
            *iterations += 1;
            debug!(
                "◆ Iteration {} ({} words of context)",
                iterations,
                self.store.context_words()
            );

            let params = ChatParams {
                model: self.settings.model.clone(),
                messages: vec![Message::user(self.store.render())],
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            };
            let response = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(Outcome::Interrupted),
                response = self.provider.chat(params) => response?,
            };
            if response.is_truncated() {
                warn!("◆ Reply cut off at the token limit");
            }

            let mut prose = String::new();
            let mut calls = Vec::new();
            for segment in parse(&response.content, &vocabulary) {
                match segment {
                    Segment::Text { content, .. } => prose.push_str(&content),
                    Segment::Action { call, .. } => calls.push(call),
                }
            }
            self.store
                .append(TurnInput::assistant(prose.trim(), calls.clone()))
                .await?;

            let dispatch = self.dispatch(&calls).await;
            self.store
                .append(TurnInput::action_result(dispatch.text))
                .await?;

            if let Some(result) = dispatch.completion {
                return Ok(Outcome::Completed { result });
            }
        }
    }

    async fn dispatch(&self, calls: &[ActionCall]) -> Dispatch {
        if calls.is_empty() {
            debug!("◆ Reply requested no action");
            return Dispatch {
                text: NO_ACTION_REMINDER.to_string(),
                completion: None,
            };
        }

        let mut parts = Vec::new();
        let mut completion = None;
        for call in calls {
            let mut note = String::new();
            if !call.complete {
                if !self.settings.execute_truncated {
                    debug!("◆ Skipping truncated call to {}", call.name);
                    parts.push(format!(
                        "[{}] Error: the call was cut off before </{}> and was not executed. \
                         Send it again in full.",
                        call.name, call.name
                    ));
                    continue;
                }
                debug!("◆ Running truncated call to {}", call.name);
                note = format!(
                    "[{}] Note: the call was cut off before </{}> and ran with the \
                     arguments received.\n",
                    call.name, call.name
                );
            }

            match self.registry.execute(call).await {
                Ok(ActionOutput { content, terminal }) => {
                    parts.push(format!("{}[{}] Result:\n{}", note, call.name, content));
                    if terminal {
                        completion = Some(content);
                        break;
                    }
                }
                Err(e) => {
                    debug!("◆ {} failed: {}", call.name, e);
                    parts.push(format!("{}[{}] Error: {}", note, call.name, e));
                }
            }
        }

        Dispatch {
            text: format!("{}{}", RESULT_HEADER, parts.join("\n\n")),
            completion,
        }
    }

    async fn teardown(&mut self) -> StatusReport {
        self.registry.shutdown().await;
        let status = self.store.status();
        info!("◆ Context: {} ({:.0}% saved)", status, status.savings() * 100.0);
        status
    }
}

fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
