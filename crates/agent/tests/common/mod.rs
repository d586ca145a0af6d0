//! Shared fixtures for agent tests
#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tagloop_agent::actions::{register_default_actions, UserChannel};
use tagloop_agent::{ActionRegistry, ActionSettings, AgentLoop, LoopSettings, PromptBuilder};
use tagloop_context::{CompactionOptions, ContextError, ConversationStore, Judge};
use tagloop_parser::ActionCall;
use tagloop_provider::{ChatParams, ChatResponse, Provider, ProviderError};

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

/// Provider that answers each chat with the next scripted reply
pub fn scripted_provider(replies: &[&str]) -> MockProvider {
    let mut queue: VecDeque<String> = replies.iter().map(|r| r.to_string()).collect();
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(replies.len())
        .returning(move |_| Ok(ChatResponse::text(queue.pop_front().unwrap_or_default())));
    mock
}

/// User that answers questions from a script and records what it saw
#[derive(Default)]
pub struct ScriptedUser {
    answers: Mutex<VecDeque<String>>,
    pub asked: Mutex<Vec<String>>,
    pub shown: Mutex<Vec<String>>,
}

impl ScriptedUser {
    pub fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            ..Default::default()
        })
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserChannel for ScriptedUser {
    async fn ask(&self, prompt: &str) -> io::Result<String> {
        self.asked.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    async fn show(&self, message: &str) -> io::Result<()> {
        self.shown.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Judge with scripted success verdicts; everything else is a pass-through
pub struct StubJudge {
    successes: Mutex<VecDeque<bool>>,
    goal_achieved: bool,
}

impl StubJudge {
    pub fn new(successes: &[bool], goal_achieved: bool) -> Arc<Self> {
        Arc::new(Self {
            successes: Mutex::new(successes.iter().copied().collect()),
            goal_achieved,
        })
    }

    pub fn passing() -> Arc<Self> {
        Self::new(&[], true)
    }
}

#[async_trait]
impl Judge for StubJudge {
    async fn summarize(&self, text: &str) -> Result<String, ContextError> {
        Ok(text.to_string())
    }

    async fn classify_success(&self, _call: &ActionCall, _result: &str) -> Result<bool, ContextError> {
        Ok(self.successes.lock().unwrap().pop_front().unwrap_or(true))
    }

    async fn classify_goal_achieved(&self, _transcript: &str) -> Result<bool, ContextError> {
        Ok(self.goal_achieved)
    }
}

pub fn no_compaction() -> CompactionOptions {
    CompactionOptions {
        summarize: false,
        prune: false,
        ..Default::default()
    }
}

pub fn settings(max_iterations: u32) -> LoopSettings {
    LoopSettings {
        model: "test-model".to_string(),
        max_iterations,
        ..Default::default()
    }
}

/// Loop over the default action set rooted at `workspace`
pub fn agent(
    provider: MockProvider,
    workspace: &Path,
    user: Arc<ScriptedUser>,
    judge: Arc<dyn Judge>,
    options: CompactionOptions,
    settings: LoopSettings,
) -> AgentLoop<MockProvider> {
    let mut registry = ActionRegistry::new();
    register_default_actions(&mut registry, workspace, &ActionSettings::default(), user);
    let store = ConversationStore::new(judge, options);
    let prompt = PromptBuilder::new(workspace).with_os("linux").with_shell("bash");
    AgentLoop::new(Arc::new(provider), registry, store, prompt, settings)
}
