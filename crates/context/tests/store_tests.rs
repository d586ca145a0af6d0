//! Compaction behavior of the conversation store against a scripted judge

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tagloop_context::{
    CompactionOptions, ContextError, ConversationStore, Judge, Result, Role, TurnId, TurnInput,
};
use tagloop_parser::ActionCall;

#[derive(Default)]
struct ScriptedJudge {
    success: Mutex<VecDeque<Result<bool>>>,
    goal: Mutex<VecDeque<Result<bool>>>,
    transcripts: Mutex<Vec<String>>,
    judgments: Mutex<usize>,
}

impl ScriptedJudge {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn success(&self, verdict: bool) -> &Self {
        self.success.lock().unwrap().push_back(Ok(verdict));
        self
    }

    fn success_error(&self) -> &Self {
        self.success
            .lock()
            .unwrap()
            .push_back(Err(ContextError::Judgment("model offline".to_string())));
        self
    }

    fn goal(&self, verdict: bool) -> &Self {
        self.goal.lock().unwrap().push_back(Ok(verdict));
        self
    }

    fn goal_error(&self) -> &Self {
        self.goal
            .lock()
            .unwrap()
            .push_back(Err(ContextError::Judgment("model offline".to_string())));
        self
    }

    fn judgments(&self) -> usize {
        *self.judgments.lock().unwrap()
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn summarize(&self, text: &str) -> Result<String> {
        Ok(format!("(summary of {} chars)", text.len()))
    }

    async fn classify_success(&self, _call: &ActionCall, _result: &str) -> Result<bool> {
        *self.judgments.lock().unwrap() += 1;
        self.success
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected success judgment")
    }

    async fn classify_goal_achieved(&self, transcript: &str) -> Result<bool> {
        *self.judgments.lock().unwrap() += 1;
        self.transcripts.lock().unwrap().push(transcript.to_string());
        self.goal
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected goal judgment")
    }
}

fn no_summaries() -> CompactionOptions {
    CompactionOptions {
        summarize: false,
        ..Default::default()
    }
}

fn shell(command: &str) -> ActionCall {
    ActionCall::new("shell", [("command", command)].into_iter().collect())
}

async fn attempt(store: &mut ConversationStore, command: &str, output: &str) -> (TurnId, TurnId) {
    let assistant = store
        .append(TurnInput::assistant(
            format!("Running {}", command),
            vec![shell(command)],
        ))
        .await
        .unwrap();
    let result = store.append(TurnInput::action_result(output)).await.unwrap();
    (assistant, result)
}

fn ids(store: &ConversationStore) -> Vec<TurnId> {
    store.turns().map(|t| t.id).collect()
}

// ========== Pruning Tests ==========

#[tokio::test]
async fn test_resolved_failure_chain_is_pruned() {
    let judge = ScriptedJudge::new();
    judge.success(false).success(false).success(true).goal(true);
    let mut store = ConversationStore::new(judge.clone(), no_summaries());

    let (a1, f1) = attempt(&mut store, "cargo tset", "ERROR: no such command").await;
    let (_a2, _f2) = attempt(&mut store, "cargo tets", "ERROR: no such command").await;
    assert_eq!(store.ledger().len(), 2);
    let (a3, s3) = attempt(&mut store, "cargo test", "test result: ok").await;

    assert_eq!(ids(&store), vec![a1, f1, a3, s3]);
    assert!(store.ledger().is_empty());
    assert_eq!(store.status().pruned_turns, 2);
    assert_eq!(store.get(a1).unwrap().successful, Some(false));
    assert_eq!(store.get(a3).unwrap().successful, Some(true));
    assert_eq!(store.get(s3).unwrap().resolves, Some(a3));

    let first = store.render();
    assert_eq!(first, store.render());
    assert!(!first.contains("cargo tets"));
    assert!(first.contains("cargo tset"));
}

#[tokio::test]
async fn test_pruning_without_first_result() {
    let judge = ScriptedJudge::new();
    judge.success(false).success(false).success(true).goal(true);
    let mut store = ConversationStore::new(
        judge.clone(),
        CompactionOptions {
            retain_first_result: false,
            ..no_summaries()
        },
    );

    let (a1, _f1) = attempt(&mut store, "a", "ERROR").await;
    attempt(&mut store, "b", "ERROR").await;
    let (a3, s3) = attempt(&mut store, "c", "ok").await;

    assert_eq!(ids(&store), vec![a1, a3, s3]);
    assert_eq!(store.status().pruned_turns, 3);
}

#[tokio::test]
async fn test_no_premature_pruning() {
    let judge = ScriptedJudge::new();
    judge
        .success(false)
        .success(true)
        .goal(false)
        .success(false)
        .success(true)
        .goal(true);
    let mut store = ConversationStore::new(judge.clone(), no_summaries());

    let (a1, f1) = attempt(&mut store, "step 1", "ERROR").await;
    let (a2, s2) = attempt(&mut store, "step 2", "partial").await;

    assert_eq!(store.ledger().len(), 2);
    assert_eq!(store.ledger()[1].assistant, a2);
    assert_eq!(store.ledger()[1].result, s2);
    assert_eq!(store.len(), 4);

    attempt(&mut store, "step 3", "ERROR").await;
    assert_eq!(store.ledger().len(), 3);
    assert_eq!(store.len(), 6);

    let (a4, s4) = attempt(&mut store, "step 4", "done").await;
    assert_eq!(ids(&store), vec![a1, f1, a4, s4]);
    assert!(store.ledger().is_empty());
}

#[tokio::test]
async fn test_success_with_empty_ledger_asks_nothing_more() {
    let judge = ScriptedJudge::new();
    judge.success(true);
    let mut store = ConversationStore::new(judge.clone(), no_summaries());

    attempt(&mut store, "ls", "src").await;

    assert_eq!(judge.judgments(), 1);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_goal_transcript_lists_every_attempt() {
    let judge = ScriptedJudge::new();
    judge.success(false).success(true).goal(true);
    let mut store = ConversationStore::new(judge.clone(), no_summaries());

    attempt(&mut store, "make biuld", "ERROR: no rule").await;
    attempt(&mut store, "make build", "built").await;

    let transcripts = judge.transcripts.lock().unwrap();
    assert_eq!(transcripts.len(), 1);
    let transcript = &transcripts[0];
    assert!(transcript.starts_with("Attempt 1:\nRunning make biuld\n<shell>"));
    assert!(transcript.contains("Result:\nERROR: no rule"));
    assert!(transcript.contains("Attempt 2:\nRunning make build"));
    assert!(transcript.ends_with("Result:\nbuilt"));
}

#[tokio::test]
async fn test_user_turns_between_attempts_survive_pruning() {
    let judge = ScriptedJudge::new();
    judge.success(false).success(false).success(true).goal(true);
    let mut store = ConversationStore::new(judge.clone(), no_summaries());

    let task = store.append(TurnInput::user("build it")).await.unwrap();
    attempt(&mut store, "a", "ERROR").await;
    attempt(&mut store, "b", "ERROR").await;
    let note = store.append(TurnInput::user("try harder")).await.unwrap();
    attempt(&mut store, "c", "ok").await;

    let remaining = ids(&store);
    assert!(remaining.contains(&task));
    assert!(remaining.contains(&note));
    assert_eq!(remaining.len(), 6);
}

// ========== Failure Tests ==========

#[tokio::test]
async fn test_success_judgment_failure_propagates() {
    let judge = ScriptedJudge::new();
    judge.success(false).success_error();
    let mut store = ConversationStore::new(judge.clone(), no_summaries());

    attempt(&mut store, "a", "ERROR").await;
    let assistant = store
        .append(TurnInput::assistant("", vec![shell("b")]))
        .await
        .unwrap();
    let result = store.append(TurnInput::action_result("output")).await;

    assert!(matches!(result, Err(ContextError::Judgment(_))));
    assert_eq!(store.ledger().len(), 1);
    assert_eq!(store.get(assistant).unwrap().successful, None);
    let stored = store.last().unwrap();
    assert_eq!(stored.role, Role::ActionResult);
    assert_eq!(stored.resolves, Some(assistant));
}

#[tokio::test]
async fn test_goal_judgment_failure_leaves_ledger() {
    let judge = ScriptedJudge::new();
    judge.success(false).success(true).goal_error();
    let mut store = ConversationStore::new(judge.clone(), no_summaries());

    attempt(&mut store, "a", "ERROR").await;
    store
        .append(TurnInput::assistant("", vec![shell("b")]))
        .await
        .unwrap();
    let result = store.append(TurnInput::action_result("ok")).await;

    assert!(result.is_err());
    assert_eq!(store.ledger().len(), 1);
    assert_eq!(store.len(), 4);
}

// ========== Option Tests ==========

#[tokio::test]
async fn test_prune_off_still_records_success() {
    let judge = ScriptedJudge::new();
    judge.success(false).success(false).success(true);
    let mut store = ConversationStore::new(
        judge.clone(),
        CompactionOptions {
            summarize: false,
            prune: false,
            ..Default::default()
        },
    );

    let (a1, r1) = attempt(&mut store, "a", "ERROR").await;
    attempt(&mut store, "b", "ERROR").await;
    let (a3, _) = attempt(&mut store, "c", "ok").await;

    // Only success judgments; no goal judgment, no ledger, nothing pruned
    assert_eq!(judge.judgments(), 3);
    assert!(judge.transcripts.lock().unwrap().is_empty());
    assert!(store.ledger().is_empty());
    assert_eq!(store.len(), 6);
    assert_eq!(store.status().pruned_turns, 0);
    assert_eq!(store.get(r1).unwrap().resolves, Some(a1));
    assert_eq!(store.get(a1).unwrap().successful, Some(false));
    assert_eq!(store.get(a3).unwrap().successful, Some(true));
}

#[tokio::test]
async fn test_summarized_assistant_turns() {
    let judge = ScriptedJudge::new();
    judge.success(true);
    let mut store = ConversationStore::new(judge.clone(), CompactionOptions::default());

    let (assistant, _) = attempt(&mut store, "ls", "src").await;
    let silent = store
        .append(TurnInput::assistant("   ", vec![]))
        .await
        .unwrap();

    let turn = store.get(assistant).unwrap();
    assert_eq!(turn.raw_content, "Running ls");
    assert_eq!(turn.rendered_content, "(summary of 10 chars)");
    assert_eq!(store.get(silent).unwrap().rendered_content, "   ");
    assert!(store.render().contains("(summary of 10 chars)\n<shell>"));

    let status = store.status();
    assert_eq!(status.raw_words, 3);
    assert_eq!(status.rendered_words, 5);
}

// ========== Render Tests ==========

#[tokio::test]
async fn test_render_format() {
    let judge = ScriptedJudge::new();
    judge.success(true);
    let mut store = ConversationStore::new(judge.clone(), no_summaries());

    store.append(TurnInput::system("rules")).await.unwrap();
    store.append(TurnInput::user("list files")).await.unwrap();
    attempt(&mut store, "ls", "Cargo.toml").await;

    assert_eq!(
        store.render(),
        "System:\nrules\n\n\
         User:\nlist files\n\n\
         Assistant:\nRunning ls\n<shell>\n<command>ls</command>\n</shell>\n\n\
         Action Result:\nCargo.toml"
    );
}

#[tokio::test]
async fn test_empty_store() {
    let store = ConversationStore::new(ScriptedJudge::new(), CompactionOptions::default());
    assert!(store.is_empty());
    assert_eq!(store.render(), "");
    assert!(store.last().is_none());
    assert_eq!(store.status().turns, 0);
}
