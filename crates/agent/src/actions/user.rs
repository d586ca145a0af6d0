//! Talking to the human: questions and completion review

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::info;

use super::{Action, ActionOutput};
use crate::BoxError;

/// Where questions go and answers come from
#[async_trait]
pub trait UserChannel: Send + Sync {
    /// Show `prompt` and wait for one line of input
    async fn ask(&self, prompt: &str) -> io::Result<String>;

    async fn show(&self, message: &str) -> io::Result<()>;
}

/// Terminal user on stdin/stdout
pub struct ConsoleUser {
    input: Mutex<BufReader<Stdin>>,
}

impl ConsoleUser {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for ConsoleUser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserChannel for ConsoleUser {
    async fn ask(&self, prompt: &str) -> io::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("{}\n>> ", prompt).as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        if self.input.lock().await.read_line(&mut line).await? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn show(&self, message: &str) -> io::Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("{}\n", message).as_bytes()).await?;
        stdout.flush().await
    }
}

/// True for `y` / `yes`, any case
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask the user a clarifying question
pub struct AskUserAction {
    user: Arc<dyn UserChannel>,
}

impl AskUserAction {
    pub fn new(user: Arc<dyn UserChannel>) -> Self {
        Self { user }
    }
}

#[derive(Deserialize)]
struct AskArgs {
    question: String,
}

#[async_trait]
impl Action for AskUserAction {
    fn name(&self) -> &str {
        "ask_user"
    }
    fn description(&self) -> &str {
        "Ask the user a question when the task is ambiguous or you need details \
         to proceed. Ask clear, specific questions and use this sparingly."
    }
    fn required(&self) -> &[&str] {
        &["question"]
    }
    fn usage(&self) -> String {
        "<ask_user>\n<question>Which database should the service use?</question>\n</ask_user>"
            .to_string()
    }
    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: AskArgs = serde_json::from_value(args)?;
        let answer = self
            .user
            .ask(&format!("◆ Agent asks: {}", args.question.trim()))
            .await?;
        if answer.trim().is_empty() {
            return Ok(ActionOutput::text("The user gave no answer."));
        }
        Ok(ActionOutput::text(answer.trim()))
    }
}

/// Present the result and let the user accept it or send feedback
pub struct AttemptCompletionAction {
    user: Arc<dyn UserChannel>,
}

impl AttemptCompletionAction {
    pub fn new(user: Arc<dyn UserChannel>) -> Self {
        Self { user }
    }
}

#[derive(Deserialize)]
struct CompletionArgs {
    result: String,
}

#[async_trait]
impl Action for AttemptCompletionAction {
    fn name(&self) -> &str {
        "attempt_completion"
    }
    fn description(&self) -> &str {
        "Present the final result once every previous action has been confirmed \
         successful. State the result as final, without questions or offers of \
         further help. The user may reply with feedback, in which case keep working."
    }
    fn required(&self) -> &[&str] {
        &["result"]
    }
    fn usage(&self) -> String {
        "<attempt_completion>\n<result>\nAdded the --verbose flag; `cargo test` passes.\n</result>\n</attempt_completion>"
            .to_string()
    }
    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: CompletionArgs = serde_json::from_value(args)?;
        let result = args.result.trim().to_string();

        self.user.show(&format!("◆ Task result:\n{}", result)).await?;
        let answer = self.user.ask("Are you satisfied? (y/n)").await?;
        if is_yes(&answer) {
            info!("◆ Result accepted");
            return Ok(ActionOutput::terminal(result));
        }

        let feedback = self.user.ask("Feedback:").await?;
        info!("◆ Result rejected");
        Ok(ActionOutput::text(format!(
            "{}\n\nThe user is not satisfied. Feedback: {}",
            result,
            feedback.trim()
        )))
    }
}
