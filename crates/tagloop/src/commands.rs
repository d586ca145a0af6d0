//! tagloop command implementations

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tagloop_agent::actions::{register_default_actions, ConsoleUser, UserChannel};
use tagloop_agent::{ActionRegistry, ActionSettings, AgentLoop, LoopSettings, Outcome, PromptBuilder};
use tagloop_config::{CompactionConfig, Config};
use tagloop_context::{CompactionOptions, ConversationStore, LlmJudge};
use tagloop_provider::OpenRouterProvider;

use crate::RunArgs;

/// Exit status after a second interrupt, as for SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Initialize config and workspace
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing tagloop...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = tagloop_config::init()
        .await
        .context("failed to initialize configuration")?;

    println!("Config:    {}", tagloop_config::config_path().display());
    println!("Workspace: {}", config.workspace_path().display());
    println!("\nNext steps:");
    println!("  1. Add your API key to ~/.tagloop/config.json (or set TAGLOOP_API_KEY)");
    println!("     Get one at: https://openrouter.ai/keys");
    println!("  2. Run a task: tagloop run -m \"List the files in the workspace\"");

    Ok(())
}

fn compaction_options(config: &CompactionConfig) -> CompactionOptions {
    CompactionOptions {
        summarize: config.summarize,
        prune: config.prune,
        retain_first_result: config.retain_first_result,
        max_context_words: config.max_context_words,
    }
}

/// Fold command-line overrides into the loaded config
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(workspace) = &args.workspace {
        config.agent.workspace = workspace.display().to_string();
    }
    if args.no_summarize {
        config.compaction.summarize = false;
    }
    if args.no_prune {
        config.compaction.prune = false;
    }
    if args.auto_approve {
        config.actions.auto_approve = true;
    }
}

/// Run one task to completion
pub async fn run_command(args: RunArgs) -> Result<()> {
    let mut config = Config::load().await.context("failed to load configuration")?;
    apply_overrides(&mut config, &args);

    let api_key = config.api_key().context(
        "No API key configured. Set one in ~/.tagloop/config.json or export TAGLOOP_API_KEY",
    )?;
    let workspace = config.workspace_path();
    tokio::fs::create_dir_all(&workspace)
        .await
        .with_context(|| format!("failed to create workspace {}", workspace.display()))?;

    let user: Arc<dyn UserChannel> = Arc::new(ConsoleUser::new());
    let task = match args.message {
        Some(task) => task,
        None => user
            .ask("◆ What should I work on?")
            .await
            .context("failed to read the task")?,
    };
    if task.trim().is_empty() {
        anyhow::bail!("No task given");
    }

    let model = config.model();
    let provider = Arc::new(OpenRouterProvider::new(
        api_key,
        config.api_base(),
        Some(model.clone()),
    ));
    let judge = Arc::new(LlmJudge::new(provider.clone(), model));

    let mut registry = ActionRegistry::new();
    register_default_actions(
        &mut registry,
        &workspace,
        &ActionSettings::from(&config.actions),
        user,
    );
    let store = ConversationStore::new(judge, compaction_options(&config.compaction));
    let prompt = PromptBuilder::new(&workspace);

    let mut agent = AgentLoop::new(
        provider,
        registry,
        store,
        prompt,
        LoopSettings::from(&config.agent),
    );

    let cancel = agent.cancellation_token();
    tokio::spawn(async move {
        if watch_interrupts(cancel, tokio::signal::ctrl_c).await {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    info!("◆ Workspace: {}", workspace.display());
    let report = agent.run(task.trim()).await.context("agent run failed")?;

    match report.outcome {
        Outcome::Completed { result } => println!("\n◆ Completed\n{}", result),
        Outcome::Interrupted => println!("\n◆ Interrupted"),
    }
    println!(
        "◆ {} iterations; context: {} ({:.0}% saved)",
        report.iterations,
        report.status,
        report.status.savings() * 100.0
    );

    Ok(())
}

/// Show configuration status
pub async fn status_command() -> Result<()> {
    let config_path = tagloop_config::config_path();
    let config = Config::load().await.context("failed to load configuration")?;
    let workspace = config.workspace_path();

    println!("◆ tagloop Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() { "[OK]" } else { "[Missing]" }
    );
    println!(
        "Workspace: {} {}",
        workspace.display(),
        if workspace.exists() { "[OK]" } else { "[Missing]" }
    );
    println!("Model:     {}", config.model());
    println!(
        "API Key:   {}",
        if config.has_api_key() { "[Set]" } else { "[Missing]" }
    );
    println!(
        "Compaction: summarize={} prune={}",
        config.compaction.summarize, config.compaction.prune
    );

    Ok(())
}

/// Cancel the run on the first interrupt. Returns true when a second
/// interrupt arrives, which may land while a prompt is blocked on stdin.
async fn watch_interrupts<F, Fut>(cancel: CancellationToken, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    warn!("◆ Interrupt received, stopping after the current step (press Ctrl-C again to quit)");
    cancel.cancel();

    if interrupt().await.is_err() {
        return false;
    }
    warn!("◆ Second interrupt, exiting");
    true
}
