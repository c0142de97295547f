//! refiner - session-driven document refinement
//!
//! CLI entry point: assembles the store, provider, and state machine from
//! configuration and drives sessions from the terminal.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use refiner::cli::{Cli, Command};
use refiner::config::Config;
use refiner::domain::{SessionView, Stage};
use refiner::engine::{RefinementMachine, readiness_from_config};
use refiner::orchestrator::SessionOrchestrator;
use refiner::prompts::PromptLoader;
use refiner::provider::AnthropicProvider;
use refiner::store::FileStore;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Start { request, owner } => cmd_start(&config, &owner, &request).await,
        Command::Resume { session_id, owner } => cmd_resume(&config, &owner, &session_id).await,
        Command::Status { session_id } => cmd_status(&config, &session_id).await,
        Command::Show { session_id } => cmd_show(&config, &session_id).await,
    }
}

/// Assemble the orchestrator from configuration.
///
/// Collaborators are built here and injected; the library owns no globals.
fn build_orchestrator(config: &Config) -> Result<SessionOrchestrator> {
    config.validate()?;

    let store = FileStore::open(config.storage.resolve_sessions_dir())
        .map_err(|e| eyre::eyre!("failed to open session store: {}", e))?;

    let provider = AnthropicProvider::from_config(&config.provider)
        .map_err(|e| eyre::eyre!("failed to build provider: {}", e))?;

    let prompts_dir = dirs::config_dir().map(|dir| dir.join("refiner").join("prompts"));
    let prompts = PromptLoader::new(prompts_dir);

    let machine = RefinementMachine::new(
        Arc::new(provider),
        readiness_from_config(&config.readiness),
        prompts,
        &config.engine,
    );

    Ok(SessionOrchestrator::new(Arc::new(store), machine))
}

/// Start a new session and drive it interactively
async fn cmd_start(config: &Config, owner: &str, request: &str) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;

    let view = orchestrator
        .start(owner, request, None)
        .await
        .map_err(|e| eyre::eyre!("start failed: {}", e))?;

    println!("Session created: {}", view.session_id);
    drive_session(&orchestrator, owner, view).await
}

/// Resume an existing session interactively
async fn cmd_resume(config: &Config, owner: &str, session_id: &str) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;

    let view = orchestrator
        .get_status(session_id)
        .await
        .map_err(|e| eyre::eyre!("resume failed: {}", e))?;

    drive_session(&orchestrator, owner, view).await
}

/// Answer questions from stdin until the session completes
async fn drive_session(orchestrator: &SessionOrchestrator, owner: &str, mut view: SessionView) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        match view.stage {
            Stage::Complete => {
                let artifact = view.result.as_ref().expect("complete session has a result");
                println!("\n--- Final Output ---");
                println!("{}", serde_json::to_string_pretty(artifact)?);
                return Ok(());
            }
            Stage::ReadyForOutput => {
                println!("\nContext gathered. Press Enter to generate the final output.");
            }
            _ => {
                println!("\nAnswer as key=value, one per line. Blank line submits.");
                for question in &view.pending_questions {
                    println!("  {}", question);
                }
            }
        }

        let mut responses = BTreeMap::new();
        loop {
            print!("> ");
            stdout.flush()?;

            let line = match stdin.lock().lines().next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    // EOF - session stays resumable
                    println!("\nSession paused: {}", view.session_id);
                    return Ok(());
                }
            };

            let line = line.trim();
            if line.is_empty() {
                break;
            }

            match line.split_once('=') {
                Some((key, value)) => {
                    responses.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => {
                    // Bare line on a confirmation prompt counts as consent
                    responses.insert("confirm".to_string(), line.to_string());
                }
            }
        }

        if responses.is_empty() {
            if view.stage == Stage::ReadyForOutput {
                responses.insert("confirm".to_string(), "yes".to_string());
            } else {
                // Nothing answered yet; ask again
                continue;
            }
        }

        view = orchestrator
            .continue_session(owner, &view.session_id, &responses)
            .await
            .map_err(|e| eyre::eyre!("continue failed: {}", e))?;
    }
}

/// Print stage and pending questions
async fn cmd_status(config: &Config, session_id: &str) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;

    let view = orchestrator
        .get_status(session_id)
        .await
        .map_err(|e| eyre::eyre!("status failed: {}", e))?;

    println!("Session: {}", view.session_id);
    println!("Stage:   {}", view.stage);
    if !view.pending_questions.is_empty() {
        println!("Pending questions:");
        for question in &view.pending_questions {
            println!("  - {}", question);
        }
    }
    if view.result.is_some() {
        println!("Result:  available (use `refiner show` to print it)");
    }
    Ok(())
}

/// Print the full session record as JSON
async fn cmd_show(config: &Config, session_id: &str) -> Result<()> {
    use refiner::store::SessionStore;

    let store = FileStore::open(config.storage.resolve_sessions_dir())
        .map_err(|e| eyre::eyre!("failed to open session store: {}", e))?;

    let session = store
        .get(session_id)
        .await
        .map_err(|e| eyre::eyre!("failed to read session: {}", e))?
        .ok_or_else(|| eyre::eyre!("session not found: {}", session_id))?;

    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}
