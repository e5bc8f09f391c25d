//! TouchPilot CLI: drive a device toward a natural-language goal.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use touchpilot::agent_engine::engine::{AgentEngine, SessionSettings};
use touchpilot::agent_engine::event_bus::AgentEvent;
use touchpilot::agent_engine::export::export_conversation;
use touchpilot::agent_engine::handle::AgentHandle;
use touchpilot::agent_engine::history::SessionHistory;
use touchpilot::config::{self, ActionProfile, AppConfig, BackendKind};
use touchpilot::executor::registry::ActionRegistry;
use touchpilot::llm::registry::ProviderRegistry;
use touchpilot::llm::tools::system_prompt;

#[derive(Parser)]
#[command(
    name = "touchpilot",
    about = "Vision-driven device automation agent",
    version
)]
struct Cli {
    /// The task to perform, in natural language
    task: String,

    /// Path to config.toml (default: next to the executable, then the working directory)
    #[arg(short, long, env = "TOUCHPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Device backend: desktop, window or adb (desktop and window need the `desktop` feature)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Reasoning provider to use, by its [llm.providers.<id>] name
    #[arg(short, long)]
    provider: Option<String>,

    /// Override the action profile offered to the model
    #[arg(long, value_parser = parse_profile)]
    profile: Option<ActionProfile>,

    /// Maximum number of stored conversation turns
    #[arg(long)]
    max_turns: Option<usize>,

    /// Export the conversation into this directory when the task ends
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Do not write the per-session JSONL audit log
    #[arg(long)]
    no_history: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_profile(raw: &str) -> Result<ActionProfile, String> {
    match raw.to_ascii_lowercase().as_str() {
        "cursor" => Ok(ActionProfile::Cursor),
        "touch" => Ok(ActionProfile::Touch),
        "full" => Ok(ActionProfile::Full),
        other => Err(format!("unknown profile '{other}' (expected cursor, touch or full)")),
    }
}

fn load(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => config::load_config().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using built-in defaults");
            AppConfig::default()
        }),
    };
    if let Some(backend) = cli.backend {
        cfg.device.backend = backend;
    }
    if cli.profile.is_some() {
        cfg.device.profile = cli.profile;
    }
    if let Some(max_turns) = cli.max_turns {
        cfg.session.max_turns = max_turns;
    }
    if let Some(dir) = &cli.export {
        cfg.session.export_dir = Some(dir.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Narrative { text } => println!("🤖 {text}"),
        AgentEvent::ToolExecuted { name, input, result } => {
            println!("🔧 {name} {input}");
            println!("   {result}");
        }
        AgentEvent::Log { message } => println!("ℹ️  {message}"),
        AgentEvent::Screenshot { image, anchor } => {
            tracing::debug!(bytes = image.len(), %anchor, "screenshot")
        }
        AgentEvent::PhaseChanged { phase } => tracing::debug!(?phase, "phase"),
        AgentEvent::Completed { .. } => {}
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let cfg = load(&cli)?;

    let mut registry = ProviderRegistry::from_config(&cfg)?;
    if let Some(provider) = &cli.provider {
        registry.set_active(provider.clone())?;
    }
    let (client, call_config) = registry.active()?;

    let backend = touchpilot::backend::connect(&cfg.device)?;
    let profile = cfg.device.effective_profile();
    let actions = ActionRegistry::new(backend.device.clone(), profile)?;
    let prompt = system_prompt(profile, &backend.device_name);

    let mut engine = AgentEngine::new(
        client,
        call_config,
        backend.capture.clone(),
        actions,
        prompt,
        SessionSettings::from_config(&cfg.session),
    );
    if !cli.no_history {
        match SessionHistory::in_dir_or_default(cfg.session.history_dir.as_deref()) {
            Ok(history) => {
                tracing::info!(path = %history.path().display(), "session log");
                engine = engine.with_history(history);
            }
            Err(e) => tracing::warn!(error = %e, "session log disabled"),
        }
    }

    let mut events = engine.events().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AgentEvent::Completed { .. }) | Err(RecvError::Closed) => break,
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "event printer lagged"),
            }
        }
    });

    let control = engine.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("\nCancelling after the current step… (press Ctrl-C again to quit now)");
        control.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborted.");
            std::process::exit(130);
        }
    });

    let handle = AgentHandle::start(engine, cli.task.clone());
    let completion = handle.wait().await;
    let _ = printer.await;

    if completion.success {
        println!("✅ {}", completion.reason);
    } else {
        println!("❌ {:?}: {}", completion.outcome, completion.reason);
        if let Some(detail) = &completion.detail {
            println!("   {detail}");
        }
    }

    if let Some(dir) = &cfg.session.export_dir {
        if completion.conversation.is_empty() {
            tracing::info!("nothing to export");
        } else {
            std::fs::create_dir_all(dir)?;
            let folder = export_conversation(&completion.conversation, &cli.task, dir)?;
            println!("📁 Conversation exported to {}", folder.display());
        }
    }

    Ok(completion.success)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    touchpilot::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
