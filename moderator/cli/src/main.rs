//! duologue - Watch two local models hold a discussion
//!
//! Connects to an Ollama-compatible inference server, picks two models, and
//! lets them alternate on a topic while the answers are typed out in the
//! terminal. Thought passages from reasoning models are shown separately and
//! never passed to the other model.
//!
//! # Usage
//!
//! ```bash
//! # First two installed models, default topic
//! duologue
//!
//! # Explicit participants and style
//! duologue --model1 llama3.2 --model2 qwen3 --style debate --rounds 6 \
//!     --topic "The ethics of genetic engineering"
//!
//! # Random topic, no typewriter effect
//! duologue --random-topic --no-animation
//!
//! # What can I use?
//! duologue --list-models
//!
//! # Verbose logging (to stderr)
//! RUST_LOG=debug duologue
//! ```
//!
//! # Signals
//!
//! - `SIGINT` (Ctrl-C): stop after the current checkpoint; the transcript
//!   printed so far stays on screen

mod renderer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use moderator_core::prompt::is_known_style;
use moderator_core::topics::{random_topic, DEFAULT_TOPIC};
use moderator_core::{
    load_config, load_config_from_path, ConfigOverrides, DiscussionConfig, DiscussionState,
    InferenceBackend, ModelDescriptor, Moderator, OllamaBackend,
};
use tracing::{info, warn};

use renderer::TerminalRenderer;

/// duologue - two local models, one topic
#[derive(Parser, Debug)]
#[command(name = "duologue")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Discussion topic
    #[arg(short, long, conflicts_with = "random_topic")]
    topic: Option<String>,

    /// Pick a topic from the built-in list
    #[arg(long)]
    random_topic: bool,

    /// Model that opens the discussion (default: first listed model)
    #[arg(long, value_name = "MODEL")]
    model1: Option<String>,

    /// Model that answers first (default: second listed model)
    #[arg(long, value_name = "MODEL")]
    model2: Option<String>,

    /// Conversation style: formal, casual, debate, humorous, philosophical
    #[arg(short, long)]
    style: Option<String>,

    /// Number of turns
    #[arg(short, long)]
    rounds: Option<u32>,

    /// Print answers at once instead of typing them out
    #[arg(long)]
    no_animation: bool,

    /// Configuration file path
    #[arg(short = 'c', long, env = "DUOLOGUE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Inference server host
    #[arg(long)]
    host: Option<String>,

    /// Inference server port
    #[arg(long)]
    port: Option<u16>,

    /// List the models the server offers and exit
    #[arg(long)]
    list_models: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "DUOLOGUE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so stdout carries only the transcript.
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("duologue={level},moderator_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Fill in missing participants from the server's model list
fn resolve_models(
    model1: Option<String>,
    model2: Option<String>,
    available: &[ModelDescriptor],
) -> (String, String) {
    let mut listed = available.iter().map(|m| m.id.clone());
    let first = listed.next().unwrap_or_default();
    let second = listed.next().unwrap_or_default();
    (model1.unwrap_or(first), model2.unwrap_or(second))
}

fn resolve_topic(topic: Option<String>, random: bool) -> String {
    match topic {
        Some(topic) => topic,
        None if random => random_topic().to_string(),
        None => DEFAULT_TOPIC.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mut settings = match &args.config {
        Some(path) => load_config_from_path(Some(path.clone())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new().with_instant_reveal(args.no_animation);
    if let Some(host) = &args.host {
        overrides = overrides.with_host(host.clone());
    }
    if let Some(port) = args.port {
        overrides = overrides.with_port(port);
    }
    overrides.apply(&mut settings);
    info!(source = %settings.source(), "Configuration loaded");

    let backend = OllamaBackend::from_settings(&settings.server);
    if !backend.check_connection().await {
        anyhow::bail!(
            "Cannot reach the inference server at {}. Is Ollama running?",
            backend.base_url()
        );
    }

    let models = backend.list_models().await;
    if args.list_models {
        for model in &models {
            println!("{}", model.id);
        }
        return Ok(());
    }
    if models.is_empty() {
        warn!("The inference server reported no models");
    }

    let (model1, model2) = resolve_models(args.model1, args.model2, &models);
    let topic = resolve_topic(args.topic, args.random_topic);
    let style = args.style.unwrap_or_else(|| settings.default_style.clone());
    if !is_known_style(&style) {
        warn!(style = %style, "Unknown conversation style, using the default template");
    }
    let rounds = args.rounds.unwrap_or(settings.default_rounds);

    let config = DiscussionConfig::new(topic, model1, model2, style, rounds)?;

    println!("Topic: {}", config.topic());
    println!(
        "{} vs {} ({} style, {} rounds)",
        config.model1(),
        config.model2(),
        config.conversation_style(),
        config.rounds()
    );

    let mut moderator = Moderator::new(backend, config, settings.reveal);
    moderator.subscribe(TerminalRenderer::stdout());

    let stop = moderator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            stop.cancel();
        }
    });

    let outcome = moderator.run().await;
    match outcome.state {
        DiscussionState::Completed => {
            println!("\nDiscussion complete after {} turns.", outcome.turns_completed);
        }
        DiscussionState::Cancelled => {
            println!("\nDiscussion stopped after {} turns.", outcome.turns_completed);
        }
        DiscussionState::Failed => {
            if let Some(err) = outcome.error {
                return Err(err).context("Discussion failed");
            }
            anyhow::bail!("Discussion failed");
        }
        DiscussionState::Idle | DiscussionState::Running => {}
    }

    Ok(())
}
