//! CLI binary for radio-agent.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait};
use tracing_subscriber::EnvFilter;

use radio_agent::agent::{install_shutdown_handler, AgentLoop};
use radio_agent::audio::device::CpalAudioIo;
use radio_agent::config::AgentConfig;
use radio_agent::llm::client::{HttpLlmClient, LlmClient};
use radio_agent::llm::orchestrator::Orchestrator;
use radio_agent::llm::summarizer::Summarizer;
use radio_agent::memory::ConversationMemory;
use radio_agent::session::SessionRecorder;
use radio_agent::stt::{ScriptedSttEngine, SttEngine};
use radio_agent::tools::{InternalSearchTool, LogMemoTool, PingTool, ToolExecutor, ToolRegistry};
use radio_agent::tts::{ScriptedTtsEngine, TtsEngine};

/// Half-duplex, push-to-talk voice agent control plane.
#[derive(Parser)]
#[command(name = "radio-agent", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the agent loop.
    Run {
        /// Speech collaborator backend. Only "scripted" ships with this
        /// crate (the real STT/TTS model and the LLM HTTP endpoint are
        /// external collaborators per the control plane's scope); embedders
        /// link their own `SttEngine`/`TtsEngine` through the library.
        #[arg(long, default_value = "scripted")]
        speech_backend: String,
    },

    /// List available audio input/output devices.
    Devices,

    /// Load and validate a config file without starting the agent.
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("radio_agent=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run {
        speech_backend: "scripted".to_string(),
    }) {
        Command::Run { speech_backend } => run(config, &speech_backend),
        Command::Devices => list_devices(),
        Command::CheckConfig => check_config(config),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<AgentConfig> {
    let config = match path {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn check_config(config: AgentConfig) -> anyhow::Result<()> {
    println!("config OK");
    println!("  sample rate:      {} Hz", config.audio.sample_rate);
    println!("  vad threshold:    {}", config.vad.threshold);
    println!("  llm endpoint:     {}", config.llm.endpoint);
    println!("  wake word:        {}", config.wake_word.enabled);
    println!("  session log dir:  {}", config.session_log_dir.display());
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();

    println!("Input devices:");
    for device in host.input_devices()? {
        if let Ok(name) = device.name() {
            println!("  - {name}");
        }
    }

    println!("\nOutput devices:");
    for device in host.output_devices()? {
        if let Ok(name) = device.name() {
            println!("  - {name}");
        }
    }

    Ok(())
}

fn build_speech_backends(backend: &str) -> anyhow::Result<(Box<dyn SttEngine>, Box<dyn TtsEngine>)> {
    match backend {
        "scripted" => Ok((
            Box::new(ScriptedSttEngine::new(Vec::new())),
            Box::new(ScriptedTtsEngine::new()),
        )),
        other => anyhow::bail!(
            "unknown speech backend \"{other}\": only \"scripted\" ships with this crate; \
             link a real STT/TTS implementation through the library API"
        ),
    }
}

fn run(config: AgentConfig, speech_backend: &str) -> anyhow::Result<()> {
    println!("radio-agent v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = install_shutdown_handler()?;

    let audio_io = Box::new(CpalAudioIo::new(&config.audio)?);
    let (stt, tts) = build_speech_backends(speech_backend)?;

    let now_ms = now_ms();
    let client: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(
        config.llm.endpoint.clone(),
        config.llm.timeout_ms,
    ));
    let summarizer_client: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(
        config.llm.endpoint.clone(),
        config.llm.timeout_ms,
    ));

    let memory = Arc::new(ConversationMemory::new(
        config.memory.clone(),
        config.llm.system_prompt.clone(),
        now_ms,
    ));
    if let Some(path) = config.memory.persistence_path.clone() {
        if path.exists() {
            memory.load(&path)?;
        }
    }

    let mut registry = ToolRegistry::new();
    if config.tools.enabled.iter().any(|t| t == "log_memo") {
        registry.register(Arc::new(LogMemoTool::new(config.session_log_dir.clone())));
    }
    if config.tools.enabled.iter().any(|t| t == "internal_search") {
        registry.register(Arc::new(InternalSearchTool::new(config.session_log_dir.clone())));
    }
    if config.tools.enabled.iter().any(|t| t == "ping") {
        registry.register(Arc::new(PingTool));
    }
    let registry = Arc::new(registry);

    let executor = Arc::new(ToolExecutor::new(registry.clone(), config.tools.max_concurrent));
    let summarizer = Arc::new(Summarizer::spawn(summarizer_client, config.llm.model_name.clone()));

    let orchestrator = Orchestrator::new(
        config.llm.clone(),
        config.clarifier.clone(),
        config.tools.clone(),
        client,
        memory,
        registry,
        executor,
        summarizer,
    );

    let recorder = Some(SessionRecorder::start(&config.session_log_dir, now_ms)?);

    println!("Listening. Press Ctrl+C to stop.\n");

    let mut agent = AgentLoop::new(config, audio_io, stt, tts, orchestrator, recorder, shutdown);
    agent.run()?;

    Ok(())
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
