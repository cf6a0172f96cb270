//! Typed configuration tree for the agent, loaded from TOML.
//!
//! Every section is `#[serde(default)]` so a partial document is valid; this
//! follows the one-struct-per-concern pattern with explicit default
//! functions for non-trivial defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub stt: SttConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub tx: TxConfig,
    pub tools: ToolsConfig,
    pub memory: MemoryConfig,
    pub router: RouterConfig,
    pub clarifier: ClarifierConfig,
    pub wake_word: WakeWordConfig,
    pub transcript_gate: TranscriptGateConfig,
    pub transcript_blank_behavior: BlankBehaviorConfig,
    pub session_log_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            vad: VadConfig::default(),
            stt: SttConfig::default(),
            llm: LlmConfig::default(),
            tts: TtsConfig::default(),
            tx: TxConfig::default(),
            tools: ToolsConfig::default(),
            memory: MemoryConfig::default(),
            router: RouterConfig::default(),
            clarifier: ClarifierConfig::default(),
            wake_word: WakeWordConfig::default(),
            transcript_gate: TranscriptGateConfig::default(),
            transcript_blank_behavior: BlankBehaviorConfig::default(),
            session_log_dir: default_session_log_dir(),
        }
    }
}

impl AgentConfig {
    /// Load a config document from a TOML file, falling back to defaults
    /// for any missing section or field.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: AgentConfig = toml::from_str(&text)?;
        Ok(cfg)
    }

    /// Load from a TOML string, for tests and embedded defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(AgentError::Config("audio.sample_rate must be > 0".into()));
        }
        if self.vad.threshold <= 0.0 {
            return Err(AgentError::Config("vad.threshold must be > 0".into()));
        }
        if self.tools.max_concurrent == 0 {
            return Err(AgentError::Config(
                "tools.max_concurrent must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_session_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("radio-agent")
        .join("sessions")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate: 16_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub threshold: f32,
    pub min_speech_ms: u32,
    pub end_of_utterance_silence_ms: u32,
    pub hangover_ms: u32,
    pub pause_tolerance_ms: u32,
    pub pre_speech_buffer_ms: u32,
    pub adaptive_threshold: bool,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            min_speech_ms: 200,
            end_of_utterance_silence_ms: 700,
            hangover_ms: 300,
            pause_tolerance_ms: 300,
            pre_speech_buffer_ms: 300,
            adaptive_threshold: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub model_path: Option<PathBuf>,
    pub language: String,
    pub blank_sentinel: String,
    pub use_gpu: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            language: "en".to_string(),
            blank_sentinel: "[BLANK_AUDIO]".to_string(),
            use_gpu: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub max_tokens: usize,
    pub temperature: f64,
    pub model_name: String,
    pub stop_sequences: Vec<String>,
    pub system_prompt: String,
    pub context_max_turns_to_send: usize,
    pub translation_model: Option<String>,
    pub response_language: Option<String>,
    pub warmup_translation_model: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/completion".to_string(),
            timeout_ms: 8_000,
            max_tokens: 200,
            temperature: 0.7,
            model_name: String::new(),
            stop_sequences: Vec::new(),
            system_prompt: default_system_prompt(),
            context_max_turns_to_send: 12,
            translation_model: None,
            response_language: None,
            warmup_translation_model: false,
        }
    }
}

fn default_system_prompt() -> String {
    "You are a radio operator. Keep replies short and end every reply with \"over\".".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub voice_path: Option<PathBuf>,
    pub vox_preroll_ms: u32,
    pub vox_preroll_amplitude: f32,
    pub output_gain: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice_path: None,
            vox_preroll_ms: 120,
            vox_preroll_amplitude: 0.2,
            output_gain: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    pub max_transmit_ms: u32,
    pub standby_delay_ms: u32,
    pub channel_clear_silence_ms: u32,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            max_transmit_ms: 15_000,
            standby_delay_ms: 150,
            channel_clear_silence_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub enabled: Vec<String>,
    pub timeout_ms: u64,
    pub max_concurrent: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            timeout_ms: 5_000,
            max_concurrent: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub max_messages: usize,
    pub max_tokens: usize,
    pub persistence_path: Option<PathBuf>,
    pub auto_save: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages: 24,
            max_tokens: 4_000,
            persistence_path: None,
            auto_save: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub repair_confidence_threshold: f32,
    pub repair_phrase: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            repair_confidence_threshold: 0.35,
            repair_phrase: "Say again, over".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClarifierConfig {
    pub enabled: bool,
    pub min_chars: usize,
    pub min_confidence: f32,
    pub unknown_sentinel: String,
}

impl Default for ClarifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_chars: 4,
            min_confidence: 0.3,
            unknown_sentinel: "unknown_sentinel".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    pub enabled: bool,
    pub phrase: String,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            phrase: "hey memo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptGateConfig {
    pub min_transcript_chars: usize,
    pub min_transcript_tokens: usize,
    pub min_confidence: f32,
}

impl Default for TranscriptGateConfig {
    fn default() -> Self {
        Self {
            min_transcript_chars: 2,
            min_transcript_tokens: 1,
            min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlankBehavior {
    #[default]
    None,
    SayAgain,
    Beep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlankBehaviorConfig {
    pub behavior: BlankBehavior,
    pub say_again_phrase: String,
}

impl Default for BlankBehaviorConfig {
    fn default() -> Self {
        Self {
            behavior: BlankBehavior::None,
            say_again_phrase: "Didn't catch that, say again, over".to_string(),
        }
    }
}
