//! Error types for the radio-agent control plane.

/// Top-level error type for the agent control plane.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Voice activity detection error.
    #[error("VAD error: {0}")]
    Vad(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Language model inference error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Tool execution error.
    #[error("tool error: {0}")]
    Tool(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Conversation memory error.
    #[error("memory error: {0}")]
    Memory(String),

    /// Agent loop / state machine error.
    #[error("agent error: {0}")]
    Agent(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Network error (LLM HTTP endpoint).
    #[error("network error: {0}")]
    Network(String),

    /// Parse/deserialization error.
    #[error("parse error: {0}")]
    Parse(String),

    /// An operation exceeded its configured timeout.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// A required resource (model file, voice file, session directory) is missing.
    #[error("resource error: {0}")]
    Resource(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for AgentError {
    fn from(e: toml::de::Error) -> Self {
        AgentError::Config(e.to_string())
    }
}
