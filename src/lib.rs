//! radio-agent: a half-duplex, push-to-talk voice agent control plane.
//!
//! One blocking loop turns a continuous stream of 20ms frames into
//! transmit-or-stay-silent decisions: VAD segments speech, the transcript
//! gate screens low-signal STT output, the router picks a fast-path reply or
//! hands off to the LLM orchestrator, and the TX controller plays the result
//! back with an echo guard so the agent never talks over (or to) itself.
//!
//! # Layout
//!
//! - [`agent`]: the loop itself (C10) — owns every other collaborator.
//! - [`audio`]: frame type, SPSC ring buffer, and the `AudioIo` device contract.
//! - [`vad`]: energy-based voice activity detector (C2).
//! - [`transcript`]: the low-signal gate (C3).
//! - [`router`]: transcript-to-plan decision (C4).
//! - [`state_machine`]: the half-duplex state machine (C5).
//! - [`memory`]: bounded conversation history with JSONL persistence (C6).
//! - [`llm`]: orchestrator, HTTP client, post-processing, summarizer (C7).
//! - [`tools`]: tool registry and worker-pool executor (C8).
//! - [`tx`]: TX controller and echo guard (C9).
//! - [`stt`] / [`tts`]: external speech collaborator contracts.
//! - [`session`]: on-disk session recording.
//! - [`config`]: typed, TOML-backed configuration.
//! - [`error`]: the crate's error taxonomy.

pub mod agent;
pub mod audio;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod router;
pub mod session;
pub mod state_machine;
pub mod stt;
pub mod tools;
pub mod transcript;
pub mod tts;
pub mod tx;
pub mod vad;

pub use agent::AgentLoop;
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use state_machine::{AgentState, StateMachine};
