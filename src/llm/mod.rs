//! LLM orchestration (C7): clarifier pre-pass, plain/tool-calling
//! generation, truncation fallback, response post-processing, and the
//! background summarizer, plus the blocking HTTP client the orchestrator
//! drives.

pub mod client;
pub mod orchestrator;
pub mod postprocess;
pub mod summarizer;
pub mod types;

pub use client::{HttpLlmClient, LlmClient};
pub use orchestrator::Orchestrator;
pub use summarizer::Summarizer;
