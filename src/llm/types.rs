//! Wire-adjacent types shared between the HTTP client and the orchestrator.
//!
//! Grounded on `fae_llm::providers::message` (the call-id/function-name
//! shape of a tool call) but flattened to match §6's two server flavors
//! instead of a single provider-neutral schema.

use serde::{Deserialize, Serialize};

use crate::memory::ConversationMessage;

/// A registered tool's definition, ready to be embedded in a chat-style
/// request body as `{type:"function", function:{...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One tool call the model asked for, carried back from a chat-style
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-serialized arguments, passed straight to the tool executor.
    pub arguments: String,
}

/// Why generation stopped. `"length"` triggers the truncation fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Stop,
    Length,
    ToolCalls,
    Other(String),
}

impl StopReason {
    pub fn from_done_reason(s: Option<&str>) -> Self {
        match s {
            None => StopReason::Stop,
            Some("length") => StopReason::Length,
            Some("tool_calls") => StopReason::ToolCalls,
            Some(other) => StopReason::Other(other.to_string()),
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, StopReason::Length)
    }
}

/// One generation result from either server flavor.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
}

/// Parameters common to every generation call, independent of server
/// flavor.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    pub messages: &'a [ConversationMessage],
    pub tools: &'a [ToolDefinition],
    pub max_tokens: usize,
    pub temperature: f64,
    pub stop_sequences: &'a [String],
    pub model_name: &'a str,
}
