//! Tool trait and call/result types.
//!
//! Grounded on `fae_llm::tools::types::Tool` (name/description/schema/execute
//! shape) simplified to this crate's needs: no `ToolMode` gating, since
//! spec.md scopes "domain-specific command plugins" out of the core and the
//! bundled plugins (§4.8 `[EXPANSION]`) are always available once enabled.

use crate::error::AgentError;

/// A request to run one named tool, as decoded from the LLM's tool-call
/// response.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// The outcome of running a tool, keyed back to the call that produced it.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub call_id: String,
    pub success: bool,
    pub content: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            content: content.into(),
            error: None,
        }
    }

    pub fn failure(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            content: String::new(),
            error: Some(error.into()),
        }
    }

    /// The text handed back to the LLM as the tool-result message content.
    pub fn as_message_content(&self) -> String {
        if self.success {
            self.content.clone()
        } else {
            format!("Error: {}", self.error.clone().unwrap_or_default())
        }
    }
}

/// A single named capability the orchestrator can dispatch to.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON-Schema-shaped parameter description (`type: "object"`, etc).
    fn schema(&self) -> serde_json::Value;
    fn execute(&self, arguments: &str) -> Result<String, AgentError>;
}
