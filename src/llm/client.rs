//! Blocking LLM HTTP client.
//!
//! Grounded on `varunr89-deskmic::summarize::llm::LlmClient` (blocking
//! client shape, from-config construction) but swapping `reqwest::blocking`
//! for `ureq` — already one of the teacher's dependencies — and supporting
//! the two server flavors §6 requires instead of one fixed Azure endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AgentError, Result};
use crate::llm::types::{GenerationRequest, GenerationResponse, StopReason, ToolCall};
use crate::memory::{ConversationMessage, Role};

/// Collaborator contract the orchestrator drives. Implemented by
/// [`HttpLlmClient`] and, for tests, [`ScriptedLlmClient`].
pub trait LlmClient: Send + Sync {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<GenerationResponse>;
}

/// Selects the wire format from the configured endpoint's path, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerFlavor {
    Completion,
    Chat,
}

fn flavor_for(endpoint: &str) -> ServerFlavor {
    if endpoint.contains("/api/chat") {
        ServerFlavor::Chat
    } else {
        ServerFlavor::Completion
    }
}

/// `ureq`-backed client against a local llama.cpp-style `/completion`
/// server or an Ollama-style `/api/chat` server.
pub struct HttpLlmClient {
    endpoint: String,
    flavor: ServerFlavor,
    timeout_ms: u64,
    agent: ureq::Agent,
}

impl HttpLlmClient {
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> Self {
        let endpoint = endpoint.into();
        let flavor = flavor_for(&endpoint);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .build();
        Self {
            endpoint,
            flavor,
            timeout_ms,
            agent,
        }
    }

    fn generate_completion(&self, request: &GenerationRequest<'_>) -> Result<GenerationResponse> {
        let prompt = render_completion_prompt(request);
        let body = CompletionRequestBody {
            prompt,
            n_predict: request.max_tokens,
            temperature: request.temperature,
            stop: request.stop_sequences.to_vec(),
            stream: false,
        };
        debug!(endpoint = %self.endpoint, "sending completion-style request");
        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(&body)
            .map_err(|e| classify_transport_error(e, self.timeout_ms))?;
        let parsed: CompletionResponseBody = response
            .into_json()
            .map_err(|e| AgentError::Parse(format!("completion response: {e}")))?;
        let stop_reason = if parsed.stopped_limit.unwrap_or(false) {
            StopReason::Length
        } else {
            StopReason::Stop
        };
        Ok(GenerationResponse {
            text: parsed.content,
            tool_calls: Vec::new(),
            stop_reason,
        })
    }

    fn generate_chat(&self, request: &GenerationRequest<'_>) -> Result<GenerationResponse> {
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: request.system_prompt.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }];
        messages.extend(request.messages.iter().filter_map(to_chat_message));

        let tools: Vec<ChatToolDef> = request
            .tools
            .iter()
            .map(|t| ChatToolDef {
                kind: "function".to_string(),
                function: ChatToolFunctionDef {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();

        let body = ChatRequestBody {
            model: request.model_name.to_string(),
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                stop: request.stop_sequences.to_vec(),
            },
            stream: false,
        };

        debug!(endpoint = %self.endpoint, "sending chat-style request");
        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(&body)
            .map_err(|e| classify_transport_error(e, self.timeout_ms))?;
        let parsed: ChatResponseBody = response
            .into_json()
            .map_err(|e| AgentError::Parse(format!("chat response: {e}")))?;

        let tool_calls = parsed
            .message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(idx, tc)| ToolCall {
                id: tc.id.unwrap_or_else(|| format!("call_{idx}")),
                name: tc.function.name,
                arguments: tc.function.arguments.to_string(),
            })
            .collect();

        Ok(GenerationResponse {
            text: parsed.message.content,
            tool_calls,
            stop_reason: StopReason::from_done_reason(parsed.done_reason.as_deref()),
        })
    }
}

impl LlmClient for HttpLlmClient {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<GenerationResponse> {
        match self.flavor {
            ServerFlavor::Completion => self.generate_completion(request),
            ServerFlavor::Chat => self.generate_chat(request),
        }
    }
}

fn classify_transport_error(err: ureq::Error, timeout_ms: u64) -> AgentError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            AgentError::Network(format!("LLM endpoint returned HTTP {code}: {body}"))
        }
        ureq::Error::Transport(transport) => {
            if transport.kind() == ureq::ErrorKind::Io {
                warn!(%transport, "LLM transport error");
            }
            if format!("{transport}").to_lowercase().contains("timed out") {
                AgentError::Timeout(timeout_ms)
            } else {
                AgentError::Network(transport.to_string())
            }
        }
    }
}

fn render_completion_prompt(request: &GenerationRequest<'_>) -> String {
    let mut prompt = String::new();
    prompt.push_str(request.system_prompt);
    prompt.push('\n');
    for message in request.messages {
        let prefix = match message.role {
            Role::System => continue,
            Role::User => "User: ",
            Role::Assistant => "Assistant: ",
            Role::Tool => "Tool: ",
        };
        prompt.push_str(prefix);
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str("Assistant:");
    prompt
}

fn to_chat_message(message: &ConversationMessage) -> Option<ChatMessage> {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let tool_calls = message
        .tool_calls
        .as_deref()
        .map(reconstruct_tool_calls)
        .unwrap_or_default();
    Some(ChatMessage {
        role: role.to_string(),
        content: message.content.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    })
}

/// Replays a stored assistant turn's tool calls (serialized by the
/// orchestrator as `Vec<ToolCall>` JSON, per [`crate::memory::ConversationMessage::tool_calls`])
/// back into wire shape, so a replayed tool-result message is never sent
/// to a chat-style server without its preceding assistant `tool_calls`.
fn reconstruct_tool_calls(serialized: &str) -> Vec<ChatToolCall> {
    let calls: Vec<ToolCall> = match serde_json::from_str(serialized) {
        Ok(calls) => calls,
        Err(e) => {
            warn!(error = %e, "failed to reconstruct stored tool calls, re-sending without them");
            return Vec::new();
        }
    };
    calls
        .into_iter()
        .map(|tc| {
            let arguments = serde_json::from_str(&tc.arguments)
                .unwrap_or_else(|_| serde_json::Value::String(tc.arguments.clone()));
            ChatToolCall {
                id: Some(tc.id),
                function: ChatFunctionCall {
                    name: tc.name,
                    arguments,
                },
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct CompletionRequestBody {
    prompt: String,
    n_predict: usize,
    temperature: f64,
    stop: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponseBody {
    content: String,
    #[serde(default, rename = "stopped_limit")]
    stopped_limit: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatToolDef {
    #[serde(rename = "type")]
    kind: String,
    function: ChatToolFunctionDef,
}

#[derive(Debug, Serialize)]
struct ChatToolFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: usize,
    stop: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequestBody {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatToolDef>>,
    options: ChatOptions,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    message: ChatResponseMessage,
    #[serde(default)]
    done_reason: Option<String>,
}

/// Canned-response test double, queued in call order. Used by the
/// orchestrator and summarizer test suites in place of a live server,
/// mirroring [`crate::audio::device::MemoryAudioIo`]'s role for the audio
/// I/O contract.
pub struct ScriptedLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<GenerationResponse>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<GenerationResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }
}

impl LlmClient for ScriptedLlmClient {
    fn generate(&self, _request: &GenerationRequest<'_>) -> Result<GenerationResponse> {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| AgentError::Llm("ScriptedLlmClient exhausted its queued responses".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_endpoint_selects_completion_flavor() {
        assert_eq!(
            flavor_for("http://127.0.0.1:8080/completion"),
            ServerFlavor::Completion
        );
    }

    #[test]
    fn api_chat_endpoint_selects_chat_flavor() {
        assert_eq!(flavor_for("http://127.0.0.1:11434/api/chat"), ServerFlavor::Chat);
    }

    #[test]
    fn completion_prompt_includes_prior_turns() {
        let messages = vec![
            ConversationMessage::user("what's your status", 0),
            ConversationMessage::assistant("all clear, over.", 1),
        ];
        let request = GenerationRequest {
            system_prompt: "You are a radio operator.",
            messages: &messages,
            tools: &[],
            max_tokens: 50,
            temperature: 0.5,
            stop_sequences: &[],
            model_name: "",
        };
        let prompt = render_completion_prompt(&request);
        assert!(prompt.contains("User: what's your status"));
        assert!(prompt.contains("Assistant: all clear, over."));
        assert!(prompt.ends_with("Assistant:"));
    }

    #[test]
    fn stop_reason_length_marks_truncated() {
        assert!(StopReason::from_done_reason(Some("length")).is_truncated());
        assert!(!StopReason::from_done_reason(Some("stop")).is_truncated());
        assert!(!StopReason::from_done_reason(None).is_truncated());
    }

    #[test]
    fn replayed_assistant_turn_reconstructs_tool_calls() {
        let stored = ConversationMessage::assistant_with_tools(
            "",
            serde_json::to_string(&vec![ToolCall {
                id: "call_1".to_string(),
                name: "log_memo".to_string(),
                arguments: "{\"text\":\"buy milk\"}".to_string(),
            }])
            .unwrap(),
            0,
        );
        let chat_message = to_chat_message(&stored).expect("assistant turn converts");
        assert_eq!(chat_message.tool_calls.len(), 1);
        assert_eq!(chat_message.tool_calls[0].function.name, "log_memo");
        assert_eq!(
            chat_message.tool_calls[0].function.arguments,
            serde_json::json!({"text": "buy milk"})
        );
    }

    #[test]
    fn tool_result_message_keeps_its_call_id() {
        let stored = ConversationMessage::tool_result("call_1", "done", 0);
        let chat_message = to_chat_message(&stored).expect("tool turn converts");
        assert_eq!(chat_message.tool_call_id.as_deref(), Some("call_1"));
        assert!(chat_message.tool_calls.is_empty());
    }
}
