//! Core response pipeline: clarifier pre-pass, plain/tool-calling
//! generation, truncation fallback, post-processing, and persistence.
//!
//! Grounded on `original_source/src/agent.cpp`'s request-building section
//! (clarifier gate, summary splice at position 1, translator persona
//! override) and `::llm_client.cpp` (the `"Stand by."` fallback phrase,
//! reused here for both truncation and tool-loop exhaustion).

use std::sync::Arc;

use tracing::warn;

use crate::config::{ClarifierConfig, LlmConfig, ToolsConfig};
use crate::error::Result;
use crate::llm::client::LlmClient;
use crate::llm::postprocess::{clean_response, ensure_ends_with_over};
use crate::llm::summarizer::Summarizer;
use crate::llm::types::GenerationRequest;
use crate::memory::{ConversationMemory, ConversationMessage, Role};
use crate::tools::executor::ToolExecutor;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::ToolCall as ExecutorToolCall;

const MAX_TOOL_ITERATIONS: usize = 5;
/// Reused verbatim from the original `LLMClient`'s error paths (connection
/// failure, HTTP error, and now also truncation / tool-loop exhaustion).
const FALLBACK_PHRASE: &str = "Stand by.";

fn clarifier_system_prompt(unknown_sentinel: &str) -> String {
    format!(
        "You rewrite the latest radio transmission so it stands on its own, resolving \
         pronouns and likely speech-to-text homophone errors using the conversation history. \
         Reply with only the rewritten transmission and nothing else. If the transmission \
         cannot be clarified even with the conversation history, reply with exactly \"{unknown_sentinel}\"."
    )
}

/// Drives one `respond()` call end to end. Owns no state beyond its
/// collaborators — conversation state lives in [`ConversationMemory`].
pub struct Orchestrator {
    llm_config: LlmConfig,
    clarifier_config: ClarifierConfig,
    tools_config: ToolsConfig,
    client: Arc<dyn LlmClient>,
    memory: Arc<ConversationMemory>,
    registry: Arc<ToolRegistry>,
    executor: Arc<ToolExecutor>,
    summarizer: Arc<Summarizer>,
}

impl Orchestrator {
    pub fn new(
        llm_config: LlmConfig,
        clarifier_config: ClarifierConfig,
        tools_config: ToolsConfig,
        client: Arc<dyn LlmClient>,
        memory: Arc<ConversationMemory>,
        registry: Arc<ToolRegistry>,
        executor: Arc<ToolExecutor>,
        summarizer: Arc<Summarizer>,
    ) -> Self {
        Self {
            llm_config,
            clarifier_config,
            tools_config,
            client,
            memory,
            registry,
            executor,
            summarizer,
        }
    }

    /// Produce the final, " over."-terminated reply text for one user turn.
    /// Synthesis into audio is the caller's (agent loop's) job.
    pub fn respond(&self, user_text: &str, confidence: f32, now_ms: i64) -> Result<String> {
        let mut snapshot = self.memory.get_recent(self.llm_config.context_max_turns_to_send);
        if let Some(summary) = self.summarizer.current_summary() {
            let pseudo = ConversationMessage::user(format!("Conversation summary: {summary}"), now_ms);
            let insert_at = if snapshot.first().map(|m| m.role) == Some(Role::System) {
                1
            } else {
                0
            };
            snapshot.insert(insert_at.min(snapshot.len()), pseudo);
        }

        let prompt = self.maybe_clarify(&snapshot, user_text, confidence, now_ms);

        self.memory.add_user(user_text, now_ms);

        let raw_text = match prompt {
            ClarifiedPrompt::Sentinel => FALLBACK_PHRASE.to_string(),
            ClarifiedPrompt::Text(prompt) => {
                if self.registry.definitions().is_empty() {
                    self.generate_plain(&snapshot, &prompt, now_ms)?
                } else {
                    self.generate_with_tools(&snapshot, &prompt, now_ms)?
                }
            }
        };

        let final_text = ensure_ends_with_over(&clean_response(&raw_text));

        self.memory.add_assistant(final_text.clone(), now_ms);
        self.memory.maybe_auto_save()?;
        if self.memory.message_count() >= 4 {
            self.summarizer.submit(self.memory.get_messages());
        }

        Ok(final_text)
    }

    /// Returns `None` when the clarifier is disabled or skipped (too little
    /// history, too-short input, low confidence) — callers should fall back
    /// to `user_text` unchanged in that case.
    fn maybe_clarify(
        &self,
        snapshot: &[ConversationMessage],
        user_text: &str,
        confidence: f32,
        now_ms: i64,
    ) -> ClarifiedPrompt {
        let eligible = self.clarifier_config.enabled
            && self.memory.message_count() >= 2
            && user_text.trim().chars().count() >= self.clarifier_config.min_chars
            && confidence >= self.clarifier_config.min_confidence;
        if !eligible {
            return ClarifiedPrompt::Text(user_text.to_string());
        }

        match self.run_clarifier(snapshot, user_text, now_ms) {
            Ok(clarified) => {
                let trimmed = clarified.trim();
                if trimmed == self.clarifier_config.unknown_sentinel {
                    ClarifiedPrompt::Sentinel
                } else if trimmed.is_empty() {
                    ClarifiedPrompt::Text(user_text.to_string())
                } else {
                    ClarifiedPrompt::Text(trimmed.to_string())
                }
            }
            Err(e) => {
                warn!(error = %e, "clarifier call failed, using raw transcript");
                ClarifiedPrompt::Text(user_text.to_string())
            }
        }
    }

    fn run_clarifier(&self, snapshot: &[ConversationMessage], raw_text: &str, now_ms: i64) -> Result<String> {
        let system_prompt = clarifier_system_prompt(&self.clarifier_config.unknown_sentinel);
        let mut messages = snapshot.to_vec();
        messages.push(ConversationMessage::user(raw_text, now_ms));
        let request = GenerationRequest {
            system_prompt: &system_prompt,
            messages: &messages,
            tools: &[],
            max_tokens: 64,
            temperature: 0.0,
            stop_sequences: &[],
            model_name: &self.llm_config.model_name,
        };
        let response = self.client.generate(&request)?;
        Ok(response.text)
    }

    fn generate_plain(&self, snapshot: &[ConversationMessage], prompt: &str, now_ms: i64) -> Result<String> {
        let persona = self.llm_config.response_language.as_ref().map(|lang| {
            let system_prompt = format!(
                "You are a professional English to {lang} translator. Output only the {lang} \
                 translation, no explanations. End transmissions with \"over\"."
            );
            let model_name = self
                .llm_config
                .translation_model
                .clone()
                .unwrap_or_else(|| self.llm_config.model_name.clone());
            (system_prompt, model_name)
        });

        let (system_prompt, model_name, messages) = match persona {
            // Translator persona: single-turn and stateless, per the original warmup comment.
            Some((system_prompt, model_name)) => (system_prompt, model_name, vec![ConversationMessage::user(prompt, now_ms)]),
            None => {
                let mut messages = snapshot.to_vec();
                messages.push(ConversationMessage::user(prompt, now_ms));
                (self.llm_config.system_prompt.clone(), self.llm_config.model_name.clone(), messages)
            }
        };

        let request = GenerationRequest {
            system_prompt: &system_prompt,
            messages: &messages,
            tools: &[],
            max_tokens: self.llm_config.max_tokens,
            temperature: self.llm_config.temperature,
            stop_sequences: &self.llm_config.stop_sequences,
            model_name: &model_name,
        };
        let response = match self.client.generate(&request) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "llm call failed, using fallback phrase");
                return Ok(FALLBACK_PHRASE.to_string());
            }
        };
        if response.stop_reason.is_truncated() {
            return Ok(FALLBACK_PHRASE.to_string());
        }
        Ok(response.text)
    }

    fn generate_with_tools(&self, snapshot: &[ConversationMessage], prompt: &str, now_ms: i64) -> Result<String> {
        let mut messages = snapshot.to_vec();
        let first_turn = ConversationMessage::user(prompt, now_ms);
        messages.push(first_turn);

        let tool_defs = self.registry.definitions();

        for _ in 0..MAX_TOOL_ITERATIONS {
            let request = GenerationRequest {
                system_prompt: &self.llm_config.system_prompt,
                messages: &messages,
                tools: &tool_defs,
                max_tokens: self.llm_config.max_tokens,
                temperature: self.llm_config.temperature,
                stop_sequences: &self.llm_config.stop_sequences,
                model_name: &self.llm_config.model_name,
            };
            let response = match self.client.generate(&request) {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "llm call failed, using fallback phrase");
                    return Ok(FALLBACK_PHRASE.to_string());
                }
            };
            if response.stop_reason.is_truncated() {
                return Ok(FALLBACK_PHRASE.to_string());
            }
            if response.tool_calls.is_empty() {
                return Ok(response.text);
            }

            let tool_calls_json = serde_json::to_string(&response.tool_calls)?;
            self.memory
                .add_assistant_with_tools(response.text.clone(), tool_calls_json.clone(), now_ms);
            messages.push(ConversationMessage::assistant_with_tools(
                response.text,
                tool_calls_json,
                now_ms,
            ));

            for call in &response.tool_calls {
                let executor_call = ExecutorToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                };
                let result = self.executor.execute_sync(executor_call, self.tools_config.timeout_ms);
                let content = result.as_message_content();
                self.memory.add_tool_result(call.id.clone(), content.clone(), now_ms);
                messages.push(ConversationMessage::tool_result(call.id.clone(), content, now_ms));
            }
        }

        warn!(iterations = MAX_TOOL_ITERATIONS, "tool-calling loop exhausted, using fallback");
        Ok(FALLBACK_PHRASE.to_string())
    }
}

enum ClarifiedPrompt {
    Text(String),
    Sentinel,
}
