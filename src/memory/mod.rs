//! Bounded conversation history with a token budget.
//!
//! Mirrors the shape of `saorsa-labs-fae`'s [`crate::config::MemoryConfig`] and
//! `fae_llm::providers::message` types, but owns its own pruning policy: the
//! orchestrator (C7) is the only caller, and needs a plain mutex-guarded
//! history rather than the teacher's JSONL-backed audit log.

use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::error::Result;

/// Who produced a [`ConversationMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn in the conversation. Tool-call metadata is carried as opaque
/// JSON strings, same as the orchestrator sends to the LLM HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<String>,
    pub timestamp_ms: i64,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            timestamp_ms: now_ms,
        }
    }

    pub fn user(content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            timestamp_ms: now_ms,
        }
    }

    pub fn assistant(content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            timestamp_ms: now_ms,
        }
    }

    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls_json: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Some(tool_calls_json.into()),
            timestamp_ms: now_ms,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
            timestamp_ms: now_ms,
        }
    }

    /// `max(1, ceil(content_len / 4))`, the same coarse estimate the
    /// teacher's token accounting uses when no tokenizer is available.
    pub fn estimated_tokens(&self) -> usize {
        (self.content.len().div_ceil(4)).max(1)
    }
}

/// Bounded, mutex-guarded turn history.
///
/// `get_*` methods return value copies: the summarizer thread and the main
/// loop never alias the same `Vec`.
pub struct ConversationMemory {
    config: MemoryConfig,
    messages: Mutex<Vec<ConversationMessage>>,
}

impl ConversationMemory {
    pub fn new(config: MemoryConfig, system_prompt: impl Into<String>, now_ms: i64) -> Self {
        let system = ConversationMessage::system(system_prompt, now_ms);
        Self {
            config,
            messages: Mutex::new(vec![system]),
        }
    }

    pub fn set_system_prompt(&self, prompt: impl Into<String>, now_ms: i64) {
        let mut messages = self.lock();
        if let Some(first) = messages.first_mut() {
            if first.role == Role::System {
                first.content = prompt.into();
                first.timestamp_ms = now_ms;
                return;
            }
        }
        messages.insert(0, ConversationMessage::system(prompt, now_ms));
    }

    pub fn add_user(&self, content: impl Into<String>, now_ms: i64) {
        self.push(ConversationMessage::user(content, now_ms));
    }

    pub fn add_assistant(&self, content: impl Into<String>, now_ms: i64) {
        self.push(ConversationMessage::assistant(content, now_ms));
    }

    pub fn add_assistant_with_tools(
        &self,
        content: impl Into<String>,
        tool_calls_json: impl Into<String>,
        now_ms: i64,
    ) {
        self.push(ConversationMessage::assistant_with_tools(
            content,
            tool_calls_json,
            now_ms,
        ));
    }

    pub fn add_tool_result(&self, call_id: impl Into<String>, content: impl Into<String>, now_ms: i64) {
        self.push(ConversationMessage::tool_result(call_id, content, now_ms));
    }

    fn push(&self, message: ConversationMessage) {
        let mut messages = self.lock();
        messages.push(message);
        prune(&mut messages, &self.config);
    }

    /// Drop every message except the (possibly absent) system prompt.
    pub fn clear(&self) {
        let mut messages = self.lock();
        messages.retain(|m| m.role == Role::System);
    }

    /// All messages, including the system prompt, oldest first.
    pub fn get_messages(&self) -> Vec<ConversationMessage> {
        self.lock().clone()
    }

    /// The system prompt (if any) plus the most recent `n` non-system
    /// messages.
    pub fn get_recent(&self, n: usize) -> Vec<ConversationMessage> {
        let messages = self.lock();
        let system = messages.first().filter(|m| m.role == Role::System).cloned();
        let rest: Vec<_> = messages.iter().filter(|m| m.role != Role::System).collect();
        let start = rest.len().saturating_sub(n);
        let mut out = Vec::with_capacity(n + 1);
        out.extend(system);
        out.extend(rest[start..].iter().map(|m| (*m).clone()));
        out
    }

    /// `get_recent` rendered as a JSON array, ready to splice into an LLM
    /// request body.
    pub fn to_serialized_recent(&self, n: usize) -> Result<String> {
        Ok(serde_json::to_string(&self.get_recent(n))?)
    }

    /// `message_count` excludes the system prompt, matching the teacher's
    /// `ConversationMemory::message_count`.
    pub fn message_count(&self) -> usize {
        self.lock().iter().filter(|m| m.role != Role::System).count()
    }

    pub fn estimated_tokens(&self) -> usize {
        self.lock().iter().map(ConversationMessage::estimated_tokens).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.message_count() == 0
    }

    /// Persist as JSON Lines, one message per line.
    pub fn save(&self, path: &Path) -> Result<()> {
        let messages = self.lock();
        let mut out = String::new();
        for message in messages.iter() {
            out.push_str(&serde_json::to_string(message)?);
            out.push('\n');
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Replace the in-memory history with the contents of a JSON Lines file.
    pub fn load(&self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let mut loaded = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            loaded.push(serde_json::from_str::<ConversationMessage>(line)?);
        }
        let mut messages = self.lock();
        *messages = loaded;
        prune(&mut messages, &self.config);
        Ok(())
    }

    /// Save if `auto_save` and a `persistence_path` are configured. Called
    /// after every `add_*` by the orchestrator, matching the teacher's
    /// `auto_save` contract.
    pub fn maybe_auto_save(&self) -> Result<()> {
        if !self.config.auto_save {
            return Ok(());
        }
        let Some(path) = self.config.persistence_path.clone() else {
            return Ok(());
        };
        self.save(&path)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ConversationMessage>> {
        self.messages.lock().unwrap_or_else(|e| {
            // A poisoned lock means a prior panic happened mid-mutation; the
            // data itself is still structurally valid, so recover it rather
            // than taking the whole agent down over a stale history.
            e.into_inner()
        })
    }
}

/// Evict the oldest non-system messages until both bounds hold. The system
/// prompt (first message, if role `System`) is never evicted.
fn prune(messages: &mut Vec<ConversationMessage>, config: &MemoryConfig) {
    loop {
        let non_system = messages.iter().filter(|m| m.role != Role::System).count();
        let total_tokens: usize = messages.iter().map(ConversationMessage::estimated_tokens).sum();
        if non_system <= config.max_messages && total_tokens <= config.max_tokens {
            return;
        }
        let Some(victim) = messages.iter().position(|m| m.role != Role::System) else {
            return;
        };
        messages.remove(victim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MemoryConfig {
        MemoryConfig {
            enabled: true,
            max_messages: 4,
            max_tokens: 1_000,
            persistence_path: None,
            auto_save: false,
        }
    }

    #[test]
    fn system_prompt_survives_pruning() {
        let mem = ConversationMemory::new(config(), "be terse", 0);
        for i in 0..20 {
            mem.add_user(format!("message {i}"), i);
        }
        let messages = mem.get_messages();
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "be terse");
        assert!(mem.message_count() <= config().max_messages);
    }

    #[test]
    fn prune_respects_token_budget() {
        let mut cfg = config();
        cfg.max_messages = 100;
        cfg.max_tokens = 20;
        let mem = ConversationMemory::new(cfg, "sys", 0);
        for i in 0..20 {
            mem.add_user("x".repeat(16), i);
        }
        assert!(mem.estimated_tokens() <= 20);
    }

    #[test]
    fn get_recent_keeps_system_and_tail() {
        let mem = ConversationMemory::new(config(), "sys", 0);
        mem.add_user("one", 1);
        mem.add_assistant("two", 2);
        mem.add_user("three", 3);
        let recent = mem.get_recent(2);
        assert_eq!(recent[0].role, Role::System);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[1].content, "two");
        assert_eq!(recent[2].content, "three");
    }

    #[test]
    fn tool_round_trip_through_memory() {
        let mem = ConversationMemory::new(config(), "sys", 0);
        mem.add_user("log this", 1);
        mem.add_assistant_with_tools("", r#"[{"name":"log_memo"}]"#, 2);
        mem.add_tool_result("call_1", "Memo logged", 3);
        mem.add_assistant("Logged it, over.", 4);
        assert_eq!(mem.message_count(), 4);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let mem = ConversationMemory::new(config(), "sys", 0);
        mem.add_user("hello", 1);
        mem.add_assistant("hi, over.", 2);
        mem.save(&path).unwrap();

        let reloaded = ConversationMemory::new(config(), "different", 0);
        reloaded.load(&path).unwrap();
        assert_eq!(reloaded.get_messages().len(), mem.get_messages().len());
        assert_eq!(reloaded.get_messages()[0].content, "sys");
    }

    #[test]
    fn clear_drops_everything_but_system() {
        let mem = ConversationMemory::new(config(), "sys", 0);
        mem.add_user("hi", 1);
        mem.add_assistant("hello, over.", 2);
        mem.clear();
        assert!(mem.is_empty());
        assert_eq!(mem.get_messages().len(), 1);
    }
}
