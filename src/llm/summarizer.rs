//! Background context summarizer.
//!
//! Grounded on `original_source/src/agent.cpp`'s `summarizer_worker_loop`
//! (dedicated thread, single pending snapshot guarded by a mutex+condvar,
//! coalescing last-writer-wins) but the condition variable is replaced by a
//! `crossbeam-channel` wake signal — the mutex still holds the one pending
//! snapshot, so a `post` while work is already pending simply overwrites it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use tracing::{debug, warn};

use crate::llm::client::LlmClient;
use crate::llm::types::GenerationRequest;
use crate::memory::{ConversationMessage, Role};

const SUMMARY_SYSTEM_PROMPT: &str = "Summarize the following radio conversation in two \
    sentences or fewer, keeping only facts the operator would need to recall later. Reply \
    with the summary text only.";
const SUMMARY_MAX_TOKENS: usize = 80;
const MIN_SIGNAL_CHARS: usize = 2;

/// Dedicated worker thread plus the single-slot mailbox feeding it.
pub struct Summarizer {
    pending: Arc<Mutex<Option<Vec<ConversationMessage>>>>,
    wake: Sender<()>,
    context_summary: Arc<Mutex<Option<String>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Summarizer {
    /// `client` should be a dedicated `LlmClient` instance, never shared
    /// with the main orchestrator's client, so the two never race on one
    /// connection.
    pub fn spawn(client: Arc<dyn LlmClient>, model_name: String) -> Self {
        let pending: Arc<Mutex<Option<Vec<ConversationMessage>>>> = Arc::new(Mutex::new(None));
        let context_summary = Arc::new(Mutex::new(None));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (wake, wake_rx) = bounded::<()>(1);

        let handle = {
            let pending = pending.clone();
            let context_summary = context_summary.clone();
            let shutdown = shutdown.clone();
            std::thread::spawn(move || {
                worker_loop(pending, wake_rx, context_summary, shutdown, client, model_name)
            })
        };

        Self {
            pending,
            wake,
            context_summary,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Replace the pending snapshot (last-writer-wins) and wake the worker.
    pub fn submit(&self, snapshot: Vec<ConversationMessage>) {
        let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(snapshot);
        drop(guard);
        let _ = self.wake.try_send(());
    }

    pub fn current_summary(&self) -> Option<String> {
        self.context_summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.wake.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    pending: Arc<Mutex<Option<Vec<ConversationMessage>>>>,
    wake_rx: crossbeam_channel::Receiver<()>,
    context_summary: Arc<Mutex<Option<String>>>,
    shutdown: Arc<AtomicBool>,
    client: Arc<dyn LlmClient>,
    model_name: String,
) {
    loop {
        match wake_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(()) => {}
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        }
        if shutdown.load(Ordering::Acquire) {
            return;
        }

        let snapshot = {
            let mut guard = pending.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        let Some(snapshot) = snapshot else { continue };

        if last_user_turn_is_low_signal(&snapshot) {
            debug!("summarizer skipping low-signal snapshot");
            continue;
        }

        let formatted = format_snapshot(&snapshot);
        if formatted.is_empty() {
            continue;
        }

        let request_message = ConversationMessage::user(formatted, 0);
        let messages = [request_message];
        let request = GenerationRequest {
            system_prompt: SUMMARY_SYSTEM_PROMPT,
            messages: &messages,
            tools: &[],
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: 0.2,
            stop_sequences: &[],
            model_name: &model_name,
        };

        match client.generate(&request) {
            Ok(response) if !response.text.trim().is_empty() => {
                let mut guard = context_summary.lock().unwrap_or_else(|e| e.into_inner());
                *guard = Some(response.text.trim().to_string());
                debug!("context summary updated");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "summarizer LLM call failed"),
        }
    }
}

fn last_user_turn_is_low_signal(snapshot: &[ConversationMessage]) -> bool {
    match snapshot.iter().rev().find(|m| m.role == Role::User) {
        Some(last) => last.content.trim().chars().count() < MIN_SIGNAL_CHARS,
        None => true,
    }
}

fn format_snapshot(snapshot: &[ConversationMessage]) -> String {
    snapshot
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
                Role::System => "system",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::ScriptedLlmClient;
    use crate::llm::types::{GenerationResponse, StopReason};
    use std::time::Duration as StdDuration;

    fn canned(text: &str) -> GenerationResponse {
        GenerationResponse {
            text: text.to_string(),
            tool_calls: Vec::new(),
            stop_reason: StopReason::Stop,
        }
    }

    #[test]
    fn submitting_a_snapshot_updates_the_summary() {
        let client = Arc::new(ScriptedLlmClient::new(vec![canned("Operator asked about fuel.")]));
        let summarizer = Summarizer::spawn(client, "model".to_string());

        let snapshot = vec![
            ConversationMessage::user("how much fuel do we have left", 1),
            ConversationMessage::assistant("about a quarter tank, over.", 2),
        ];
        summarizer.submit(snapshot);

        let mut found = None;
        for _ in 0..50 {
            if let Some(s) = summarizer.current_summary() {
                found = Some(s);
                break;
            }
            std::thread::sleep(StdDuration::from_millis(20));
        }
        assert_eq!(found.as_deref(), Some("Operator asked about fuel."));
        summarizer.shutdown();
    }

    #[test]
    fn low_signal_last_turn_is_skipped() {
        let client = Arc::new(ScriptedLlmClient::new(vec![canned("should not be used")]));
        let summarizer = Summarizer::spawn(client, "model".to_string());

        let snapshot = vec![
            ConversationMessage::user("ok so anyway", 1),
            ConversationMessage::assistant("roger, over.", 2),
            ConversationMessage::user("k", 3),
        ];
        summarizer.submit(snapshot);
        std::thread::sleep(StdDuration::from_millis(100));
        assert!(summarizer.current_summary().is_none());
        summarizer.shutdown();
    }

    #[test]
    fn coalescing_keeps_only_the_latest_snapshot() {
        let client = Arc::new(ScriptedLlmClient::new(vec![canned("second snapshot summary")]));
        let summarizer = Summarizer::spawn(client, "model".to_string());

        summarizer.submit(vec![
            ConversationMessage::user("first question", 1),
            ConversationMessage::assistant("first answer, over.", 2),
        ]);
        summarizer.submit(vec![
            ConversationMessage::user("second question", 3),
            ConversationMessage::assistant("second answer, over.", 4),
        ]);

        let mut found = None;
        for _ in 0..50 {
            if let Some(s) = summarizer.current_summary() {
                found = Some(s);
                break;
            }
            std::thread::sleep(StdDuration::from_millis(20));
        }
        assert_eq!(found.as_deref(), Some("second snapshot summary"));
        summarizer.shutdown();
    }
}
