//! Bounded-concurrency worker pool executing named tools with per-call
//! timeouts.
//!
//! Grounded on `original_source/include/tool_executor.h`'s `ToolExecutor`
//! (fixed worker pool, FIFO queue, sync/async dispatch, pre-dispatch
//! timeout only — no forced cancellation of a running tool) but using
//! `crossbeam-channel` mailboxes instead of a hand-rolled mutex/condvar
//! queue, matching how this crate already uses that crate for the
//! summarizer's single-slot mailbox.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{error, warn};

use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ToolCall, ToolResult};

type Callback = Box<dyn FnOnce(ToolResult) + Send>;

enum Sink {
    Callback(Callback),
    Reply(Sender<ToolResult>),
}

struct Task {
    call: ToolCall,
    timeout_ms: u64,
    enqueued_at: Instant,
    sink: Sink,
}

/// FIFO mailbox plus a fixed pool of worker threads.
pub struct ToolExecutor {
    sender: Sender<Task>,
    active: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, worker_count: usize) -> Self {
        let (sender, receiver) = unbounded::<Task>();
        let active = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = (0..worker_count.max(1))
            .map(|_| {
                let receiver = receiver.clone();
                let registry = registry.clone();
                let active = active.clone();
                let shutdown = shutdown.clone();
                std::thread::spawn(move || worker_loop(receiver, registry, active, shutdown))
            })
            .collect();

        Self {
            sender,
            active,
            shutdown,
            workers,
        }
    }

    /// Enqueue a tool call; `callback` runs on a worker thread once the
    /// call completes (or fails, or times out pre-dispatch).
    pub fn execute_async(
        &self,
        call: ToolCall,
        timeout_ms: u64,
        callback: impl FnOnce(ToolResult) + Send + 'static,
    ) {
        let task = Task {
            call,
            timeout_ms,
            enqueued_at: Instant::now(),
            sink: Sink::Callback(Box::new(callback)),
        };
        if self.sender.send(task).is_err() {
            warn!("tool executor mailbox closed, dropping call");
        }
    }

    /// Enqueue a tool call and block the caller until it completes.
    pub fn execute_sync(&self, call: ToolCall, timeout_ms: u64) -> ToolResult {
        let (reply_tx, reply_rx) = bounded(1);
        let call_id = call.id.clone();
        let task = Task {
            call,
            timeout_ms,
            enqueued_at: Instant::now(),
            sink: Sink::Reply(reply_tx),
        };
        if self.sender.send(task).is_err() {
            return ToolResult::failure(call_id, "tool executor is shut down");
        }
        reply_rx
            .recv()
            .unwrap_or_else(|_| ToolResult::failure(call_id, "tool executor dropped the reply"))
    }

    /// True iff the mailbox is empty and no worker is mid-execution.
    pub fn is_idle(&self) -> bool {
        self.sender.is_empty() && self.active.load(Ordering::Acquire) == 0
    }

    pub fn pending_count(&self) -> usize {
        self.sender.len() + self.active.load(Ordering::Acquire)
    }

    /// Stop accepting meaningfully new work and wake every worker so they
    /// drain the mailbox and exit. Joins all workers before returning.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        drop(self.sender.clone());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    receiver: Receiver<Task>,
    registry: Arc<ToolRegistry>,
    active: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => {
                active.fetch_add(1, Ordering::AcqRel);
                let result = dispatch(&task, &registry);
                active.fetch_sub(1, Ordering::AcqRel);
                match task.sink {
                    Sink::Callback(callback) => callback(result),
                    Sink::Reply(tx) => {
                        let _ = tx.send(result);
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Acquire) && receiver.is_empty() {
                    return;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn dispatch(task: &Task, registry: &ToolRegistry) -> ToolResult {
    let call_id = task.call.id.clone();

    if task.timeout_ms > 0 {
        let elapsed = task.enqueued_at.elapsed().as_millis() as u64;
        if elapsed >= task.timeout_ms {
            return ToolResult::failure(call_id, format!("timeout after {elapsed}ms in queue"));
        }
    }

    let Some(tool) = registry.get(&task.call.name) else {
        return ToolResult::failure(call_id, format!("unknown tool: {}", task.call.name));
    };

    match catch_unwind(AssertUnwindSafe(|| tool.execute(&task.call.arguments))) {
        Ok(Ok(content)) => ToolResult::success(call_id, content),
        Ok(Err(e)) => ToolResult::failure(call_id, e.to_string()),
        Err(_) => {
            error!(tool = %task.call.name, "tool panicked during execution");
            ToolResult::failure(call_id, "tool panicked during execution")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::tools::types::Tool;
    use std::sync::mpsc;
    use std::time::Duration as StdDuration;

    struct PingTool;
    impl Tool for PingTool {
        fn name(&self) -> &str {
            "ping"
        }
        fn description(&self) -> &str {
            "replies pong"
        }
        fn schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        fn execute(&self, _arguments: &str) -> Result<String, AgentError> {
            Ok("pong".to_string())
        }
    }

    struct SlowTool;
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps briefly"
        }
        fn schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        fn execute(&self, _arguments: &str) -> Result<String, AgentError> {
            std::thread::sleep(StdDuration::from_millis(20));
            Ok("done".to_string())
        }
    }

    fn registry_with(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        Arc::new(registry)
    }

    #[test]
    fn execute_sync_runs_registered_tool() {
        let executor = ToolExecutor::new(registry_with(vec![Arc::new(PingTool)]), 1);
        let result = executor.execute_sync(
            ToolCall {
                id: "call_1".into(),
                name: "ping".into(),
                arguments: "{}".into(),
            },
            0,
        );
        assert!(result.success);
        assert_eq!(result.content, "pong");
        executor.shutdown();
    }

    #[test]
    fn unknown_tool_fails_without_panicking() {
        let executor = ToolExecutor::new(registry_with(vec![]), 1);
        let result = executor.execute_sync(
            ToolCall {
                id: "call_1".into(),
                name: "missing".into(),
                arguments: "{}".into(),
            },
            0,
        );
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown tool"));
        executor.shutdown();
    }

    #[test]
    fn pre_dispatch_timeout_fails_without_running_the_tool() {
        let executor = ToolExecutor::new(registry_with(vec![Arc::new(PingTool)]), 1);
        let call = ToolCall {
            id: "call_1".into(),
            name: "ping".into(),
            arguments: "{}".into(),
        };
        // Build a task directly with an already-elapsed enqueue time via the
        // dispatch() helper, since execute_sync always uses "now".
        let task = Task {
            call,
            timeout_ms: 1,
            enqueued_at: Instant::now() - Duration::from_millis(50),
            sink: Sink::Reply(bounded(1).0),
        };
        let registry = registry_with(vec![Arc::new(PingTool)]);
        let result = dispatch(&task, &registry);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timeout"));
        executor.shutdown();
    }

    #[test]
    fn execute_async_invokes_callback() {
        let executor = ToolExecutor::new(registry_with(vec![Arc::new(SlowTool)]), 2);
        let (tx, rx) = mpsc::channel();
        executor.execute_async(
            ToolCall {
                id: "call_1".into(),
                name: "slow".into(),
                arguments: "{}".into(),
            },
            0,
            move |result| {
                let _ = tx.send(result);
            },
        );
        let result = rx.recv_timeout(StdDuration::from_secs(1)).unwrap();
        assert!(result.success);
        assert_eq!(result.content, "done");
        executor.shutdown();
    }

    #[test]
    fn is_idle_reflects_mailbox_and_active_state() {
        let executor = ToolExecutor::new(registry_with(vec![Arc::new(PingTool)]), 1);
        assert!(executor.is_idle());
        let result = executor.execute_sync(
            ToolCall {
                id: "call_1".into(),
                name: "ping".into(),
                arguments: "{}".into(),
            },
            0,
        );
        assert!(result.success);
        assert!(executor.is_idle());
        executor.shutdown();
    }
}
