//! Bundled tool plugins (§4.8 `[EXPANSION]`).
//!
//! `LogMemoTool` and `InternalSearchTool` are grounded on
//! `original_source/src/tools/log_memo_tool.cpp` and
//! `::internal_search_tool.cpp`: both append/scan a flat `memos.txt` under
//! the session log directory rather than a database. `PingTool` is a
//! liveness probe for manual testing, grounded on the same `Tool` shape.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::AgentError;
use crate::tools::types::Tool;

fn memo_file_path(session_log_dir: &std::path::Path) -> PathBuf {
    session_log_dir.join("memos.txt")
}

/// Appends a timestamped, optionally tagged line to the session's memo file.
pub struct LogMemoTool {
    session_log_dir: PathBuf,
}

impl LogMemoTool {
    pub fn new(session_log_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_log_dir: session_log_dir.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LogMemoArgs {
    content: String,
    #[serde(default)]
    tags: Vec<String>,
}

impl Tool for LogMemoTool {
    fn name(&self) -> &str {
        "log_memo"
    }

    fn description(&self) -> &str {
        "Log or memo something the user said for later reference. Use this when the \
         user wants to remember something or make a note."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The content or information to log/memo"
                },
                "tags": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Optional tags to categorize the memo"
                }
            },
            "required": ["content"]
        })
    }

    fn execute(&self, arguments: &str) -> Result<String, AgentError> {
        let args: LogMemoArgs = serde_json::from_str(arguments)
            .map_err(|e| AgentError::Parse(format!("log_memo arguments: {e}")))?;
        if args.content.trim().is_empty() {
            return Err(AgentError::Parse("missing or empty 'content' parameter".into()));
        }

        std::fs::create_dir_all(&self.session_log_dir)?;
        let path = memo_file_path(&self.session_log_dir);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut line = format!("[{timestamp}] ");
        if !args.tags.is_empty() {
            line.push('[');
            line.push_str(&args.tags.join(", "));
            line.push_str("] ");
        }
        line.push_str(&args.content);
        line.push('\n');
        file.write_all(line.as_bytes())?;

        let mut result_msg = "Memo logged successfully".to_string();
        if !args.tags.is_empty() {
            result_msg.push_str(" with tags: ");
            result_msg.push_str(&args.tags.join(", "));
        }
        info!(path = %path.display(), "log_memo wrote an entry");
        Ok(result_msg)
    }
}

/// Case-insensitive substring search over the same `memos.txt` file
/// `LogMemoTool` writes.
pub struct InternalSearchTool {
    session_log_dir: PathBuf,
}

impl InternalSearchTool {
    pub fn new(session_log_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_log_dir: session_log_dir.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InternalSearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<i64>,
}

impl Tool for InternalSearchTool {
    fn name(&self) -> &str {
        "internal_search"
    }

    fn description(&self) -> &str {
        "Search the internal database or knowledge base for previously stored memos, \
         notes, or information. Use this when the user asks about something they \
         mentioned before."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query string"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "default": 10
                }
            },
            "required": ["query"]
        })
    }

    fn execute(&self, arguments: &str) -> Result<String, AgentError> {
        let args: InternalSearchArgs = serde_json::from_str(arguments)
            .map_err(|e| AgentError::Parse(format!("internal_search arguments: {e}")))?;
        if args.query.trim().is_empty() {
            return Err(AgentError::Parse("missing or empty 'query' parameter".into()));
        }
        let limit = args.limit.unwrap_or(10).clamp(1, 50) as usize;

        info!(query = %args.query, limit, "internal_search running");
        let query_lower = args.query.to_lowercase();
        let path = memo_file_path(&self.session_log_dir);

        let mut matches = Vec::new();
        if let Ok(file) = std::fs::File::open(&path) {
            for line in BufReader::new(file).lines() {
                if matches.len() >= limit {
                    break;
                }
                let Ok(line) = line else { break };
                if line.to_lowercase().contains(&query_lower) {
                    matches.push(line);
                }
            }
        }

        Ok(if matches.is_empty() {
            format!(
                "No results found for query: \"{}\"\nNo matching memos or notes were found in the internal database.",
                args.query
            )
        } else {
            let mut out = format!(
                "Found {} result(s) for query: \"{}\"\n\n",
                matches.len(),
                args.query
            );
            for (i, m) in matches.iter().enumerate() {
                out.push_str(&format!("Result {}: {}\n", i + 1, m));
            }
            out
        })
    }
}

/// Liveness probe for manual tool-loop testing. Always replies `"pong"`.
pub struct PingTool;

impl Tool for PingTool {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Check that the tool-calling pipeline is responsive. Takes no arguments."
    }

    fn schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    fn execute(&self, _arguments: &str) -> Result<String, AgentError> {
        Ok("pong".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_memo_writes_and_search_finds_it() {
        let dir = tempdir().unwrap();
        let log_tool = LogMemoTool::new(dir.path());
        let result = log_tool
            .execute(r#"{"content": "pick up propane tank", "tags": ["errand"]}"#)
            .unwrap();
        assert!(result.contains("errand"));

        let search_tool = InternalSearchTool::new(dir.path());
        let found = search_tool
            .execute(r#"{"query": "propane"}"#)
            .unwrap();
        assert!(found.contains("pick up propane tank"));
    }

    #[test]
    fn log_memo_rejects_missing_content() {
        let dir = tempdir().unwrap();
        let tool = LogMemoTool::new(dir.path());
        assert!(tool.execute(r#"{"tags": ["x"]}"#).is_err());
    }

    #[test]
    fn internal_search_on_missing_file_is_empty_not_an_error() {
        let dir = tempdir().unwrap();
        let tool = InternalSearchTool::new(dir.path());
        let result = tool.execute(r#"{"query": "anything"}"#).unwrap();
        assert!(result.contains("No results found"));
    }

    #[test]
    fn internal_search_clamps_limit() {
        let dir = tempdir().unwrap();
        let log_tool = LogMemoTool::new(dir.path());
        for i in 0..5 {
            log_tool
                .execute(&format!(r#"{{"content": "entry {i} matching"}}"#))
                .unwrap();
        }
        let search_tool = InternalSearchTool::new(dir.path());
        let found = search_tool
            .execute(r#"{"query": "matching", "limit": 2}"#)
            .unwrap();
        assert!(found.contains("Found 2 result"));
    }

    #[test]
    fn ping_replies_pong() {
        assert_eq!(PingTool.execute("{}").unwrap(), "pong");
    }
}
