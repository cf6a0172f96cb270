//! Registry of available tools, looked up by name.
//!
//! Grounded on `fae_llm::tools::registry::ToolRegistry`, dropping the
//! `ToolMode` gating (no read-only/full split in this crate's scope).

use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::types::ToolDefinition;
use crate::tools::types::Tool;

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of every registered tool, sorted for deterministic output.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Tool definitions serialized the way the orchestrator embeds them in
    /// a chat-style request's `tools[]` array.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;

    struct PingTool;
    impl Tool for PingTool {
        fn name(&self) -> &str {
            "ping"
        }
        fn description(&self) -> &str {
            "Always replies pong."
        }
        fn schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        fn execute(&self, _arguments: &str) -> Result<String, AgentError> {
            Ok("pong".to_string())
        }
    }

    #[test]
    fn register_and_look_up() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PingTool));
        assert!(registry.exists("ping"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.get("ping").unwrap().execute("{}").unwrap(), "pong");
    }

    #[test]
    fn definitions_are_sorted_and_schema_shaped() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PingTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "ping");
        assert!(defs[0].parameters.is_object());
    }
}
