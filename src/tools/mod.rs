//! Tool-calling plane: plugin trait, registry, worker pool, and bundled
//! plugins (§4.8).

pub mod builtins;
pub mod executor;
pub mod registry;
pub mod types;

pub use builtins::{InternalSearchTool, LogMemoTool, PingTool};
pub use executor::ToolExecutor;
pub use registry::ToolRegistry;
pub use types::{Tool, ToolCall, ToolResult};
