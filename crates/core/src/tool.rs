//! Tool and capability-provider traits.
//!
//! A [`Tool`] is a single capability (run a command, read a file, ...).
//! Tools are collected in an explicit [`ToolRegistry`] at startup. The agent
//! loop never touches tools directly; it talks to a [`CapabilityProvider`],
//! which lists descriptors and invokes tools by name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use crate::error::ToolError;
use crate::provider::ToolDescriptor;

/// The outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Payload handed back to the model
    pub content: serde_json::Value,

    /// Whether the payload describes a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: serde_json::Value::String(content.into()),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: serde_json::Value::String(content.into()),
            is_error: true,
        }
    }

    /// The payload as display text (strings unquoted, everything else as JSON).
    pub fn text(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "execute_command").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Whether identical calls may be served from a result cache.
    fn cacheable(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, input: serde_json::Value) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a descriptor for the model.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// An explicit name → tool mapping populated at startup.
///
/// Iteration order is by name so descriptor lists are stable between turns.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Descriptors of every registered tool.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(input).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The session object through which the agent reaches its tools.
///
/// Implementations own whatever channel connects them to the tool host;
/// `shutdown` releases it.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Current tool descriptors. Called every iteration, never cached by callers.
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError>;

    /// Invoke a tool by name with an optional deadline.
    async fn invoke(
        &self,
        name: &str,
        input: serde_json::Value,
        timeout: Option<Duration>,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Release the underlying channel.
    async fn shutdown(&self) {}
}
