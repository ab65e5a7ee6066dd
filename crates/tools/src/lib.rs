//! Built-in tools and the in-process capability provider for memloop.
//!
//! Tools give the agent the ability to interact with the host:
//! run allowlisted commands, list directories, read/create/delete files,
//! and inspect system resources. [`LocalSession`] wraps a registry of
//! them behind the [`CapabilityProvider`](memloop_core::CapabilityProvider)
//! trait with per-call timeouts, a result cache, and metrics.

pub mod cache;
pub mod file_read;
pub mod file_write;
pub mod list_directory;
pub mod metrics;
pub mod session;
pub mod shell;
pub mod system;

use memloop_config::ToolsConfig;
use memloop_core::error::{Error, ToolError};
use memloop_core::tool::{Tool, ToolRegistry};
use memloop_security::{validate_path, CommandPolicy, PathValidationError};
use std::path::PathBuf;

pub use cache::ResultCache;
pub use metrics::{ToolMetrics, ToolStats};
pub use session::LocalSession;

/// Path rules shared by the file tools.
#[derive(Debug, Clone, Default)]
pub struct PathRules {
    allowed_roots: Vec<String>,
    forbidden_paths: Vec<String>,
}

impl PathRules {
    pub fn new(allowed_roots: Vec<String>, forbidden_paths: Vec<String>) -> Self {
        Self {
            allowed_roots,
            forbidden_paths,
        }
    }

    /// Resolve `path` and enforce the rules on behalf of `tool_name`.
    pub fn check(&self, tool_name: &str, path: &str) -> Result<PathBuf, ToolError> {
        validate_path(path, &self.allowed_roots, &self.forbidden_paths).map_err(|e| match e {
            PathValidationError::Unresolvable { .. } => ToolError::ExecutionFailed {
                tool_name: tool_name.into(),
                reason: e.to_string(),
            },
            _ => ToolError::PermissionDenied {
                tool_name: tool_name.into(),
                reason: e.to_string(),
            },
        })
    }
}

/// Instantiate one built-in tool by name.
fn build_tool(name: &str, policy: &CommandPolicy, rules: &PathRules) -> Option<Box<dyn Tool>> {
    let tool: Box<dyn Tool> = match name {
        "execute_command" => Box::new(shell::ExecuteCommandTool::new(policy.clone())),
        "list_allowed_commands" => Box::new(shell::ListAllowedCommandsTool::new(policy.clone())),
        "list_directory" => Box::new(list_directory::ListDirectoryTool::new(rules.clone())),
        "read_file" => Box::new(file_read::ReadFileTool::new(rules.clone())),
        "create_file" => Box::new(file_write::CreateFileTool::new(rules.clone())),
        "delete_file" => Box::new(file_write::DeleteFileTool::new(rules.clone())),
        "get_system_resources" => Box::new(system::SystemResourcesTool),
        "get_process_info" => Box::new(system::ProcessInfoTool),
        _ => return None,
    };
    Some(tool)
}

/// Build a registry holding exactly the tools `config.enabled` names.
///
/// An unknown name is a configuration failure.
pub fn registry_from_config(config: &ToolsConfig) -> Result<ToolRegistry, Error> {
    let policy = CommandPolicy::new(&config.allowed_commands);
    let rules = PathRules::new(config.allowed_roots.clone(), config.forbidden_paths.clone());

    let mut registry = ToolRegistry::new();
    for name in &config.enabled {
        let tool = build_tool(name, &policy, &rules)
            .ok_or_else(|| Error::config(format!("unknown tool '{name}' in tools.enabled")))?;
        registry.register(tool);
    }
    tracing::debug!(tools = ?registry.names(), "Tool registry built");
    Ok(registry)
}

/// Create a registry with every built-in tool and default security rules.
pub fn default_registry() -> ToolRegistry {
    let policy = CommandPolicy::default();
    let rules = PathRules::new(vec![], ToolsConfig::default().forbidden_paths);
    let mut registry = ToolRegistry::new();
    for name in ToolsConfig::default().enabled {
        if let Some(tool) = build_tool(&name, &policy, &rules) {
            registry.register(tool);
        }
    }
    registry
}
