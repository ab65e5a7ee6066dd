//! File creation and deletion tools.

use async_trait::async_trait;
use memloop_core::error::ToolError;
use memloop_core::tool::{Tool, ToolOutput};
use crate::PathRules;

/// Create (or overwrite) a file with optional content.
pub struct CreateFileTool {
    rules: PathRules,
}

impl CreateFileTool {
    pub fn new(rules: PathRules) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a new file with optional content. Overwrites an existing file."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Path where the file will be created"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write into the file"
                }
            },
            "required": ["filepath"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let filepath = input["filepath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filepath' argument".into()))?;
        let content = input["content"].as_str().unwrap_or("");
        let path = self.rules.check(self.name(), filepath)?;

        match tokio::fs::write(&path, content).await {
            Ok(()) => Ok(ToolOutput::success(format!("File created at {filepath}"))),
            Err(e) => Ok(ToolOutput::error(format!("Error creating file: {e}"))),
        }
    }
}

/// Delete a single file.
pub struct DeleteFileTool {
    rules: PathRules,
}

impl DeleteFileTool {
    pub fn new(rules: PathRules) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file at the given path."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Path to the file to delete"
                }
            },
            "required": ["filepath"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let filepath = input["filepath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filepath' argument".into()))?;
        let path = self.rules.check(self.name(), filepath)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(ToolOutput::success(format!("Deleted file: {filepath}"))),
            Err(e) => Ok(ToolOutput::error(format!("Error deleting file: {e}"))),
        }
    }
}
