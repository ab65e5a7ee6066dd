//! File read tool: read file contents with path validation.

use async_trait::async_trait;
use memloop_core::error::ToolError;
use memloop_core::tool::{Tool, ToolOutput};
use crate::PathRules;

pub struct ReadFileTool {
    rules: PathRules,
}

impl ReadFileTool {
    pub fn new(rules: PathRules) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Path to the file"
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

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(ToolOutput::success(content)),
            Err(e) => Ok(ToolOutput::error(format!("Error reading file: {e}"))),
        }
    }
}
