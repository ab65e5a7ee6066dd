//! Directory listing tool.

use async_trait::async_trait;
use memloop_core::error::ToolError;
use memloop_core::tool::{Tool, ToolOutput};
use crate::PathRules;

pub struct ListDirectoryTool {
    rules: PathRules,
}

impl ListDirectoryTool {
    pub fn new(rules: PathRules) -> Self {
        Self { rules }
    }

    async fn entries(path: &std::path::Path) -> std::io::Result<Vec<String>> {
        let mut dir = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and folders in a given directory."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the directory (default is current directory)"
                }
            }
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let raw = input["path"].as_str().unwrap_or(".");
        let path = self.rules.check(self.name(), raw)?;

        match Self::entries(&path).await {
            Ok(names) if names.is_empty() => Ok(ToolOutput::success("Directory is empty.")),
            Ok(names) => Ok(ToolOutput::success(names.join("\n"))),
            Err(e) => Ok(ToolOutput::error(format!("Error listing directory: {e}"))),
        }
    }
}
