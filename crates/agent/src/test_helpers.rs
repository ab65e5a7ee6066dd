//! Shared test helpers for agent tests.

use async_trait::async_trait;
use memloop_core::error::{ProviderError, ToolError};
use memloop_core::message::ContentBlock;
use memloop_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDescriptor, Usage};
use memloop_core::tool::{CapabilityProvider, ToolOutput};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Once the queue is exhausted, or when built with
/// [`SequentialMockProvider::failing`], calls fail with an API error.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(vec![])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 529,
                message: "Overloaded".into(),
            });
        }
        Ok(responses.remove(0))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    make_response(vec![ContentBlock::text(text)])
}

/// Create a response from explicit blocks.
pub fn make_response(content: Vec<ContentBlock>) -> ProviderResponse {
    ProviderResponse {
        content,
        usage: Some(Usage {
            input_tokens: 10,
            output_tokens: 5,
        }),
        model: "mock-model".into(),
    }
}

/// A response that calls one tool.
pub fn make_tool_call_response(id: &str, name: &str, input: serde_json::Value) -> ProviderResponse {
    make_response(vec![ContentBlock::tool_use(id, name, input)])
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub name: String,
    pub input: serde_json::Value,
    pub started: Instant,
    pub finished: Instant,
}

/// A capability provider with a fixed tool list that echoes its input,
/// records every call, and fails for names it does not know.
pub struct RecordingCapabilities {
    tools: Vec<ToolDescriptor>,
    delay: Duration,
    calls: Mutex<Vec<Invocation>>,
}

impl RecordingCapabilities {
    pub fn new(names: &[&str]) -> Self {
        let tools = names
            .iter()
            .map(|n| ToolDescriptor {
                name: n.to_string(),
                description: format!("{n} tool"),
                input_schema: serde_json::json!({"type": "object"}),
            })
            .collect();
        Self {
            tools,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapabilityProvider for RecordingCapabilities {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self.tools.clone())
    }

    async fn invoke(
        &self,
        name: &str,
        input: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<ToolOutput, ToolError> {
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(ToolError::NotFound(name.to_string()));
        }
        let started = Instant::now();
        if !self.delay.is_zero() {
            let limit = timeout.unwrap_or(Duration::MAX);
            if self.delay > limit {
                tokio::time::sleep(limit).await;
                return Err(ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout: limit,
                });
            }
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(Invocation {
            name: name.to_string(),
            input: input.clone(),
            started,
            finished: Instant::now(),
        });
        Ok(ToolOutput::success(format!("{name} ok: {input}")))
    }
}
