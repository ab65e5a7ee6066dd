//! The agent orchestration loop.
//!
//! One query runs as a bounded sequence of iterations. Each iteration asks
//! the model for one completion, commits it, records and summarizes, trims
//! the window, and then either finishes (no tool calls) or dispatches the
//! requested tools one by one and loops.

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use memloop_core::error::Error;
use memloop_core::event::{DomainEvent, EventBus};
use memloop_core::message::ContentBlock;
use memloop_core::provider::{Provider, ProviderRequest};
use memloop_core::tool::CapabilityProvider;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::ConversationState;
use crate::summarizer::Summarizer;

/// Appended to the answer when the iteration ceiling ends a query.
pub const DEPTH_LIMIT_NOTICE: &str = "[Reached max tool call depth; ending early.]";

/// Why a query stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered without requesting tools
    Completed,
    /// Every allowed iteration requested tools
    DepthLimitReached,
}

/// The result of one processed query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub answer: String,
    pub iterations: u32,
    pub stop: StopReason,
}

/// A tool call the model asked for, in emission order.
struct PendingCall {
    id: String,
    name: String,
    input: serde_json::Value,
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The inference service
    provider: Arc<dyn Provider>,

    /// Where tools are listed and invoked
    capabilities: Arc<dyn CapabilityProvider>,

    /// Optional history compressor
    summarizer: Option<Summarizer>,

    model: String,

    max_tokens: u32,

    temperature: Option<f32>,

    /// Hard ceiling on completion requests per query
    max_total_loops: u32,

    /// Deadline passed with every tool invocation
    tool_timeout: Duration,

    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        capabilities: Arc<dyn CapabilityProvider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            capabilities,
            summarizer: None,
            model: model.into(),
            max_tokens: 1000,
            temperature: None,
            max_total_loops: 10,
            tool_timeout: Duration::from_secs(30),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Set the iteration ceiling (at least 1).
    pub fn with_max_total_loops(mut self, max: u32) -> Self {
        self.max_total_loops = max.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn max_total_loops(&self) -> u32 {
        self.max_total_loops
    }

    /// Process one user query to completion.
    pub async fn process(
        &self,
        state: &mut ConversationState,
        query: &str,
    ) -> Result<QueryOutcome, Error> {
        self.process_with_cancel(state, query, &CancellationToken::new())
            .await
    }

    /// Process one user query, honoring `cancel` before each model call and
    /// each tool call.
    ///
    /// On any error the window is restored to its state before the query, so
    /// the conversation never keeps a half-finished turn.
    pub async fn process_with_cancel(
        &self,
        state: &mut ConversationState,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, Error> {
        info!(
            session_id = %state.id(),
            window = state.window().len(),
            "Processing query"
        );
        self.event_bus.publish(DomainEvent::QueryReceived {
            session_id: state.id().to_string(),
            content_preview: query.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        let snapshot = state.snapshot_window();
        match self.run(state, query, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(session_id = %state.id(), error = %e, "Query failed; rolling back window");
                state.restore_window(snapshot);
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "process_query".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        state: &mut ConversationState,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, Error> {
        state.append_user(query);
        state.enforce_window_bound();
        let mut answer: Vec<String> = Vec::new();

        for iteration in 1..=self.max_total_loops {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            debug!(session_id = %state.id(), iteration, "Agent loop iteration");

            let tools = match self.capabilities.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(error = %e, "Listing tools failed; requesting without tools");
                    vec![]
                }
            };

            let request = ProviderRequest {
                model: self.model.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                messages: state.request_messages(),
                tools,
            };
            let response = self.provider.complete(request).await?;

            self.event_bus.publish(DomainEvent::ResponseGenerated {
                session_id: state.id().to_string(),
                model: response.model.clone(),
                iteration,
                tokens_used: response.usage.map(|u| u.total()).unwrap_or(0),
                timestamp: Utc::now(),
            });

            let (chunks, calls) = classify(&response.content);
            state.append_assistant(response.content);
            let recorded = state.record_if_substantial(&chunks);

            if recorded
                && let Some(summarizer) = &self.summarizer
                && !cancel.is_cancelled()
                && summarizer.maybe_summarize(state).await?
            {
                info!(session_id = %state.id(), "Context summary updated");
                self.event_bus.publish(DomainEvent::SummaryUpdated {
                    session_id: state.id().to_string(),
                    summary_chars: state.summary().chars().count(),
                    timestamp: Utc::now(),
                });
            }

            state.enforce_window_bound();

            let text = chunks.join("\n");
            if !text.is_empty() {
                answer.push(text);
            }

            if calls.is_empty() {
                return Ok(QueryOutcome {
                    answer: answer.join("\n"),
                    iterations: iteration,
                    stop: StopReason::Completed,
                });
            }

            let results = self.dispatch(&calls, cancel).await?;
            state.append_tool_results(results);
            state.enforce_window_bound();
        }

        warn!(
            session_id = %state.id(),
            iterations = self.max_total_loops,
            "Max tool call depth reached, ending early"
        );
        self.event_bus.publish(DomainEvent::DepthLimitReached {
            session_id: state.id().to_string(),
            iterations: self.max_total_loops,
            timestamp: Utc::now(),
        });
        answer.push(DEPTH_LIMIT_NOTICE.to_string());

        Ok(QueryOutcome {
            answer: answer.join("\n"),
            iterations: self.max_total_loops,
            stop: StopReason::DepthLimitReached,
        })
    }

    /// Invoke each call in order, one at a time. Tool failures become error
    /// results; only cancellation aborts.
    async fn dispatch(
        &self,
        calls: &[PendingCall],
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentBlock>, Error> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            info!(tool = %call.name, "Calling tool");

            let block = match self
                .capabilities
                .invoke(&call.name, call.input.clone(), Some(self.tool_timeout))
                .await
            {
                Ok(output) => ContentBlock::tool_result(&call.id, output.content, output.is_error),
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool call failed");
                    ContentBlock::tool_result(&call.id, serde_json::Value::String(e.to_string()), true)
                }
            };
            results.push(block);
        }
        Ok(results)
    }
}

/// Split a completion into text chunks and pending calls.
///
/// Each tool call also contributes a `[Tool call: name(input)]` chunk.
fn classify(content: &[ContentBlock]) -> (Vec<String>, Vec<PendingCall>) {
    let mut chunks = Vec::new();
    let mut calls = Vec::new();
    for block in content {
        match block {
            ContentBlock::Text { text } => chunks.push(text.clone()),
            ContentBlock::ToolUse { id, name, input } => {
                chunks.push(format!("[Tool call: {name}({input})]"));
                calls.push(PendingCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
            }
            ContentBlock::ToolResult { .. } => {}
        }
    }
    (chunks, calls)
}
