//! Summarizer: compresses recent persistent-log entries into the running
//! context summary.

use std::sync::Arc;
use memloop_core::error::ProviderError;
use memloop_core::message::Message;
use memloop_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

use crate::conversation::ConversationState;

/// Instruction sent as the system message of every summarization request.
pub const SUMMARY_INSTRUCTION: &str =
    "Summarize the following conversation history in a concise way:";

pub struct Summarizer {
    provider: Arc<dyn Provider>,
    model: String,
    threshold: usize,
    span: usize,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            threshold: 5,
            span: 5,
            max_tokens: 500,
        }
    }

    /// Summarize once the persistent log holds more than `threshold` entries.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// How many of the most recent entries feed each summary (at least 1).
    pub fn with_span(mut self, span: usize) -> Self {
        self.span = span.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn should_summarize(&self, state: &ConversationState) -> bool {
        state.persistent_memory().len() > self.threshold
    }

    /// Replace the summary if the trigger holds.
    ///
    /// Returns `Ok(true)` when the summary was replaced. A provider failure
    /// propagates and leaves the previous summary in place.
    pub async fn maybe_summarize(
        &self,
        state: &mut ConversationState,
    ) -> Result<bool, ProviderError> {
        if !self.should_summarize(state) {
            return Ok(false);
        }

        let entries = state.persistent_memory();
        let recent = &entries[entries.len().saturating_sub(self.span)..];
        let history = recent
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            session_id = %state.id(),
            entries = recent.len(),
            "Requesting context summary"
        );

        let request = ProviderRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: None,
            messages: vec![Message::system(SUMMARY_INSTRUCTION), Message::user(history)],
            tools: vec![],
        };
        let response = self.provider.complete(request).await?;

        match response.first_text() {
            Some(text) => {
                state.set_summary(text.to_string());
                Ok(true)
            }
            None => {
                warn!(session_id = %state.id(), "Summary response had no text; keeping previous summary");
                Ok(false)
            }
        }
    }
}
