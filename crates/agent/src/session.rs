//! Session lifecycle: wiring configuration into a running agent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use memloop_config::AppConfig;
use memloop_core::error::{Error, ToolError};
use memloop_core::event::EventBus;
use memloop_core::provider::{Provider, ToolDescriptor};
use memloop_core::tool::CapabilityProvider;
use memloop_tools::{LocalSession, ToolStats};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::conversation::ConversationState;
use crate::loop_runner::{AgentLoop, QueryOutcome};
use crate::summarizer::Summarizer;

/// One conversation: the loop, its state, and the tool session it owns.
pub struct AgentSession {
    agent: AgentLoop,
    state: ConversationState,
    tools: Arc<LocalSession>,
    event_bus: Arc<EventBus>,
}

impl AgentSession {
    /// Validate the configuration and connect to the configured provider
    /// and tool host. Configuration problems surface here.
    pub fn connect(config: &AppConfig) -> Result<Self, Error> {
        config.validate()?;
        let provider = memloop_providers::build_from_config(config)?;
        Self::with_provider(config, provider)
    }

    /// Like [`AgentSession::connect`] but with an explicit inference service.
    pub fn with_provider(config: &AppConfig, provider: Arc<dyn Provider>) -> Result<Self, Error> {
        config.validate()?;
        let event_bus = Arc::new(EventBus::default());

        let registry = memloop_tools::registry_from_config(&config.tools)?;
        let tools = Arc::new(
            LocalSession::new(registry)
                .with_timeout(Duration::from_secs(config.tools.timeout_secs))
                .with_cache(
                    Duration::from_secs(config.tools.cache_ttl_secs),
                    config.tools.cache_capacity,
                )
                .with_event_bus(event_bus.clone()),
        );

        let summarizer = Summarizer::new(provider.clone(), config.model.clone())
            .with_threshold(config.agent.summary_threshold)
            .with_span(config.agent.summary_span)
            .with_max_tokens(config.agent.summary_max_tokens);

        let capabilities: Arc<dyn CapabilityProvider> = tools.clone();
        let agent = AgentLoop::new(provider, capabilities, config.model.clone())
            .with_max_total_loops(config.agent.max_total_loops)
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
            .with_tool_timeout(Duration::from_secs(config.tools.timeout_secs))
            .with_summarizer(summarizer)
            .with_event_bus(event_bus.clone());

        let state = ConversationState::new(config.agent.system_prompt.clone(), config.agent.window_size);
        info!(session_id = %state.id(), model = %config.model, "Session started");

        Ok(Self {
            agent,
            state,
            tools,
            event_bus,
        })
    }

    pub async fn ask(&mut self, query: &str) -> Result<QueryOutcome, Error> {
        self.agent.process(&mut self.state, query).await
    }

    pub async fn ask_with_cancel(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, Error> {
        self.agent
            .process_with_cancel(&mut self.state, query, cancel)
            .await
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub async fn tool_descriptors(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        self.tools.list_tools().await
    }

    pub fn tool_metrics(&self) -> BTreeMap<String, ToolStats> {
        self.tools.metrics()
    }

    /// Release the tool session. Safe to call more than once.
    pub async fn close(&self) {
        self.tools.shutdown().await;
        info!(session_id = %self.state.id(), "Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_text_response, make_tool_call_response, SequentialMockProvider};
    use serde_json::json;

    fn config() -> AppConfig {
        AppConfig::default()
    }

    #[tokio::test]
    async fn session_answers_and_closes() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("hi there")]));
        let mut session = AgentSession::with_provider(&config(), provider).unwrap();

        let outcome = session.ask("hello").await.unwrap();
        assert_eq!(outcome.answer, "hi there");
        assert_eq!(session.tool_descriptors().await.unwrap().len(), 8);

        session.close().await;
        assert!(session.tool_descriptors().await.is_err());
    }

    #[tokio::test]
    async fn unknown_configured_tool_fails_at_connect() {
        let mut cfg = config();
        cfg.tools.enabled.push("teleport".into());
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let err = AgentSession::with_provider(&cfg, provider).err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn connect_without_key_is_config_error() {
        let cfg = config();
        let err = AgentSession::connect(&cfg).err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn real_tool_metrics_recorded() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response("t1", "list_allowed_commands", json!({})),
            make_text_response("done"),
        ]));
        let mut session = AgentSession::with_provider(&config(), provider).unwrap();
        session.ask("what can you run?").await.unwrap();

        let metrics = session.tool_metrics();
        assert_eq!(metrics["list_allowed_commands"].calls, 1);
        assert_eq!(metrics["list_allowed_commands"].errors, 0);
    }
}
