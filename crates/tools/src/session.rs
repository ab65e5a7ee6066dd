//! In-process capability provider.
//!
//! `LocalSession` owns a [`ToolRegistry`] and adds what a remote tool host
//! would otherwise provide: per-call deadlines, a result cache for cacheable
//! tools, per-tool metrics, and `ToolExecuted` events.

use async_trait::async_trait;
use chrono::Utc;
use memloop_core::error::ToolError;
use memloop_core::event::{DomainEvent, EventBus};
use memloop_core::provider::ToolDescriptor;
use memloop_core::tool::{CapabilityProvider, ToolOutput, ToolRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::metrics::{ToolMetrics, ToolStats};

pub struct LocalSession {
    registry: ToolRegistry,
    default_timeout: Duration,
    cache: ResultCache,
    metrics: ToolMetrics,
    event_bus: Option<Arc<EventBus>>,
    closed: AtomicBool,
}

impl LocalSession {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            default_timeout: Duration::from_secs(30),
            cache: ResultCache::new(Duration::ZERO, 0),
            metrics: ToolMetrics::new(),
            event_bus: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Deadline applied when the caller passes none.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_cache(mut self, ttl: Duration, capacity: usize) -> Self {
        self.cache = ResultCache::new(ttl, capacity);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn metrics(&self) -> BTreeMap<String, ToolStats> {
        self.metrics.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ToolError> {
        if self.is_closed() {
            Err(ToolError::Unavailable("session has been shut down".into()))
        } else {
            Ok(())
        }
    }

    fn finish(&self, name: &str, started: Instant, result: &Result<ToolOutput, ToolError>) {
        let elapsed = started.elapsed();
        let success = matches!(result, Ok(out) if !out.is_error);
        self.metrics.record(name, elapsed, !success);

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: name.to_string(),
                success,
                duration_ms: elapsed.as_millis() as u64,
                timestamp: Utc::now(),
            });
        }
    }
}

#[async_trait]
impl CapabilityProvider for LocalSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        self.ensure_open()?;
        Ok(self.registry.descriptors())
    }

    async fn invoke(
        &self,
        name: &str,
        input: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<ToolOutput, ToolError> {
        self.ensure_open()?;
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let cacheable = tool.cacheable();

        if cacheable && let Some(hit) = self.cache.get(name, &input) {
            debug!(tool = %name, "Tool result served from cache");
            return Ok(hit);
        }

        let deadline = timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();
        let result = match tokio::time::timeout(deadline, tool.execute(input.clone())).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %name, timeout_ms = deadline.as_millis() as u64, "Tool timed out");
                Err(ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout: deadline,
                })
            }
        };
        self.finish(name, started, &result);

        if cacheable && let Ok(output) = &result {
            self.cache.put(name, &input, output);
        }
        result
    }

    async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Tool session closed");
        }
    }
}
