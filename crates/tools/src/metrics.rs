//! Per-tool invocation counters.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

/// Snapshot of one tool's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolStats {
    pub calls: u64,
    pub errors: u64,
    pub avg_response_ms: f64,
}

#[derive(Debug, Default)]
struct Totals {
    calls: u64,
    errors: u64,
    total_ms: f64,
}

/// Thread-safe metrics keyed by tool name.
#[derive(Debug, Default)]
pub struct ToolMetrics {
    by_tool: RwLock<BTreeMap<String, Totals>>,
}

impl ToolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, tool: &str, elapsed: Duration, is_error: bool) {
        let mut by_tool = self.by_tool.write().unwrap_or_else(|e| e.into_inner());
        let totals = by_tool.entry(tool.to_string()).or_default();
        totals.calls += 1;
        if is_error {
            totals.errors += 1;
        }
        totals.total_ms += elapsed.as_secs_f64() * 1000.0;
    }

    pub fn get(&self, tool: &str) -> Option<ToolStats> {
        let by_tool = self.by_tool.read().unwrap_or_else(|e| e.into_inner());
        by_tool.get(tool).map(Self::stats)
    }

    /// All tools, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, ToolStats> {
        let by_tool = self.by_tool.read().unwrap_or_else(|e| e.into_inner());
        by_tool
            .iter()
            .map(|(name, totals)| (name.clone(), Self::stats(totals)))
            .collect()
    }

    fn stats(totals: &Totals) -> ToolStats {
        ToolStats {
            calls: totals.calls,
            errors: totals.errors,
            avg_response_ms: if totals.calls == 0 {
                0.0
            } else {
                totals.total_ms / totals.calls as f64
            },
        }
    }
}
