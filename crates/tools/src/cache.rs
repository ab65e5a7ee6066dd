//! TTL cache for results of cacheable tools.
//!
//! Keys are the tool name plus the serialized arguments. `serde_json` keeps
//! object keys sorted, so argument order does not split entries.

use memloop_core::tool::ToolOutput;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    output: ToolOutput,
    stored_at: Instant,
}

pub struct ResultCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResultCache {
    /// A zero TTL or zero capacity disables the cache.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.capacity > 0
    }

    fn key(tool: &str, input: &serde_json::Value) -> String {
        format!("{tool}:{input}")
    }

    pub fn get(&self, tool: &str, input: &serde_json::Value) -> Option<ToolOutput> {
        if !self.is_enabled() {
            return None;
        }
        let key = Self::key(tool, input);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.output.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a successful output. Error outputs are never cached.
    pub fn put(&self, tool: &str, input: &serde_json::Value, output: &ToolOutput) {
        if !self.is_enabled() || output.is_error {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if entries.len() >= self.capacity {
            entries.retain(|_, e| now.duration_since(e.stored_at) < self.ttl);
        }
        if entries.len() >= self.capacity
            && let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest);
        }

        entries.insert(
            Self::key(tool, input),
            Entry {
                output: output.clone(),
                stored_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
