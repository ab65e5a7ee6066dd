//! System monitoring tools backed by `sysinfo`.

use async_trait::async_trait;
use memloop_core::error::ToolError;
use memloop_core::tool::{Tool, ToolOutput};
use serde::Serialize;
use std::path::Path;
use sysinfo::{Disks, System};

#[derive(Debug, Serialize)]
struct MemoryUsage {
    total: u64,
    available: u64,
    used: u64,
    percent: f64,
}

#[derive(Debug, Serialize)]
struct DiskUsage {
    total: u64,
    used: u64,
    free: u64,
    percent: f64,
}

#[derive(Debug, Serialize)]
struct ResourceReport {
    cpu_percent: f32,
    memory: MemoryUsage,
    disk: Option<DiskUsage>,
}

#[derive(Debug, Serialize)]
struct ProcessEntry {
    pid: u32,
    name: String,
    cpu_percent: f32,
    memory_percent: f64,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 1000.0).round() / 10.0
    }
}

/// Run a `sysinfo` scan on the blocking pool.
async fn blocking<T, F>(tool_name: &str, scan: F) -> Result<T, ToolError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(scan)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: e.to_string(),
        })
}

/// A `System` whose CPU figures cover at least one sampling interval.
async fn sampled_system(tool_name: &str) -> Result<System, ToolError> {
    let mut sys = blocking(tool_name, System::new_all).await?;
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    blocking(tool_name, move || {
        sys.refresh_all();
        sys
    })
    .await
}

fn root_disk() -> Option<DiskUsage> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first())
        .map(|d| {
            let total = d.total_space();
            let free = d.available_space();
            let used = total.saturating_sub(free);
            DiskUsage {
                total,
                used,
                free,
                percent: percent(used, total),
            }
        })
}

fn to_output<T: Serialize>(value: &T) -> Result<ToolOutput, ToolError> {
    let content = serde_json::to_value(value).map_err(|e| ToolError::ExecutionFailed {
        tool_name: "system".into(),
        reason: e.to_string(),
    })?;
    Ok(ToolOutput {
        content,
        is_error: false,
    })
}

/// CPU, memory and root-disk usage as JSON.
pub struct SystemResourcesTool;

#[async_trait]
impl Tool for SystemResourcesTool {
    fn name(&self) -> &str {
        "get_system_resources"
    }

    fn description(&self) -> &str {
        "Get current system resource usage (CPU, memory, disk)."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn cacheable(&self) -> bool {
        true
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let sys = sampled_system(self.name()).await?;
        let disk = blocking(self.name(), root_disk).await?;
        let total = sys.total_memory();
        let used = sys.used_memory();
        let report = ResourceReport {
            cpu_percent: sys.global_cpu_usage(),
            memory: MemoryUsage {
                total,
                available: sys.available_memory(),
                used,
                percent: percent(used, total),
            },
            disk,
        };
        to_output(&report)
    }
}

/// Running processes with their CPU and memory share.
pub struct ProcessInfoTool;

#[async_trait]
impl Tool for ProcessInfoTool {
    fn name(&self) -> &str {
        "get_process_info"
    }

    fn description(&self) -> &str {
        "Get information about running processes."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn cacheable(&self) -> bool {
        true
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let sys = sampled_system(self.name()).await?;
        let total = sys.total_memory();
        let mut processes: Vec<ProcessEntry> = sys
            .processes()
            .iter()
            .map(|(pid, p)| ProcessEntry {
                pid: pid.as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu_percent: p.cpu_usage(),
                memory_percent: percent(p.memory(), total),
            })
            .collect();
        processes.sort_by_key(|p| p.pid);
        to_output(&processes)
    }
}
