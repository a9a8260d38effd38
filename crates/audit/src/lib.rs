//! The Audit Log (§4.3): an append-only trace of tool-call requests and
//! results, separate from the Event Store so the UI boundary can tail it
//! without subscribing to `events$` (the kernel proper never reads it
//! back — it is write-only from the kernel's perspective). JSONL persistence
//! plus a broadcast channel for live tailing; no bounded in-memory ring,
//! since audit entries are read by the UI as a tail, not looked up by id.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use seed_domain::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const AUDIT_CHANNEL_CAPACITY: usize = 1024;

/// One audit entry: a tool call's request and, once it finishes, its result
/// (§4.3, §6 "Audit log").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub task_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub requested_at: DateTime<Utc>,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub is_error: bool,
}

/// Live delta published on every audit write, for the UI boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditDelta {
    #[serde(rename = "tool_call_requested")]
    Requested { entry: AuditEntry },
    #[serde(rename = "tool_call_completed")]
    Completed { entry: AuditEntry },
}

pub struct AuditLog {
    path: PathBuf,
    file: Mutex<()>,
    publish: broadcast::Sender<AuditDelta>,
}

impl AuditLog {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join("audit.jsonl"),
            file: Mutex::new(()),
            publish: broadcast::channel(AUDIT_CHANNEL_CAPACITY).0,
        })
    }

    fn append_line(&self, entry: &AuditEntry) -> Result<()> {
        let _guard = self.file.lock();
        let json = serde_json::to_string(entry)?;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{json}")?;
        Ok(())
    }

    /// Record a tool call about to execute.
    pub fn record_requested(
        &self,
        task_id: &str,
        tool_call_id: &str,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Result<AuditEntry> {
        let entry = AuditEntry {
            task_id: task_id.to_string(),
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            requested_at: Utc::now(),
            input,
            completed_at: None,
            duration_ms: None,
            output: None,
            is_error: false,
        };
        self.append_line(&entry)?;
        let _ = self.publish.send(AuditDelta::Requested { entry: entry.clone() });
        Ok(entry)
    }

    /// Record the result of a previously-requested tool call. Appends a
    /// second, fully-populated entry rather than mutating the first — the
    /// log is append-only, so a reader joins request/result pairs by
    /// `tool_call_id` (mirroring how `DomainEvent` pairs work in the event
    /// log).
    pub fn record_completed(
        &self,
        requested: &AuditEntry,
        output: serde_json::Value,
        is_error: bool,
    ) -> Result<AuditEntry> {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - requested.requested_at)
            .num_milliseconds()
            .max(0) as u64;
        let entry = AuditEntry {
            completed_at: Some(completed_at),
            duration_ms: Some(duration_ms),
            output: Some(output),
            is_error,
            ..requested.clone()
        };
        self.append_line(&entry)?;
        let _ = self.publish.send(AuditDelta::Completed { entry: entry.clone() });
        Ok(entry)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditDelta> {
        self.publish.subscribe()
    }

    /// Every entry on disk, oldest first, for the audit-entries query
    /// endpoint (§6). Request/result pairs share a `tool_call_id` but are
    /// separate lines — the caller joins them if it needs to.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Ok(Vec::new());
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}
