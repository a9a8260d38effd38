//! The Conversation Store (§4.2): an append-only, per-task ordered list of
//! `LLMMessage`, persisted as one JSONL file per task (one record per line)
//! and kept fully in memory per task for fast `getMessages`.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use seed_domain::{Error, LlmMessage, Result};
use serde::{Deserialize, Serialize};

/// One persisted conversation line: `{taskId, index, message, createdAt}`
/// (§6 "Conversation log").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub task_id: String,
    pub index: u64,
    pub message: LlmMessage,
    pub created_at: DateTime<Utc>,
}

struct TaskLog {
    records: Vec<ConversationRecord>,
}

/// Durable, ordered per-task log of LLM messages. No deduplication here —
/// idempotency against re-delivery is the Conversation Manager's job.
pub struct ConversationStore {
    data_dir: PathBuf,
    tasks: RwLock<HashMap<String, TaskLog>>,
}

impl ConversationStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            tasks: RwLock::new(HashMap::new()),
        })
    }

    fn path_for(&self, task_id: &str) -> PathBuf {
        self.data_dir.join(format!("{task_id}.jsonl"))
    }

    fn load(&self, task_id: &str) -> Result<TaskLog> {
        let path = self.path_for(task_id);
        let mut records = Vec::new();
        if let Ok(raw) = std::fs::read_to_string(&path) {
            for line in raw.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ConversationRecord>(line) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(task_id, error = %e, "skipping malformed conversation line");
                    }
                }
            }
        }
        Ok(TaskLog { records })
    }

    fn rewrite(&self, task_id: &str, records: &[ConversationRecord]) -> Result<()> {
        let path = self.path_for(task_id);
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            for record in records {
                writeln!(file, "{}", serde_json::to_string(record)?)?;
            }
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Append `message` to `task_id`'s log, assigning the next sequential
    /// index.
    pub fn append(&self, task_id: &str, message: LlmMessage) -> Result<ConversationRecord> {
        let mut tasks = self.tasks.write();
        if !tasks.contains_key(task_id) {
            let loaded = self.load(task_id)?;
            tasks.insert(task_id.to_string(), loaded);
        }
        let log = tasks.get_mut(task_id).expect("just inserted");
        let index = log.records.last().map(|r| r.index + 1).unwrap_or(0);
        let record = ConversationRecord {
            task_id: task_id.to_string(),
            index,
            message,
            created_at: Utc::now(),
        };

        let path = self.path_for(task_id);
        let json = serde_json::to_string(&record)?;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{json}").map_err(Error::Io)?;

        log.records.push(record.clone());
        Ok(record)
    }

    /// All messages for `task_id`, in append order.
    pub fn get_messages(&self, task_id: &str) -> Result<Vec<LlmMessage>> {
        let mut tasks = self.tasks.write();
        if !tasks.contains_key(task_id) {
            let loaded = self.load(task_id)?;
            tasks.insert(task_id.to_string(), loaded);
        }
        Ok(tasks
            .get(task_id)
            .expect("just inserted")
            .records
            .iter()
            .map(|r| r.message.clone())
            .collect())
    }

    /// Discard the entire history for `task_id`.
    pub fn clear(&self, task_id: &str) -> Result<()> {
        let mut tasks = self.tasks.write();
        tasks.insert(task_id.to_string(), TaskLog { records: Vec::new() });
        self.rewrite(task_id, &[])
    }

    /// Discard every record with `index >= index`, keeping the prefix.
    pub fn truncate(&self, task_id: &str, index: u64) -> Result<()> {
        let mut tasks = self.tasks.write();
        if !tasks.contains_key(task_id) {
            let loaded = self.load(task_id)?;
            tasks.insert(task_id.to_string(), loaded);
        }
        let log = tasks.get_mut(task_id).expect("just inserted");
        log.records.retain(|r| r.index < index);
        self.rewrite(task_id, &log.records)
    }
}
