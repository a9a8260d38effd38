//! The Event Store: an append-only per-stream log with a single global
//! ordering, backed by a JSONL file plus an in-memory index and unbounded in
//! memory — the event log is the system of record, not a UI cache, so
//! nothing is ever evicted (I1, I2).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use seed_domain::{DomainEvent, Error, Result, StoredEvent};
use tokio::sync::broadcast;

const EVENTS_CHANNEL_CAPACITY: usize = 4096;

struct Inner {
    /// Append-order log; `all[i].id == i as u64 + 1`.
    all: Vec<StoredEvent>,
    /// `stream_id` -> indices into `all`, in seq order.
    by_stream: HashMap<String, Vec<usize>>,
    /// `stream_id` -> last assigned seq.
    stream_seq: HashMap<String, u64>,
}

impl Inner {
    fn next_id(&self) -> u64 {
        self.all.len() as u64 + 1
    }

    fn next_seq(&self, stream_id: &str) -> u64 {
        self.stream_seq.get(stream_id).copied().unwrap_or(0) + 1
    }
}

/// Append-only, globally ordered event log keyed by task (`stream_id ==
/// task_id`, §4.1). Appends are serialized through a single write lock so
/// global id assignment and per-stream seq assignment can never race (I1,
/// I2, I3).
pub struct EventStore {
    inner: RwLock<Inner>,
    log_path: PathBuf,
    publish: broadcast::Sender<StoredEvent>,
}

impl EventStore {
    /// Open (or create) the event log at `data_dir/events.jsonl`, replaying
    /// every line into memory.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let log_path = data_dir.join("events.jsonl");

        let mut all = Vec::new();
        let mut by_stream: HashMap<String, Vec<usize>> = HashMap::new();
        let mut stream_seq: HashMap<String, u64> = HashMap::new();

        if let Ok(content) = std::fs::read_to_string(&log_path) {
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let stored: StoredEvent = serde_json::from_str(line).map_err(|e| {
                    Error::Other(format!(
                        "corrupt event log at {}:{}: {e}",
                        log_path.display(),
                        line_no + 1
                    ))
                })?;
                by_stream.entry(stored.stream_id.clone()).or_default().push(all.len());
                stream_seq.insert(stored.stream_id.clone(), stored.seq);
                all.push(stored);
            }
        }

        tracing::info!(recovered = all.len(), path = %log_path.display(), "event store opened");

        Ok(Self {
            inner: RwLock::new(Inner {
                all,
                by_stream,
                stream_seq,
            }),
            log_path,
            publish: broadcast::channel(EVENTS_CHANNEL_CAPACITY).0,
        })
    }

    /// Append `events` to their respective streams (each event carries its
    /// own `stream_id`), assigning global ids and per-stream seqs in order,
    /// persisting to disk, and publishing each to `events$`.
    ///
    /// All events in one call are appended under a single write-lock
    /// acquisition so a batch (e.g. `TaskCreated` + `TaskStarted`) is never
    /// observed partially by a concurrent reader.
    pub fn append(&self, events: Vec<DomainEvent>) -> Result<Vec<StoredEvent>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut inner = self.inner.write();
        let mut stored_batch = Vec::with_capacity(events.len());
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        for event in events {
            let stream_id = event.stream_id().to_string();
            let id = inner.next_id();
            let seq = inner.next_seq(&stream_id);
            let stored = StoredEvent {
                id,
                stream_id: stream_id.clone(),
                seq,
                event,
                created_at: chrono::Utc::now(),
            };

            let json = serde_json::to_string(&stored)?;
            writeln!(file, "{json}")?;

            inner.by_stream.entry(stream_id.clone()).or_default().push(inner.all.len());
            inner.stream_seq.insert(stream_id, seq);
            inner.all.push(stored.clone());
            stored_batch.push(stored);
        }
        file.sync_data().ok();
        drop(inner);

        for stored in &stored_batch {
            let _ = self.publish.send(stored.clone());
        }

        Ok(stored_batch)
    }

    pub fn append_one(&self, event: DomainEvent) -> Result<StoredEvent> {
        self.append(vec![event]).map(|mut v| v.remove(0))
    }

    /// All events with global id strictly greater than `after_id`, across
    /// every stream, in global order.
    pub fn read_all(&self, after_id: u64) -> Vec<StoredEvent> {
        let inner = self.inner.read();
        inner.all.iter().filter(|e| e.id > after_id).cloned().collect()
    }

    /// Events in `stream_id` with seq >= `from_seq`, in seq order.
    pub fn read_stream(&self, stream_id: &str, from_seq: u64) -> Vec<StoredEvent> {
        let inner = self.inner.read();
        let Some(indices) = inner.by_stream.get(stream_id) else {
            return Vec::new();
        };
        indices
            .iter()
            .filter_map(|&i| inner.all.get(i))
            .filter(|e| e.seq >= from_seq)
            .cloned()
            .collect()
    }

    pub fn read_by_id(&self, id: u64) -> Option<StoredEvent> {
        let inner = self.inner.read();
        inner.all.get(id.checked_sub(1)? as usize).cloned()
    }

    /// Subscribe to every event appended from this point forward (`events$`,
    /// §4.1). Subscribers that fall too far behind the channel's capacity
    /// observe a `Lagged` error and should fall back to `read_all`.
    pub fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.publish.subscribe()
    }

    pub fn stream_len(&self, stream_id: &str) -> u64 {
        let inner = self.inner.read();
        inner.stream_seq.get(stream_id).copied().unwrap_or(0)
    }

    /// The global id of the most recently appended event, or 0 if the log
    /// is empty. Cheap (no clone of the log) — used to tell a live
    /// subscriber it has caught up.
    pub fn latest_id(&self) -> u64 {
        self.inner.read().all.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seed_domain::DomainEvent;

    fn created(task_id: &str) -> DomainEvent {
        DomainEvent::TaskCreated {
            task_id: task_id.into(),
            title: "t".into(),
            intent: "i".into(),
            priority: Default::default(),
            agent_id: None,
            parent_task_id: None,
            author_actor_id: "user".into(),
        }
    }

    fn started(task_id: &str) -> DomainEvent {
        DomainEvent::TaskStarted {
            task_id: task_id.into(),
            author_actor_id: "agent".into(),
        }
    }

    #[test]
    fn global_id_and_seq_are_monotonic_per_stream() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();

        let a1 = store.append_one(created("a")).unwrap();
        let b1 = store.append_one(created("b")).unwrap();
        let a2 = store.append_one(started("a")).unwrap();

        assert_eq!((a1.id, a1.seq), (1, 1));
        assert_eq!((b1.id, b1.seq), (2, 1));
        assert_eq!((a2.id, a2.seq), (3, 2));
    }

    #[test]
    fn read_stream_is_isolated_per_stream() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        store.append_one(created("a")).unwrap();
        store.append_one(created("b")).unwrap();
        store.append_one(started("a")).unwrap();

        let stream_a = store.read_stream("a", 1);
        assert_eq!(stream_a.len(), 2);
        assert!(stream_a.iter().all(|e| e.stream_id == "a"));
    }

    #[test]
    fn reopen_replays_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EventStore::open(dir.path()).unwrap();
            store.append_one(created("a")).unwrap();
            store.append_one(started("a")).unwrap();
        }
        let reopened = EventStore::open(dir.path()).unwrap();
        assert_eq!(reopened.read_all(0).len(), 2);
        assert_eq!(reopened.stream_len("a"), 2);
        // Next append continues the sequence rather than restarting it.
        let next = reopened.append_one(DomainEvent::TaskCompleted {
            task_id: "a".into(),
            summary: None,
            author_actor_id: "agent".into(),
        });
        assert_eq!(next.unwrap().seq, 3);
    }

    #[test]
    fn subscribers_observe_appended_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let mut rx = store.subscribe();
        store.append_one(created("a")).unwrap();
        let received = rx.try_recv().unwrap();
        assert_eq!(received.stream_id, "a");
    }

    #[test]
    fn read_by_id_is_one_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let stored = store.append_one(created("a")).unwrap();
        assert_eq!(store.read_by_id(stored.id).unwrap().stream_id, "a");
        assert!(store.read_by_id(0).is_none());
    }
}
