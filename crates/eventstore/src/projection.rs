//! Projection checkpointing (§4.4): periodically persist the folded state
//! of a stream so a restart can resume from the checkpoint instead of
//! replaying the whole log. The checkpoint store itself is generic over the
//! projected value — the Task Projection is `seed-kernel`'s concern, this
//! crate only owns "where do checkpoints live and how are they loaded".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use seed_domain::Result;
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Checkpoint {
    seq: u64,
    state: serde_json::Value,
}

/// File-backed checkpoint table, one entry per stream, rewritten wholesale
/// on every save (checkpoints are small and infrequent relative to event
/// appends, unlike the event log itself).
pub struct ProjectionStore {
    path: PathBuf,
    table: RwLock<HashMap<String, Checkpoint>>,
}

impl ProjectionStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("projections.json");
        let table = if let Ok(raw) = std::fs::read_to_string(&path) {
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    /// The last checkpointed `(seq, state)` for `stream_id`, if any.
    pub fn load<T: DeserializeOwned>(&self, stream_id: &str) -> Result<Option<(u64, T)>> {
        let table = self.table.read();
        match table.get(stream_id) {
            Some(cp) => {
                let state = serde_json::from_value(cp.state.clone())?;
                Ok(Some((cp.seq, state)))
            }
            None => Ok(None),
        }
    }

    /// Persist a checkpoint for `stream_id` at `seq`, overwriting the
    /// previous one.
    pub fn save<T: Serialize>(&self, stream_id: &str, seq: u64, state: &T) -> Result<()> {
        let state = serde_json::to_value(state)?;
        {
            let mut table = self.table.write();
            table.insert(stream_id.to_string(), Checkpoint { seq, state });
        }
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        let table = self.table.read();
        let json = serde_json::to_string_pretty(&*table)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Fake {
        status: String,
    }

    #[test]
    fn round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ProjectionStore::open(dir.path()).unwrap();
            store
                .save(
                    "task-1",
                    5,
                    &Fake {
                        status: "done".into(),
                    },
                )
                .unwrap();
        }
        let reopened = ProjectionStore::open(dir.path()).unwrap();
        let (seq, state): (u64, Fake) = reopened.load("task-1").unwrap().unwrap();
        assert_eq!(seq, 5);
        assert_eq!(state.status, "done");
    }

    #[test]
    fn missing_stream_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectionStore::open(dir.path()).unwrap();
        assert!(store.load::<Fake>("missing").unwrap().is_none());
    }
}
