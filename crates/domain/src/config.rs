use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration, composed of one section per concern so each
/// crate can depend on just the slice it needs without pulling in the rest.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub kernel: KernelConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where and how often the append-only stores checkpoint to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Write a `Task Projection` checkpoint every N appended events, so a
    /// restart only has to replay the tail of the stream (§4.4 "Projection
    /// checkpointing").
    pub projection_checkpoint_interval: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            projection_checkpoint_interval: 50,
        }
    }
}

impl StorageConfig {
    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }

    pub fn conversation_path(&self, task_id: &str) -> PathBuf {
        self.data_dir.join("conversations").join(format!("{task_id}.jsonl"))
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join("audit.jsonl")
    }

    pub fn projections_path(&self) -> PathBuf {
        self.data_dir.join("projections.json")
    }
}

/// Runtime Manager / Agent Runtime behavior (§4.8, §4.9, §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// How long the Interaction Service waits for a response before the
    /// pending interaction is considered stale (§4.10, default 300s).
    pub interaction_timeout_secs: u64,
    /// Max depth of the subtask tree before `DepthExceeded` (§4.12).
    pub max_subtask_depth: u32,
    /// Whether agents may stream `Text`/`Reasoning` chunks to the UI as
    /// they're produced, versus only emitting once per turn.
    pub streaming_enabled: bool,
    /// Cap on the tool-call loop within a single agent turn, a circuit
    /// breaker against runaway tool use.
    pub max_tool_loops: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            interaction_timeout_secs: 300,
            max_subtask_depth: 5,
            streaming_enabled: true,
            max_tool_loops: 25,
        }
    }
}

impl KernelConfig {
    pub fn interaction_timeout(&self) -> Duration {
        Duration::from_secs(self.interaction_timeout_secs)
    }
}

/// Network boundary configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// SHA-256 hex digest of the bearer token required on every request.
    /// `None` disables auth, which is only valid for local/dev use.
    pub bearer_token_hash: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".into(),
            bearer_token_hash: None,
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults for any section the
    /// file omits.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kernel.max_subtask_depth == 0 {
            return Err(Error::Config("kernel.max_subtask_depth must be >= 1".into()));
        }
        if self.kernel.max_tool_loops == 0 {
            return Err(Error::Config("kernel.max_tool_loops must be >= 1".into()));
        }
        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(Error::Config(format!(
                "server.bind_addr is not a valid socket address: {}",
                self.server.bind_addr
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn load_applies_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"/tmp/seed-data\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/seed-data"));
        assert_eq!(config.kernel.max_subtask_depth, 5);
    }

    #[test]
    fn rejects_zero_subtask_depth() {
        let mut config = Config::default();
        config.kernel.max_subtask_depth = 0;
        assert!(config.validate().is_err());
    }
}
