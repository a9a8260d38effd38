//! A per-task artifact store: a plain directory tools can write large
//! outputs into (file contents, diffs) instead of inlining them into the
//! tool result/conversation history.

use std::path::PathBuf;

use seed_domain::Result;

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(task_dir: impl Into<PathBuf>) -> Self {
        Self { dir: task_dir.into() }
    }

    pub fn write(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.dir.join(name))?)
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}
