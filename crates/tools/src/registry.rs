use std::collections::HashMap;
use std::sync::Arc;

use crate::tool::{tool_definition, Tool};

/// Maps tool name to `Tool`. Read-only after startup (§6 "Shared-resource
/// policy"): tools are registered once during bootstrap, never mutated
/// afterward.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<seed_domain::ToolDefinition> {
        self.tools.values().map(|t| tool_definition(t.as_ref())).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::read_file::ReadFileTool;

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ReadFileTool));
        assert!(registry.get("read_file").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.definitions().len(), 1);
    }
}
