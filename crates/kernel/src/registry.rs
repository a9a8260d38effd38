//! Maps agent id to the `Agent` strategy object that implements it (§3
//! "Agent", §4.11). Populated once at bootstrap, read-only afterward —
//! mirrors `seed_tools::ToolRegistry`.

use std::collections::HashMap;
use std::sync::Arc;

use seed_agents::Agent;

#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.id().to_string(), agent);
    }

    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(agent_id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seed_agents::ChatAgent;

    #[test]
    fn register_and_lookup() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(ChatAgent::new("agent_seed_chat")));
        assert!(registry.get("agent_seed_chat").is_some());
        assert!(registry.get("nonexistent").is_none());
    }
}
