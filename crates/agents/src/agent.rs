use async_trait::async_trait;
use seed_domain::BoxStream;

use crate::context::AgentContext;
use crate::output::AgentOutput;

/// A strategy object that turns a task + context into a lazy sequence of
/// outputs (§4.11). One `run` call is one pass over the agent's output
/// sequence: it makes at most one LLM round trip and yields whatever that
/// round trip produced. The Agent Runtime re-invokes `run` with refreshed
/// history to continue a multi-step tool loop (§4.8, §9 design notes).
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn description(&self) -> &str;
    /// Tool groups this agent is allowed to call (§3 "Agent"); an empty
    /// list means no restriction.
    fn tool_groups(&self) -> &[String];
    fn default_profile(&self) -> Option<&str> {
        None
    }

    async fn run(&self, ctx: AgentContext) -> BoxStream<'static, AgentOutput>;
}
