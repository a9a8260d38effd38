//! The Agent strategy interface (§4.11): `Agent`, `AgentOutput`,
//! `AgentContext`, the `LlmClient` boundary, and built-in agents.

pub mod agent;
pub mod chat;
pub mod context;
pub mod fake;
pub mod llm;
pub mod output;

pub use agent::Agent;
pub use chat::ChatAgent;
pub use context::AgentContext;
pub use fake::FakeLlmClient;
pub use llm::{LlmClient, LlmCompletion};
pub use output::AgentOutput;
