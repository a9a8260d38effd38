/// Shared error type used across all Seed crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("invalid transition: event {event} not valid from status {from}")]
    InvalidTransition { from: String, event: String },

    #[error("no pending interaction for task {task_id}")]
    NoPendingInteraction { task_id: String },

    #[error("stale interaction: expected {expected}, got {got}")]
    StaleInteraction { expected: String, got: String },

    #[error("subtask depth exceeded: max {max}")]
    DepthExceeded { max: u32 },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
