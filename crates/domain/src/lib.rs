//! Shared types for the Seed agent orchestration kernel: the domain event
//! model, task state machine, LLM message/tool-call shapes, structured user
//! interactions, configuration, and the crate-wide error type.

pub mod config;
pub mod error;
pub mod event;
pub mod interaction;
pub mod message;
pub mod stream;
pub mod task;
pub mod trace;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{DomainEvent, StoredEvent};
pub use interaction::{
    ContentKind, InteractionDisplay, InteractionKind, InteractionOption, InteractionRequest,
    InteractionResponse,
};
pub use message::{LlmMessage, ToolCallRequest, ToolDefinition};
pub use stream::{BoxStream, StreamChunk, Usage};
pub use task::{can_transition, next_status, DomainEventKind, TaskPriority, TaskStatus, TaskView};
pub use trace::TraceEvent;
