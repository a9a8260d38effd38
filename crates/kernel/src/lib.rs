//! The Seed kernel: the event-sourced core that turns a `TaskCreated`
//! event into a running agent, drains its tool calls and LLM round trips,
//! and routes user interactions and instructions back into the right
//! task's runtime. Built on `seed-domain`, `seed-eventstore`,
//! `seed-conversation`, `seed-audit`, `seed-tools` and `seed-agents`;
//! everything outside this crate (HTTP, CLI) talks to it through
//! `Kernel`.

pub mod interaction;
pub mod kernel;
pub mod manager;
pub mod output_handler;
pub mod projection;
pub mod registry;
pub mod runtime;
pub mod subtask;
pub mod ui;

pub use interaction::InteractionService;
pub use kernel::{Kernel, KernelConfig};
pub use manager::RuntimeManager;
pub use output_handler::{ExecutionScope, HandledOutput, OutputHandler};
pub use projection::{apply, TaskProjection, TasksProjectionState};
pub use registry::AgentRegistry;
pub use runtime::{AgentRuntime, RuntimeDeps, RuntimeOutcome};
pub use subtask::SubtaskTool;
pub use ui::{UiBus, UiEnvelope, UiEvent};
