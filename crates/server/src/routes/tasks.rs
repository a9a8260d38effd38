//! Task command and query routes (§6): create/cancel/pause/resume/
//! add-instruction, group-create, interaction-respond, and the read side
//! (listing, detail, events, pending interaction, conversation messages).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use seed_domain::{InteractionResponse, TaskPriority, TaskView};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_ACTOR: &str = "user";

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub intent: String,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub author_actor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Json<CreateTaskResponse>> {
    let task_id = state.kernel.create_task(
        req.title,
        req.intent,
        req.priority.unwrap_or_default(),
        req.agent_id,
        req.parent_task_id,
        req.author_actor_id.as_deref().unwrap_or(DEFAULT_ACTOR),
    )?;
    Ok(Json(CreateTaskResponse { task_id }))
}

#[derive(Debug, Deserialize)]
pub struct GroupCreateRequest {
    pub tasks: Vec<CreateTaskRequest>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupCreateResponse {
    pub task_ids: Vec<String>,
}

/// Create several sibling tasks in one call, each parented under
/// `parent_task_id` (or its own `parent_task_id` if it set one). Each task
/// is still an independent `TaskCreated` append — there is no atomicity
/// across the group beyond "each one either lands or the handler returns
/// the first error", since the Event Store has no multi-stream transaction.
pub async fn group_create(
    State(state): State<AppState>,
    Json(req): Json<GroupCreateRequest>,
) -> ApiResult<Json<GroupCreateResponse>> {
    let mut task_ids = Vec::with_capacity(req.tasks.len());
    for task in req.tasks {
        let parent = task.parent_task_id.or_else(|| req.parent_task_id.clone());
        let task_id = state.kernel.create_task(
            task.title,
            task.intent,
            task.priority.unwrap_or_default(),
            task.agent_id,
            parent,
            task.author_actor_id.as_deref().unwrap_or(DEFAULT_ACTOR),
        )?;
        task_ids.push(task_id);
    }
    Ok(Json(GroupCreateResponse { task_ids }))
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskView>> {
    Json(state.kernel.list_tasks())
}

pub async fn get_task(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult<Json<TaskView>> {
    state
        .kernel
        .get_task(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct ActorOnlyRequest {
    #[serde(default)]
    pub author_actor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub author_actor_id: Option<String>,
}

pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .kernel
        .cancel_task(&task_id, req.reason, req.author_actor_id.as_deref().unwrap_or(DEFAULT_ACTOR))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn pause_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .kernel
        .pause_task(&task_id, req.reason, req.author_actor_id.as_deref().unwrap_or(DEFAULT_ACTOR))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn resume_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(req): Json<ActorOnlyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .kernel
        .resume_task(&task_id, req.author_actor_id.as_deref().unwrap_or(DEFAULT_ACTOR))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct AddInstructionRequest {
    pub text: String,
    #[serde(default)]
    pub author_actor_id: Option<String>,
}

pub async fn add_instruction(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(req): Json<AddInstructionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.kernel.add_instruction(
        &task_id,
        req.text,
        req.author_actor_id.as_deref().unwrap_or(DEFAULT_ACTOR),
    )?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct RespondInteractionRequest {
    #[serde(flatten)]
    pub response: InteractionResponse,
    #[serde(default)]
    pub author_actor_id: Option<String>,
}

pub async fn respond_interaction(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(req): Json<RespondInteractionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .kernel
        .respond_interaction(&task_id, req.response, req.author_actor_id.as_deref().unwrap_or(DEFAULT_ACTOR))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn pending_interaction(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Json<Option<seed_domain::InteractionRequest>> {
    Json(state.kernel.interactions().pending_interaction(&task_id))
}

pub async fn conversation_messages(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Vec<seed_domain::LlmMessage>>> {
    Ok(Json(state.kernel.conversation.get_messages(&task_id)?))
}

#[derive(Debug, Deserialize)]
pub struct EventsAfterQuery {
    #[serde(default)]
    pub after: Option<u64>,
}

pub async fn events_after(
    State(state): State<AppState>,
    Query(query): Query<EventsAfterQuery>,
) -> Json<Vec<seed_domain::StoredEvent>> {
    Json(state.kernel.events_after(query.after.unwrap_or(0)))
}

#[derive(Debug, Deserialize)]
pub struct TaskEventsQuery {
    #[serde(default)]
    pub from_seq: Option<u64>,
}

pub async fn task_events(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Query(query): Query<TaskEventsQuery>,
) -> Json<Vec<seed_domain::StoredEvent>> {
    Json(state.kernel.events_for_task(&task_id, query.from_seq.unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_defaults_to_user_when_omitted() {
        let req: ActorOnlyRequest = serde_json::from_str("{}").unwrap();
        assert!(req.author_actor_id.is_none());
    }

    #[test]
    fn respond_request_flattens_interaction_response_fields() {
        let req: RespondInteractionRequest = serde_json::from_str(
            r#"{"interaction_id":"ui_1","selected_option_id":"approve"}"#,
        )
        .unwrap();
        assert_eq!(req.response.interaction_id, "ui_1");
        assert_eq!(req.response.selected_option_id.as_deref(), Some("approve"));
    }
}
