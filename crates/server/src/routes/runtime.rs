//! Runtime info and control routes (§6): the profile/streaming toggles and
//! a read-only summary of what's registered (agents, tools) for a UI's
//! startup screen.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RuntimeInfo {
    pub agent_ids: Vec<String>,
    pub tools: Vec<seed_domain::ToolDefinition>,
}

pub async fn runtime_info(State(state): State<AppState>) -> Json<RuntimeInfo> {
    Json(RuntimeInfo {
        agent_ids: state.kernel.agents.ids(),
        tools: state.kernel.tools.definitions(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ProfileOverrideRequest {
    /// A task id, or `"*"` to set the default for every task without its
    /// own override.
    pub target: String,
    pub profile: String,
}

pub async fn set_profile(State(state): State<AppState>, Json(req): Json<ProfileOverrideRequest>) -> ApiResult<Json<serde_json::Value>> {
    state.kernel.manager.set_profile_override(req.target, req.profile);
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct StreamingRequest {
    pub target: String,
    pub enabled: bool,
}

pub async fn set_streaming(State(state): State<AppState>, Json(req): Json<StreamingRequest>) -> ApiResult<Json<serde_json::Value>> {
    state.kernel.manager.set_streaming_override(req.target, req.enabled);
    Ok(Json(serde_json::json!({ "ok": true })))
}
