//! Route registration (§6): a `public`/`protected` split, with the
//! bearer-token middleware applied only to the protected half.

pub mod audit;
pub mod runtime;
pub mod tasks;

use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::auth::require_bearer_token;
use crate::state::AppState;
use crate::ws;

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/healthz", get(healthz));

    let protected = Router::new()
        .route("/v1/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/v1/tasks/group", post(tasks::group_create))
        .route("/v1/tasks/:task_id", get(tasks::get_task))
        .route("/v1/tasks/:task_id/cancel", post(tasks::cancel_task))
        .route("/v1/tasks/:task_id/pause", post(tasks::pause_task))
        .route("/v1/tasks/:task_id/resume", post(tasks::resume_task))
        .route("/v1/tasks/:task_id/instructions", post(tasks::add_instruction))
        .route(
            "/v1/tasks/:task_id/interactions/respond",
            post(tasks::respond_interaction),
        )
        .route("/v1/tasks/:task_id/interactions/pending", get(tasks::pending_interaction))
        .route("/v1/tasks/:task_id/messages", get(tasks::conversation_messages))
        .route("/v1/tasks/:task_id/events", get(tasks::task_events))
        .route("/v1/events", get(tasks::events_after))
        .route("/v1/audit", get(audit::list_audit_entries))
        .route("/v1/runtime", get(runtime::runtime_info))
        .route("/v1/runtime/profile", post(runtime::set_profile))
        .route("/v1/runtime/streaming", post(runtime::set_streaming))
        .route("/v1/ws/events", get(ws::events_ws))
        .route("/v1/ws/ui", get(ws::ui_ws))
        .route_layer(middleware::from_fn_with_state(state, require_bearer_token));

    public.merge(protected).layer(tower_http::trace::TraceLayer::new_for_http())
}
