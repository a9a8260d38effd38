//! Audit log query route (§6 "audit entries").

use axum::extract::State;
use axum::Json;

use seed_audit::AuditEntry;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_audit_entries(State(state): State<AppState>) -> ApiResult<Json<Vec<AuditEntry>>> {
    Ok(Json(state.kernel.audit.read_all()?))
}
