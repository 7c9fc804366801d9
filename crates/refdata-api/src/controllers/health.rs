//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Unauthenticated liveness endpoint."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::state::ApiState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    status: &'static str,
    database: &'static str,
    version: String,
    git_sha: String,
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match state.database.health_check().await {
        Ok(()) => (StatusCode::OK, "UP"),
        Err(err) => {
            warn!(error = %err, "database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "DOWN")
        }
    };
    let body = HealthResponse {
        status: if status == StatusCode::OK { "UP" } else { "DOWN" },
        database,
        version: state.version.version.clone(),
        git_sha: state.version.git_sha.clone(),
    };
    (status, Json(body))
}
