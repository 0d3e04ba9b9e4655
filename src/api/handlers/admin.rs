use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::api::AppState;
use crate::services::orders::DashboardStats;
use crate::Result;

pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    Ok(Json(state.orders.dashboard().await?))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy", "service": "wscf-store" }))),
        Err(e) => {
            tracing::error!(error = %e, "storage health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unhealthy", "service": "wscf-store" })))
        }
    }
}
