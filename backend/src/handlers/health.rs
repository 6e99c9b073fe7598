//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// Readiness probe: reports the service identity and whether the
/// database pool can execute a query
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
    {
        Ok(_) => "connected",
        Err(_) => "unreachable",
    };

    Json(HealthResponse {
        status: if database == "connected" {
            "healthy"
        } else {
            "degraded"
        },
        service: "agriops-backend",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
