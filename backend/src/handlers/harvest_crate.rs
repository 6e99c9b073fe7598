//! Harvest crate HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppJson;
use crate::middleware::CurrentActor;
use crate::services::harvest_crate::{AddCratesInput, HarvestCrateService, UpdateCrateInput};
use crate::AppState;

/// List the crates of a harvest record
pub async fn list_crates(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(record_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = HarvestCrateService::new(state.db.clone());

    match service.list(&actor, record_id).await {
        Ok(crates) => (
            StatusCode::OK,
            Json(serde_json::json!({ "crates": crates })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Add a batch of weighed crates to a harvest record
pub async fn add_crates(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(record_id): Path<Uuid>,
    AppJson(input): AppJson<AddCratesInput>,
) -> impl IntoResponse {
    let service = HarvestCrateService::new(state.db.clone());

    match service.add_crates(&actor, record_id, input).await {
        Ok(crates) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "crates": crates })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Update a single crate
pub async fn update_crate(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(crate_id): Path<Uuid>,
    AppJson(input): AppJson<UpdateCrateInput>,
) -> impl IntoResponse {
    let service = HarvestCrateService::new(state.db.clone());

    match service.update_crate(&actor, crate_id, input).await {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Delete a single crate
pub async fn delete_crate(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(crate_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = HarvestCrateService::new(state.db.clone());

    match service.delete_crate(&actor, crate_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
