//! Harvest record HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppJson;
use crate::middleware::CurrentActor;
use crate::services::harvest_record::{
    CreateHarvestRecordInput, HarvestRecordService, ListHarvestRecordsQuery,
    UpdateHarvestRecordInput,
};
use crate::AppState;

/// List harvest records visible to the actor
pub async fn list_harvest_records(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListHarvestRecordsQuery>,
) -> impl IntoResponse {
    let service = HarvestRecordService::new(state.db.clone());

    match service.list(&actor, query).await {
        Ok(records) => (
            StatusCode::OK,
            Json(serde_json::json!({ "harvest_records": records })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Create a harvest record for a production cycle
pub async fn create_harvest_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    AppJson(input): AppJson<CreateHarvestRecordInput>,
) -> impl IntoResponse {
    let service = HarvestRecordService::new(state.db.clone());

    match service.create(&actor, input).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a harvest record with its crates
pub async fn get_harvest_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(record_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = HarvestRecordService::new(state.db.clone());

    match service.get(&actor, record_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Update a harvest record's date and notes
pub async fn update_harvest_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(record_id): Path<Uuid>,
    AppJson(input): AppJson<UpdateHarvestRecordInput>,
) -> impl IntoResponse {
    let service = HarvestRecordService::new(state.db.clone());

    match service.update(&actor, record_id, input).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Delete a DRAFT harvest record
pub async fn delete_harvest_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(record_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = HarvestRecordService::new(state.db.clone());

    match service.delete(&actor, record_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Submit a harvest record for approval
pub async fn submit_harvest_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(record_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = HarvestRecordService::new(state.db.clone());

    match service.submit(&actor, record_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Approve a submitted harvest record
pub async fn approve_harvest_record(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(record_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = HarvestRecordService::new(state.db.clone());

    match service.approve(&actor, record_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}
