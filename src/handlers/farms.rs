use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    services::farms::{CreateFarmRequest, UpdateFarmRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use tracing::info;
use uuid::Uuid;

/// Create a new farm
async fn create_farm(
    State(state): State<AppState>,
    Json(payload): Json<CreateFarmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let farm = state
        .services
        .farms
        .create_farm(payload)
        .await
        .map_err(map_service_error)?;

    info!("Farm created: {}", farm.id);

    Ok(created_response(farm))
}

/// Get a farm by ID
async fn get_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let farm = state
        .services
        .farms
        .get_farm(farm_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Farm with ID {} not found", farm_id)))?;

    Ok(success_response(farm))
}

/// List farms with pagination
async fn list_farms(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let farms = state
        .services
        .farms
        .list_farms(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(farms))
}

/// List a farm's coops
async fn list_farm_coops(
    State(state): State<AppState>,
    Path(farm_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let coops = state
        .services
        .coops
        .list_coops(Some(farm_id), pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(coops))
}

/// Update a farm
async fn update_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<Uuid>,
    Json(payload): Json<UpdateFarmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let farm = state
        .services
        .farms
        .update_farm(farm_id, payload)
        .await
        .map_err(map_service_error)?;

    info!("Farm updated: {}", farm_id);

    Ok(success_response(farm))
}

/// Delete a farm
async fn delete_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .farms
        .delete_farm(farm_id)
        .await
        .map_err(map_service_error)?;

    info!("Farm deleted: {}", farm_id);

    Ok(no_content_response())
}

/// Creates the router for farm endpoints
pub fn farm_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_farm))
        .route("/", get(list_farms))
        .route("/:id", get(get_farm))
        .route("/:id", put(update_farm))
        .route("/:id", delete(delete_farm))
        .route("/:id/coops", get(list_farm_coops))
}
