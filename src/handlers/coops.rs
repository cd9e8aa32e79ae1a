use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    services::coops::{CreateCoopRequest, UpdateCoopRequest},
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

/// Create a new coop
async fn create_coop(
    State(state): State<AppState>,
    Json(payload): Json<CreateCoopRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let coop = state
        .services
        .coops
        .create_coop(payload)
        .await
        .map_err(map_service_error)?;

    info!("Coop created: {}", coop.id);

    Ok(created_response(coop))
}

/// Get a coop by ID
async fn get_coop(
    State(state): State<AppState>,
    Path(coop_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let coop = state
        .services
        .coops
        .get_coop(coop_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Coop with ID {} not found", coop_id)))?;

    Ok(success_response(coop))
}

/// List coops with pagination
async fn list_coops(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let coops = state
        .services
        .coops
        .list_coops(None, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(coops))
}

/// Update a coop
async fn update_coop(
    State(state): State<AppState>,
    Path(coop_id): Path<Uuid>,
    Json(payload): Json<UpdateCoopRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let coop = state
        .services
        .coops
        .update_coop(coop_id, payload)
        .await
        .map_err(map_service_error)?;

    info!("Coop updated: {}", coop_id);

    Ok(success_response(coop))
}

/// Delete a coop
async fn delete_coop(
    State(state): State<AppState>,
    Path(coop_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .coops
        .delete_coop(coop_id)
        .await
        .map_err(map_service_error)?;

    info!("Coop deleted: {}", coop_id);

    Ok(no_content_response())
}

/// Creates the router for coop endpoints
pub fn coop_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_coop))
        .route("/", get(list_coops))
        .route("/:id", get(get_coop))
        .route("/:id", put(update_coop))
        .route("/:id", delete(delete_coop))
}
