use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    services::strains::{CreateStrainRequest, UpdateStrainRequest},
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

/// Create a new strain
async fn create_strain(
    State(state): State<AppState>,
    Json(payload): Json<CreateStrainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let strain = state
        .services
        .strains
        .create_strain(payload)
        .await
        .map_err(map_service_error)?;

    info!("Strain created: {}", strain.id);

    Ok(created_response(strain))
}

/// Get a strain by ID
async fn get_strain(
    State(state): State<AppState>,
    Path(strain_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let strain = state
        .services
        .strains
        .get_strain(strain_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Strain with ID {} not found", strain_id)))?;

    Ok(success_response(strain))
}

/// List strains with pagination
async fn list_strains(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let strains = state
        .services
        .strains
        .list_strains(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(strains))
}

/// Update a strain
async fn update_strain(
    State(state): State<AppState>,
    Path(strain_id): Path<Uuid>,
    Json(payload): Json<UpdateStrainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let strain = state
        .services
        .strains
        .update_strain(strain_id, payload)
        .await
        .map_err(map_service_error)?;

    info!("Strain updated: {}", strain_id);

    Ok(success_response(strain))
}

/// Delete a strain
async fn delete_strain(
    State(state): State<AppState>,
    Path(strain_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .strains
        .delete_strain(strain_id)
        .await
        .map_err(map_service_error)?;

    info!("Strain deleted: {}", strain_id);

    Ok(no_content_response())
}

/// Creates the router for strain endpoints
pub fn strain_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_strain))
        .route("/", get(list_strains))
        .route("/:id", get(get_strain))
        .route("/:id", put(update_strain))
        .route("/:id", delete(delete_strain))
}
