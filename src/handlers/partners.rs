use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    services::partners::{CreatePartnerRequest, PartnerType, UpdatePartnerRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PartnerTypeFilter {
    pub partner_type: Option<String>,
}

/// Create a new partner
async fn create_partner(
    State(state): State<AppState>,
    Json(payload): Json<CreatePartnerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let partner = state
        .services
        .partners
        .create_partner(payload)
        .await
        .map_err(map_service_error)?;

    info!("Partner created: {}", partner.id);

    Ok(created_response(partner))
}

/// Get a partner by ID
async fn get_partner(
    State(state): State<AppState>,
    Path(partner_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = state
        .services
        .partners
        .get_partner(partner_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Partner with ID {} not found", partner_id)))?;

    Ok(success_response(partner))
}

/// List partners with pagination, optionally filtered by type
async fn list_partners(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<PartnerTypeFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let partner_type = filter
        .partner_type
        .as_deref()
        .map(PartnerType::parse)
        .transpose()
        .map_err(map_service_error)?;

    let partners = state
        .services
        .partners
        .list_partners(partner_type, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(partners))
}

/// List partners of one type (customers, suppliers, expeditions)
async fn list_partners_by_type(
    State(state): State<AppState>,
    Path(partner_type): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let partner_type = PartnerType::parse(&partner_type).map_err(map_service_error)?;

    let partners = state
        .services
        .partners
        .list_partners(Some(partner_type), pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(partners))
}

/// Update a partner
async fn update_partner(
    State(state): State<AppState>,
    Path(partner_id): Path<Uuid>,
    Json(payload): Json<UpdatePartnerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let partner = state
        .services
        .partners
        .update_partner(partner_id, payload)
        .await
        .map_err(map_service_error)?;

    info!("Partner updated: {}", partner_id);

    Ok(success_response(partner))
}

/// Delete a partner
async fn delete_partner(
    State(state): State<AppState>,
    Path(partner_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .partners
        .delete_partner(partner_id)
        .await
        .map_err(map_service_error)?;

    info!("Partner deleted: {}", partner_id);

    Ok(no_content_response())
}

/// Creates the router for partner endpoints
pub fn partner_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_partner))
        .route("/", get(list_partners))
        .route("/:id", get(get_partner))
        .route("/:id", put(update_partner))
        .route("/:id", delete(delete_partner))
        .route("/type/:partner_type", get(list_partners_by_type))
}
