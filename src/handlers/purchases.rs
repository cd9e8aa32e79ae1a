use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    services::purchase_status::PurchaseStatus,
    services::purchases::{
        CreatePurchaseRequest, PurchaseItemInput, UpdatePurchaseRequest,
    },
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
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Create a purchase with its line items
async fn create_purchase(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let purchase = state
        .services
        .purchases
        .create_purchase(payload)
        .await
        .map_err(map_service_error)?;

    info!("Purchase created: {}", purchase.purchase.id);

    Ok(created_response(purchase))
}

/// Get a purchase with its items
async fn get_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let purchase = state
        .services
        .purchases
        .get_purchase(purchase_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Purchase with ID {} not found", purchase_id))
        })?;

    Ok(success_response(purchase))
}

/// List purchases, optionally filtered by status
async fn list_purchases(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let status = filter
        .status
        .as_deref()
        .map(PurchaseStatus::parse)
        .transpose()
        .map_err(map_service_error)?;

    let purchases = state
        .services
        .purchases
        .list_purchases(status, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(purchases))
}

/// Update a draft purchase header
async fn update_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(payload): Json<UpdatePurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let purchase = state
        .services
        .purchases
        .update_purchase(purchase_id, payload)
        .await
        .map_err(map_service_error)?;

    info!("Purchase updated: {}", purchase_id);

    Ok(success_response(purchase))
}

/// Append a line item to a draft purchase
async fn add_purchase_item(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(payload): Json<PurchaseItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .purchases
        .add_item(purchase_id, payload)
        .await
        .map_err(map_service_error)?;

    info!("Item {} added to purchase {}", item.id, purchase_id);

    Ok(created_response(item))
}

/// Materialize batches and roll up aggregates for a purchase
async fn generate_batches(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .purchases
        .generate_batches(purchase_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(outcome))
}

/// Move a purchase through its status lifecycle
async fn update_purchase_status(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = PurchaseStatus::parse(&payload.status).map_err(map_service_error)?;

    let purchase = state
        .services
        .purchases
        .update_status(purchase_id, status)
        .await
        .map_err(map_service_error)?;

    info!("Purchase {} status set to {}", purchase_id, status);

    Ok(success_response(purchase))
}

/// Delete a purchase and unwind its materialized records
async fn delete_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .purchases
        .delete_purchase(purchase_id)
        .await
        .map_err(map_service_error)?;

    info!("Purchase deleted: {}", purchase_id);

    Ok(no_content_response())
}

/// Creates the router for livestock purchase endpoints
pub fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase))
        .route("/", get(list_purchases))
        .route("/:id", get(get_purchase))
        .route("/:id", put(update_purchase))
        .route("/:id", delete(delete_purchase))
        .route("/:id/items", post(add_purchase_item))
        .route("/:id/generate-batches", post(generate_batches))
        .route("/:id/status", put(update_purchase_status))
}
