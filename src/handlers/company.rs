use super::common::{created_response, map_service_error, success_response};
use crate::{
    errors::ApiError,
    services::company_config::MethodKind,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MethodQuery {
    pub kind: MethodKind,
}

/// Create a company
async fn create_company(
    State(state): State<AppState>,
    Json(payload): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::ValidationError(
            "Company name is required".to_string(),
        ));
    }

    let company = state
        .services
        .company
        .create_company(payload.name)
        .await
        .map_err(map_service_error)?;

    info!("Company created: {}", company.id);

    Ok(created_response(company))
}

/// Get a company row
async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let company = state
        .services
        .company
        .get_company(company_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Company with ID {} not found", company_id)))?;

    Ok(success_response(company))
}

/// Get the effective (defaults + overrides) configuration
async fn get_config(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state
        .services
        .company
        .effective_config(company_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(config))
}

/// Merge a patch into the stored config overrides
async fn patch_config(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(patch): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state
        .services
        .company
        .update_config(company_id, patch)
        .await
        .map_err(map_service_error)?;

    info!("Company {} config updated", company_id);

    Ok(success_response(config))
}

/// List livestock methods that are enabled and ready for one family
async fn available_methods(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<MethodQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state
        .services
        .company
        .effective_config(company_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(
        config.available_livestock_methods(query.kind),
    ))
}

/// Creates the router for company endpoints
pub fn company_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_company))
        .route("/:id", get(get_company))
        .route("/:id/config", get(get_config))
        .route("/:id/config", patch(patch_config))
        .route("/:id/config/livestock-methods", get(available_methods))
}
