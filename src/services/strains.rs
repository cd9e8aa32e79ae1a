use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::livestock_purchase_item::{self, Entity as PurchaseItemEntity},
    entities::livestock_strain::{self, Entity as StrainEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateStrainRequest {
    #[validate(length(min = 1, max = 30, message = "Strain code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "Strain name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateStrainRequest {
    #[validate(length(min = 1, max = 100, message = "Strain name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StrainListResponse {
    pub strains: Vec<livestock_strain::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing livestock strain master data
#[derive(Clone)]
pub struct StrainService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl StrainService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new strain
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_strain(
        &self,
        request: CreateStrainRequest,
    ) -> Result<livestock_strain::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let duplicate = StrainEntity::find()
            .filter(livestock_strain::Column::Code.eq(request.code.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A strain with code '{}' already exists",
                request.code
            )));
        }

        let now = Utc::now();
        let model = livestock_strain::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(request.code),
            name: Set(request.name),
            description: Set(request.description),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create strain");
            ServiceError::DatabaseError(e)
        })?;

        info!(strain_id = %model.id, "Strain created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::StrainCreated(model.id)).await {
                warn!(error = %e, strain_id = %model.id, "Failed to send strain created event");
            }
        }

        Ok(model)
    }

    /// Gets a strain by ID
    #[instrument(skip(self), fields(strain_id = %strain_id))]
    pub async fn get_strain(
        &self,
        strain_id: Uuid,
    ) -> Result<Option<livestock_strain::Model>, ServiceError> {
        let db = &*self.db_pool;
        StrainEntity::find_by_id(strain_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Lists strains with pagination
    #[instrument(skip(self))]
    pub async fn list_strains(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<StrainListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = StrainEntity::find()
            .order_by_asc(livestock_strain::Column::Code)
            .paginate(db, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let strains = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(StrainListResponse {
            strains,
            total,
            page,
            per_page,
        })
    }

    /// Updates a strain
    #[instrument(skip(self, request), fields(strain_id = %strain_id))]
    pub async fn update_strain(
        &self,
        strain_id: Uuid,
        request: UpdateStrainRequest,
    ) -> Result<livestock_strain::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let strain = self
            .get_strain(strain_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Strain {} not found", strain_id)))?;

        let mut active: livestock_strain::ActiveModel = strain.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, strain_id = %strain_id, "Failed to update strain");
            ServiceError::DatabaseError(e)
        })?;

        info!(strain_id = %strain_id, "Strain updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::StrainUpdated(strain_id)).await {
                warn!(error = %e, strain_id = %strain_id, "Failed to send strain updated event");
            }
        }

        Ok(updated)
    }

    /// Deletes a strain not referenced by any purchase item
    #[instrument(skip(self), fields(strain_id = %strain_id))]
    pub async fn delete_strain(&self, strain_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let strain = self
            .get_strain(strain_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Strain {} not found", strain_id)))?;

        let referencing = PurchaseItemEntity::find()
            .filter(livestock_purchase_item::Column::StrainId.eq(strain_id))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if referencing > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Strain '{}' is referenced by {} purchase item(s) and cannot be deleted",
                strain.code, referencing
            )));
        }

        StrainEntity::delete_by_id(strain_id)
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(strain_id = %strain_id, "Strain deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::StrainDeleted(strain_id)).await {
                warn!(error = %e, strain_id = %strain_id, "Failed to send strain deleted event");
            }
        }

        Ok(())
    }
}
