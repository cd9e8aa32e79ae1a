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
    entities::coop::{self, Entity as CoopEntity},
    entities::farm::{self, Entity as FarmEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateFarmRequest {
    #[validate(length(min = 1, max = 30, message = "Farm code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "Farm name is required"))]
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateFarmRequest {
    #[validate(length(min = 1, max = 100, message = "Farm name must not be empty"))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FarmListResponse {
    pub farms: Vec<farm::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing farm master data
#[derive(Clone)]
pub struct FarmService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl FarmService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new farm
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_farm(&self, request: CreateFarmRequest) -> Result<farm::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let duplicate = FarmEntity::find()
            .filter(farm::Column::Code.eq(request.code.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A farm with code '{}' already exists",
                request.code
            )));
        }

        let now = Utc::now();
        let model = farm::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(request.code),
            name: Set(request.name),
            address: Set(request.address),
            status: Set("active".to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create farm");
            ServiceError::DatabaseError(e)
        })?;

        info!(farm_id = %model.id, "Farm created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::FarmCreated(model.id)).await {
                warn!(error = %e, farm_id = %model.id, "Failed to send farm created event");
            }
        }

        Ok(model)
    }

    /// Gets a farm by ID
    #[instrument(skip(self), fields(farm_id = %farm_id))]
    pub async fn get_farm(&self, farm_id: Uuid) -> Result<Option<farm::Model>, ServiceError> {
        let db = &*self.db_pool;
        FarmEntity::find_by_id(farm_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Lists farms with pagination
    #[instrument(skip(self))]
    pub async fn list_farms(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<FarmListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = FarmEntity::find()
            .order_by_asc(farm::Column::Code)
            .paginate(db, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let farms = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(FarmListResponse {
            farms,
            total,
            page,
            per_page,
        })
    }

    /// Updates a farm
    #[instrument(skip(self, request), fields(farm_id = %farm_id))]
    pub async fn update_farm(
        &self,
        farm_id: Uuid,
        request: UpdateFarmRequest,
    ) -> Result<farm::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let farm = self
            .get_farm(farm_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Farm {} not found", farm_id)))?;

        let mut active: farm::ActiveModel = farm.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, farm_id = %farm_id, "Failed to update farm");
            ServiceError::DatabaseError(e)
        })?;

        info!(farm_id = %farm_id, "Farm updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::FarmUpdated(farm_id)).await {
                warn!(error = %e, farm_id = %farm_id, "Failed to send farm updated event");
            }
        }

        Ok(updated)
    }

    /// Deletes a farm with no coops attached
    #[instrument(skip(self), fields(farm_id = %farm_id))]
    pub async fn delete_farm(&self, farm_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let farm = self
            .get_farm(farm_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Farm {} not found", farm_id)))?;

        let coop_count = CoopEntity::find()
            .filter(coop::Column::FarmId.eq(farm_id))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if coop_count > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Farm '{}' still has {} coop(s) and cannot be deleted",
                farm.code, coop_count
            )));
        }

        FarmEntity::delete_by_id(farm_id)
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(farm_id = %farm_id, "Farm deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::FarmDeleted(farm_id)).await {
                warn!(error = %e, farm_id = %farm_id, "Failed to send farm deleted event");
            }
        }

        Ok(())
    }
}
