use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
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
    entities::farm::Entity as FarmEntity,
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCoopRequest {
    pub farm_id: Uuid,
    #[validate(length(min = 1, max = 30, message = "Coop code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "Coop name is required"))]
    pub name: String,
    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateCoopRequest {
    #[validate(length(min = 1, max = 100, message = "Coop name must not be empty"))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: Option<i32>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CoopListResponse {
    pub coops: Vec<coop::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing coop master data
#[derive(Clone)]
pub struct CoopService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CoopService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new coop under an existing farm
    #[instrument(skip(self, request), fields(code = %request.code, farm_id = %request.farm_id))]
    pub async fn create_coop(&self, request: CreateCoopRequest) -> Result<coop::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        FarmEntity::find_by_id(request.farm_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Farm {} not found", request.farm_id))
            })?;

        let duplicate = CoopEntity::find()
            .filter(coop::Column::Code.eq(request.code.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A coop with code '{}' already exists",
                request.code
            )));
        }

        let now = Utc::now();
        let model = coop::ActiveModel {
            id: Set(Uuid::new_v4()),
            farm_id: Set(request.farm_id),
            code: Set(request.code),
            name: Set(request.name),
            capacity: Set(request.capacity),
            quantity: Set(0),
            weight: Set(Decimal::ZERO),
            status: Set("empty".to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create coop");
            ServiceError::DatabaseError(e)
        })?;

        info!(coop_id = %model.id, "Coop created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::CoopCreated(model.id)).await {
                warn!(error = %e, coop_id = %model.id, "Failed to send coop created event");
            }
        }

        Ok(model)
    }

    /// Gets a coop by ID
    #[instrument(skip(self), fields(coop_id = %coop_id))]
    pub async fn get_coop(&self, coop_id: Uuid) -> Result<Option<coop::Model>, ServiceError> {
        let db = &*self.db_pool;
        CoopEntity::find_by_id(coop_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Lists coops, optionally scoped to one farm
    #[instrument(skip(self))]
    pub async fn list_coops(
        &self,
        farm_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<CoopListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = CoopEntity::find().order_by_asc(coop::Column::Code);
        if let Some(farm_id) = farm_id {
            query = query.filter(coop::Column::FarmId.eq(farm_id));
        }

        let paginator = query.paginate(db, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let coops = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(CoopListResponse {
            coops,
            total,
            page,
            per_page,
        })
    }

    /// Updates a coop. Shrinking capacity below the current population is
    /// rejected.
    #[instrument(skip(self, request), fields(coop_id = %coop_id))]
    pub async fn update_coop(
        &self,
        coop_id: Uuid,
        request: UpdateCoopRequest,
    ) -> Result<coop::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let coop = self
            .get_coop(coop_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coop {} not found", coop_id)))?;

        if let Some(capacity) = request.capacity {
            if capacity < coop.quantity {
                return Err(ServiceError::ValidationError(format!(
                    "Capacity {} is below the current population of {}",
                    capacity, coop.quantity
                )));
            }
        }

        let mut active: coop::ActiveModel = coop.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(capacity) = request.capacity {
            active.capacity = Set(capacity);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, coop_id = %coop_id, "Failed to update coop");
            ServiceError::DatabaseError(e)
        })?;

        info!(coop_id = %coop_id, "Coop updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::CoopUpdated(coop_id)).await {
                warn!(error = %e, coop_id = %coop_id, "Failed to send coop updated event");
            }
        }

        Ok(updated)
    }

    /// Deletes an empty coop
    #[instrument(skip(self), fields(coop_id = %coop_id))]
    pub async fn delete_coop(&self, coop_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let coop = self
            .get_coop(coop_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coop {} not found", coop_id)))?;

        if coop.quantity > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Coop '{}' still holds {} head of livestock and cannot be deleted",
                coop.code, coop.quantity
            )));
        }

        CoopEntity::delete_by_id(coop_id)
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(coop_id = %coop_id, "Coop deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::CoopDeleted(coop_id)).await {
                warn!(error = %e, coop_id = %coop_id, "Failed to send coop deleted event");
            }
        }

        Ok(())
    }
}
