use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::partner::{self, Entity as PartnerEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Counterparty classification stored in `partners.partner_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PartnerType {
    Customer,
    Supplier,
    Expedition,
}

impl PartnerType {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        Self::from_str(raw).map_err(|_| {
            ServiceError::InvalidInput(format!(
                "Unknown partner type '{}'. Valid types: customer, supplier, expedition",
                raw
            ))
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePartnerRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    pub partner_type: PartnerType,
    #[validate(email(message = "Contact email must be valid"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePartnerRequest {
    #[validate(length(min = 1, max = 100, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Contact email must be valid"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartnerListResponse {
    pub partners: Vec<partner::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing partner master data
#[derive(Clone)]
pub struct PartnerService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PartnerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new partner
    #[instrument(skip(self, request), fields(name = %request.name, partner_type = %request.partner_type))]
    pub async fn create_partner(
        &self,
        request: CreatePartnerRequest,
    ) -> Result<partner::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        // One name per type; expeditions and customers may share a name
        let duplicate = PartnerEntity::find()
            .filter(partner::Column::Name.eq(request.name.clone()))
            .filter(partner::Column::PartnerType.eq(request.partner_type.to_string()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A {} named '{}' already exists",
                request.partner_type, request.name
            )));
        }

        let now = Utc::now();
        let model = partner::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            partner_type: Set(request.partner_type.to_string()),
            email: Set(request.email),
            phone: Set(request.phone),
            address: Set(request.address),
            status: Set("active".to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create partner");
            ServiceError::DatabaseError(e)
        })?;

        info!(partner_id = %model.id, "Partner created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::PartnerCreated(model.id)).await {
                warn!(error = %e, partner_id = %model.id, "Failed to send partner created event");
            }
        }

        Ok(model)
    }

    /// Gets a partner by ID
    #[instrument(skip(self), fields(partner_id = %partner_id))]
    pub async fn get_partner(
        &self,
        partner_id: Uuid,
    ) -> Result<Option<partner::Model>, ServiceError> {
        let db = &*self.db_pool;
        PartnerEntity::find_by_id(partner_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Lists partners with pagination, optionally filtered by type
    #[instrument(skip(self))]
    pub async fn list_partners(
        &self,
        partner_type: Option<PartnerType>,
        page: u64,
        per_page: u64,
    ) -> Result<PartnerListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = PartnerEntity::find().order_by_asc(partner::Column::Name);
        if let Some(partner_type) = partner_type {
            query = query.filter(partner::Column::PartnerType.eq(partner_type.to_string()));
        }

        let paginator = query.paginate(db, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let partners = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(PartnerListResponse {
            partners,
            total,
            page,
            per_page,
        })
    }

    /// Updates a partner
    #[instrument(skip(self, request), fields(partner_id = %partner_id))]
    pub async fn update_partner(
        &self,
        partner_id: Uuid,
        request: UpdatePartnerRequest,
    ) -> Result<partner::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let partner = self
            .get_partner(partner_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Partner {} not found", partner_id)))?;

        let mut active: partner::ActiveModel = partner.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, partner_id = %partner_id, "Failed to update partner");
            ServiceError::DatabaseError(e)
        })?;

        info!(partner_id = %partner_id, "Partner updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::PartnerUpdated(partner_id)).await {
                warn!(error = %e, partner_id = %partner_id, "Failed to send partner updated event");
            }
        }

        Ok(updated)
    }

    /// Deletes a partner that is not referenced by any purchase
    #[instrument(skip(self), fields(partner_id = %partner_id))]
    pub async fn delete_partner(&self, partner_id: Uuid) -> Result<(), ServiceError> {
        use crate::entities::livestock_purchase::{self, Entity as PurchaseEntity};

        let db = &*self.db_pool;
        let partner = self
            .get_partner(partner_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Partner {} not found", partner_id)))?;

        let referencing = PurchaseEntity::find()
            .filter(
                sea_orm::Condition::any()
                    .add(livestock_purchase::Column::SupplierId.eq(partner_id))
                    .add(livestock_purchase::Column::ExpeditionId.eq(partner_id)),
            )
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if referencing > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Partner '{}' is referenced by {} purchase(s) and cannot be deleted",
                partner.name, referencing
            )));
        }

        PartnerEntity::delete_by_id(partner_id)
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(partner_id = %partner_id, "Partner deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::PartnerDeleted(partner_id)).await {
                warn!(error = %e, partner_id = %partner_id, "Failed to send partner deleted event");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_type_round_trips() {
        for t in [
            PartnerType::Customer,
            PartnerType::Supplier,
            PartnerType::Expedition,
        ] {
            assert_eq!(PartnerType::parse(&t.to_string()).unwrap(), t);
        }
    }

    #[test]
    fn partner_type_rejects_unknown() {
        assert!(matches!(
            PartnerType::parse("vendor"),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
