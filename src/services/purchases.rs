use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::company::Entity as CompanyEntity,
    entities::coop::{self, Entity as CoopEntity},
    entities::current_livestock::{self, Entity as CurrentLivestockEntity},
    entities::farm::Entity as FarmEntity,
    entities::livestock::{self, Entity as LivestockEntity},
    entities::livestock_batch::{self, Entity as BatchEntity},
    entities::livestock_purchase::{self, Entity as PurchaseEntity},
    entities::livestock_purchase_item::{self, Entity as PurchaseItemEntity},
    entities::livestock_strain::Entity as StrainEntity,
    entities::partner::Entity as PartnerEntity,
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit::AuditRecorder,
    services::company_config::CompanyConfig,
    services::partners::PartnerType,
    services::purchase_status::PurchaseStatus,
};

/// One submitted purchase line.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PurchaseItemInput {
    pub strain_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub price_per_unit: Decimal,
    pub weight_per_unit: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseRequest {
    #[validate(length(min = 1, max = 50, message = "Invoice number is required"))]
    pub invoice_number: String,
    pub purchase_date: NaiveDate,
    pub supplier_id: Uuid,
    pub expedition_id: Option<Uuid>,
    pub farm_id: Uuid,
    pub coop_id: Uuid,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<PurchaseItemInput>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePurchaseRequest {
    pub purchase_date: Option<NaiveDate>,
    pub supplier_id: Option<Uuid>,
    pub expedition_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseResponse {
    #[serde(flatten)]
    pub purchase: livestock_purchase::Model,
    pub items: Vec<livestock_purchase_item::Model>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseListResponse {
    pub purchases: Vec<livestock_purchase::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Outcome of a batch generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum GenerateOutcome {
    Generated { batch_count: usize },
    AlreadyGenerated,
}

/// Computes the line totals for one submitted item.
pub(crate) fn compute_item_totals(item: &PurchaseItemInput) -> (Decimal, Decimal) {
    let quantity = Decimal::from(item.quantity);
    (item.price_per_unit * quantity, item.weight_per_unit * quantity)
}

/// Quantity-weighted average price across batches. Zero quantity yields zero.
pub(crate) fn weighted_average_price(batches: &[livestock_batch::Model]) -> Decimal {
    let total_qty: i64 = batches.iter().map(|b| b.initial_quantity as i64).sum();
    if total_qty == 0 {
        return Decimal::ZERO;
    }
    let weighted: Decimal = batches
        .iter()
        .map(|b| b.price_per_unit * Decimal::from(b.initial_quantity))
        .sum();
    weighted / Decimal::from(total_qty)
}

/// Service for the livestock purchasing workflow: transactional create,
/// draft-only edits, batch materialization with aggregate roll-up, the status
/// state machine, and guarded cascading deletes.
#[derive(Clone)]
pub struct PurchaseService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    audit: AuditRecorder,
}

impl PurchaseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
            audit: AuditRecorder::new(),
        }
    }

    /// Effective company config. This is a single-company install: the first
    /// company row carries the overrides, absence of one means defaults.
    async fn effective_config(&self) -> Result<CompanyConfig, ServiceError> {
        let db = &*self.db_pool;
        let company = CompanyEntity::find()
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        match company {
            Some(company) => CompanyConfig::from_overrides(company.config.as_ref()),
            None => Ok(CompanyConfig::default()),
        }
    }

    async fn ensure_partner_of_type(
        &self,
        partner_id: Uuid,
        expected: PartnerType,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let partner = PartnerEntity::find_by_id(partner_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Partner {} not found", partner_id)))?;

        if PartnerType::parse(&partner.partner_type)? != expected {
            return Err(ServiceError::InvalidInput(format!(
                "Partner '{}' is a {}, expected a {}",
                partner.name, partner.partner_type, expected
            )));
        }
        Ok(())
    }

    fn validate_item(item: &PurchaseItemInput) -> Result<(), ServiceError> {
        item.validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if item.price_per_unit < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price per unit must not be negative".to_string(),
            ));
        }
        if item.weight_per_unit < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Weight per unit must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a purchase with its line items in one transaction. The header
    /// lands in `draft`; nothing touches coops or aggregates yet.
    #[instrument(skip(self, request), fields(invoice_number = %request.invoice_number, farm_id = %request.farm_id, coop_id = %request.coop_id))]
    pub async fn create_purchase(
        &self,
        request: CreatePurchaseRequest,
    ) -> Result<PurchaseResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for item in &request.items {
            Self::validate_item(item)?;
        }

        let config = self.effective_config().await?;
        if request.items.len() > config.purchasing.max_items_per_purchase as usize {
            return Err(ServiceError::ValidationError(format!(
                "A purchase may have at most {} items, got {}",
                config.purchasing.max_items_per_purchase,
                request.items.len()
            )));
        }
        if config.purchasing.require_expedition && request.expedition_id.is_none() {
            return Err(ServiceError::ValidationError(
                "An expedition partner is required for purchases".to_string(),
            ));
        }

        let db = &*self.db_pool;

        self.ensure_partner_of_type(request.supplier_id, PartnerType::Supplier)
            .await?;
        if let Some(expedition_id) = request.expedition_id {
            self.ensure_partner_of_type(expedition_id, PartnerType::Expedition)
                .await?;
        }

        FarmEntity::find_by_id(request.farm_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Farm {} not found", request.farm_id)))?;
        let coop = CoopEntity::find_by_id(request.coop_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Coop {} not found", request.coop_id)))?;
        if coop.farm_id != request.farm_id {
            return Err(ServiceError::InvalidInput(format!(
                "Coop '{}' does not belong to the selected farm",
                coop.code
            )));
        }

        let strain_ids: BTreeSet<Uuid> = request.items.iter().map(|i| i.strain_id).collect();
        for strain_id in &strain_ids {
            StrainEntity::find_by_id(*strain_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Strain {} not found", strain_id))
                })?;
        }

        let duplicate = PurchaseEntity::find()
            .filter(livestock_purchase::Column::InvoiceNumber.eq(request.invoice_number.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A purchase with invoice number '{}' already exists",
                request.invoice_number
            )));
        }

        let now = Utc::now();
        let purchase_id = Uuid::new_v4();

        let total_quantity: i64 = request.items.iter().map(|i| i.quantity as i64).sum();
        let (total_price, total_weight) = request.items.iter().fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(price_acc, weight_acc), item| {
                let (price_total, weight_total) = compute_item_totals(item);
                (price_acc + price_total, weight_acc + weight_total)
            },
        );

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for purchase creation");
            ServiceError::DatabaseError(e)
        })?;

        let purchase_model = livestock_purchase::ActiveModel {
            id: Set(purchase_id),
            invoice_number: Set(request.invoice_number.clone()),
            purchase_date: Set(request.purchase_date),
            supplier_id: Set(request.supplier_id),
            expedition_id: Set(request.expedition_id),
            farm_id: Set(request.farm_id),
            coop_id: Set(request.coop_id),
            status: Set(PurchaseStatus::Draft.to_string()),
            notes: Set(request.notes.clone()),
            data: Set(Some(json!({
                "invoice_number": request.invoice_number,
                "total_quantity": total_quantity,
                "total_price": total_price,
                "total_weight": total_weight,
                "item_count": request.items.len(),
            }))),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to create purchase header");
            ServiceError::DatabaseError(e)
        })?;

        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let model = Self::insert_item(&txn, purchase_id, request.farm_id, request.coop_id, item)
                .await?;
            items.push(model);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to commit purchase creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            purchase_id = %purchase_id,
            item_count = items.len(),
            "Purchase created"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::PurchaseCreated(purchase_id)).await {
                warn!(error = %e, purchase_id = %purchase_id, "Failed to send purchase created event");
            }
        }

        Ok(PurchaseResponse {
            purchase: purchase_model,
            items,
        })
    }

    async fn insert_item<C: sea_orm::ConnectionTrait>(
        conn: &C,
        purchase_id: Uuid,
        farm_id: Uuid,
        coop_id: Uuid,
        item: &PurchaseItemInput,
    ) -> Result<livestock_purchase_item::Model, ServiceError> {
        let (price_total, weight_total) = compute_item_totals(item);
        let now = Utc::now();

        livestock_purchase_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_id: Set(purchase_id),
            strain_id: Set(item.strain_id),
            quantity: Set(item.quantity),
            price_per_unit: Set(item.price_per_unit),
            price_total: Set(price_total),
            weight_per_unit: Set(item.weight_per_unit),
            weight_total: Set(weight_total),
            data: Set(Some(json!({
                "livestock": {
                    "farm_id": farm_id,
                    "coop_id": coop_id,
                    "strain_id": item.strain_id,
                },
                "batch": {
                    "quantity": item.quantity,
                    "price_per_unit": item.price_per_unit,
                    "price_total": price_total,
                    "weight_per_unit": item.weight_per_unit,
                    "weight_total": weight_total,
                },
            }))),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(conn)
        .await
        .map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to create purchase item");
            ServiceError::DatabaseError(e)
        })
    }

    /// Appends one line item to a draft purchase, re-checking the ceiling.
    #[instrument(skip(self, item), fields(purchase_id = %purchase_id))]
    pub async fn add_item(
        &self,
        purchase_id: Uuid,
        item: PurchaseItemInput,
    ) -> Result<livestock_purchase_item::Model, ServiceError> {
        Self::validate_item(&item)?;

        let db = &*self.db_pool;
        let purchase = self.require_purchase(purchase_id).await?;

        let status = PurchaseStatus::parse(&purchase.status)?;
        if !status.is_editable() {
            return Err(ServiceError::InvalidOperation(format!(
                "Purchase '{}' is {} and can no longer be edited",
                purchase.invoice_number, status
            )));
        }

        let config = self.effective_config().await?;
        let existing = PurchaseItemEntity::find()
            .filter(livestock_purchase_item::Column::PurchaseId.eq(purchase_id))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing + 1 > config.purchasing.max_items_per_purchase as u64 {
            return Err(ServiceError::ValidationError(format!(
                "A purchase may have at most {} items",
                config.purchasing.max_items_per_purchase
            )));
        }

        StrainEntity::find_by_id(item.strain_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Strain {} not found", item.strain_id)))?;

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;
        let model =
            Self::insert_item(&txn, purchase_id, purchase.farm_id, purchase.coop_id, &item).await?;

        let mut header: livestock_purchase::ActiveModel = purchase.into();
        header.updated_at = Set(Some(Utc::now()));
        header.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(purchase_id = %purchase_id, item_id = %model.id, "Purchase item added");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PurchaseItemAdded {
                    purchase_id,
                    item_id: model.id,
                })
                .await
            {
                warn!(error = %e, purchase_id = %purchase_id, "Failed to send item added event");
            }
        }

        Ok(model)
    }

    /// Draft-only header edit. The invoice number is immutable after create.
    #[instrument(skip(self, request), fields(purchase_id = %purchase_id))]
    pub async fn update_purchase(
        &self,
        purchase_id: Uuid,
        request: UpdatePurchaseRequest,
    ) -> Result<livestock_purchase::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let purchase = self.require_purchase(purchase_id).await?;

        let status = PurchaseStatus::parse(&purchase.status)?;
        if !status.is_editable() {
            return Err(ServiceError::InvalidOperation(format!(
                "Purchase '{}' is {} and can no longer be edited",
                purchase.invoice_number, status
            )));
        }

        if let Some(supplier_id) = request.supplier_id {
            self.ensure_partner_of_type(supplier_id, PartnerType::Supplier)
                .await?;
        }
        if let Some(expedition_id) = request.expedition_id {
            self.ensure_partner_of_type(expedition_id, PartnerType::Expedition)
                .await?;
        }

        let mut active: livestock_purchase::ActiveModel = purchase.into();
        if let Some(purchase_date) = request.purchase_date {
            active.purchase_date = Set(purchase_date);
        }
        if let Some(supplier_id) = request.supplier_id {
            active.supplier_id = Set(supplier_id);
        }
        if let Some(expedition_id) = request.expedition_id {
            active.expedition_id = Set(Some(expedition_id));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to update purchase");
            ServiceError::DatabaseError(e)
        })?;

        info!(purchase_id = %purchase_id, "Purchase updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::PurchaseUpdated(purchase_id)).await {
                warn!(error = %e, purchase_id = %purchase_id, "Failed to send purchase updated event");
            }
        }

        Ok(updated)
    }

    /// Gets a purchase with its items
    #[instrument(skip(self), fields(purchase_id = %purchase_id))]
    pub async fn get_purchase(
        &self,
        purchase_id: Uuid,
    ) -> Result<Option<PurchaseResponse>, ServiceError> {
        let db = &*self.db_pool;
        let Some(purchase) = PurchaseEntity::find_by_id(purchase_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
        else {
            return Ok(None);
        };

        let items = purchase
            .find_related(PurchaseItemEntity)
            .order_by_asc(livestock_purchase_item::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(Some(PurchaseResponse { purchase, items }))
    }

    /// Lists purchases with pagination, optionally filtered by status
    #[instrument(skip(self))]
    pub async fn list_purchases(
        &self,
        status: Option<PurchaseStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<PurchaseListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query =
            PurchaseEntity::find().order_by_desc(livestock_purchase::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(livestock_purchase::Column::Status.eq(status.to_string()));
        }

        let paginator = query.paginate(db, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let purchases = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(PurchaseListResponse {
            purchases,
            total,
            page,
            per_page,
        })
    }

    async fn require_purchase(
        &self,
        purchase_id: Uuid,
    ) -> Result<livestock_purchase::Model, ServiceError> {
        let db = &*self.db_pool;
        PurchaseEntity::find_by_id(purchase_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase {} not found", purchase_id)))
    }

    /// Materializes batches for a purchase and rolls the totals into the
    /// livestock, coop and current-livestock aggregates, all in one
    /// transaction. Idempotent: a purchase that already has batches is left
    /// untouched.
    #[instrument(skip(self), fields(purchase_id = %purchase_id))]
    pub async fn generate_batches(
        &self,
        purchase_id: Uuid,
    ) -> Result<GenerateOutcome, ServiceError> {
        let db = &*self.db_pool;
        let purchase = self.require_purchase(purchase_id).await?;

        let existing = BatchEntity::find()
            .filter(livestock_batch::Column::PurchaseId.eq(purchase_id))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing > 0 {
            info!(
                purchase_id = %purchase_id,
                existing_batches = existing,
                "Batches already exist for purchase, skipping generation"
            );
            return Ok(GenerateOutcome::AlreadyGenerated);
        }

        let config = self.effective_config().await?;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to start batch generation transaction");
            ServiceError::DatabaseError(e)
        })?;

        let items = PurchaseItemEntity::find()
            .filter(livestock_purchase_item::Column::PurchaseId.eq(purchase_id))
            .order_by_asc(livestock_purchase_item::Column::CreatedAt)
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if items.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "Purchase '{}' has no items to generate batches from",
                purchase.invoice_number
            )));
        }

        let farm = FarmEntity::find_by_id(purchase.farm_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Farm {} not found", purchase.farm_id))
            })?;
        let coop = CoopEntity::find_by_id(purchase.coop_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Coop {} not found", purchase.coop_id))
            })?;

        let total_quantity: i32 = items.iter().map(|i| i.quantity).sum();
        let total_weight: Decimal = items.iter().map(|i| i.weight_total).sum();

        // Capacity gate: the incoming population must fit the coop
        if coop.quantity + total_quantity > coop.capacity {
            return Err(ServiceError::CoopCapacityExceeded(format!(
                "Coop '{}' holds {} of {} capacity; adding {} would overflow it",
                coop.code, coop.quantity, coop.capacity, total_quantity
            )));
        }

        // Find or create the livestock aggregate for this farm+coop
        let now = Utc::now();
        let livestock = LivestockEntity::find()
            .filter(livestock::Column::FarmId.eq(purchase.farm_id))
            .filter(livestock::Column::CoopId.eq(purchase.coop_id))
            .filter(livestock::Column::Status.eq("active"))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let livestock = match livestock {
            Some(existing) => existing,
            None => {
                let name = format!(
                    "{}-{}-{}",
                    farm.code,
                    coop.code,
                    purchase
                        .purchase_date
                        .format(&config.batch.date_format)
                );
                livestock::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    farm_id: Set(purchase.farm_id),
                    coop_id: Set(purchase.coop_id),
                    name: Set(name),
                    start_date: Set(purchase.purchase_date),
                    initial_quantity: Set(0),
                    initial_weight: Set(Decimal::ZERO),
                    price_per_unit: Set(Decimal::ZERO),
                    quantity_depletion: Set(0),
                    quantity_sales: Set(0),
                    quantity_mutated: Set(0),
                    status: Set("active".to_string()),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                }
                .insert(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?
            }
        };

        // One batch per purchase item, named from the configured template
        for (index, item) in items.iter().enumerate() {
            let name = config.render_batch_name(
                &farm.code,
                &coop.code,
                purchase.purchase_date,
                index + 1,
            );
            livestock_batch::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_id: Set(purchase_id),
                purchase_item_id: Set(item.id),
                livestock_id: Set(livestock.id),
                farm_id: Set(purchase.farm_id),
                coop_id: Set(purchase.coop_id),
                strain_id: Set(item.strain_id),
                name: Set(name),
                initial_quantity: Set(item.quantity),
                initial_weight: Set(item.weight_total),
                price_per_unit: Set(item.price_per_unit),
                status: Set("active".to_string()),
                start_date: Set(purchase.purchase_date),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        }

        // The purchase's batch count must equal its item count
        let batch_count = BatchEntity::find()
            .filter(livestock_batch::Column::PurchaseId.eq(purchase_id))
            .count(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if batch_count != items.len() as u64 {
            return Err(ServiceError::InternalError(format!(
                "Batch count {} does not match item count {} for purchase {}",
                batch_count,
                items.len(),
                purchase_id
            )));
        }

        // Recompute the livestock aggregate from all of its batches
        let all_batches = BatchEntity::find()
            .filter(livestock_batch::Column::LivestockId.eq(livestock.id))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let aggregate_quantity: i32 = all_batches.iter().map(|b| b.initial_quantity).sum();
        let aggregate_weight: Decimal = all_batches.iter().map(|b| b.initial_weight).sum();
        let average_price = weighted_average_price(&all_batches);

        let livestock_id = livestock.id;
        let mut livestock_active: livestock::ActiveModel = livestock.into();
        livestock_active.initial_quantity = Set(aggregate_quantity);
        livestock_active.initial_weight = Set(aggregate_weight);
        livestock_active.price_per_unit = Set(average_price);
        livestock_active.updated_at = Set(Some(now));
        livestock_active
            .update(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        // Bump the coop counters
        let new_coop_quantity = coop.quantity + total_quantity;
        let new_coop_weight = coop.weight + total_weight;
        let mut coop_active: coop::ActiveModel = coop.into();
        coop_active.quantity = Set(new_coop_quantity);
        coop_active.weight = Set(new_coop_weight);
        coop_active.status = Set("in_use".to_string());
        coop_active.updated_at = Set(Some(now));
        coop_active
            .update(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        // Upsert the current-livestock view
        let current = CurrentLivestockEntity::find()
            .filter(current_livestock::Column::LivestockId.eq(livestock_id))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        match current {
            Some(current) => {
                let quantity = current.quantity + total_quantity;
                let weight_total = current.weight_total + total_weight;
                let avg_weight = if quantity > 0 {
                    weight_total / Decimal::from(quantity)
                } else {
                    Decimal::ZERO
                };
                let mut active: current_livestock::ActiveModel = current.into();
                active.quantity = Set(quantity);
                active.weight_total = Set(weight_total);
                active.avg_weight = Set(avg_weight);
                active.updated_at = Set(Some(now));
                active
                    .update(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            }
            None => {
                let avg_weight = if total_quantity > 0 {
                    total_weight / Decimal::from(total_quantity)
                } else {
                    Decimal::ZERO
                };
                current_livestock::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    livestock_id: Set(livestock_id),
                    farm_id: Set(purchase.farm_id),
                    coop_id: Set(purchase.coop_id),
                    quantity: Set(total_quantity),
                    weight_total: Set(total_weight),
                    avg_weight: Set(avg_weight),
                    status: Set("active".to_string()),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                }
                .insert(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
            }
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to commit batch generation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            purchase_id = %purchase_id,
            livestock_id = %livestock_id,
            batch_count = items.len(),
            "Batches generated"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::BatchesGenerated {
                    purchase_id,
                    livestock_id,
                    batch_count: items.len(),
                })
                .await
            {
                warn!(error = %e, purchase_id = %purchase_id, "Failed to send batches generated event");
            }
        }

        Ok(GenerateOutcome::Generated {
            batch_count: items.len(),
        })
    }

    /// Moves a purchase through its lifecycle. Entering `in_coop` persists the
    /// status first and then materializes batches; if generation fails the
    /// status falls back to its previous value and the error is surfaced
    /// instead of leaving the record stuck.
    #[instrument(skip(self), fields(purchase_id = %purchase_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        purchase_id: Uuid,
        new_status: PurchaseStatus,
    ) -> Result<livestock_purchase::Model, ServiceError> {
        let purchase = self.require_purchase(purchase_id).await?;
        let old_status = PurchaseStatus::parse(&purchase.status)?;

        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition purchase '{}' from '{}' to '{}'",
                purchase.invoice_number, old_status, new_status
            )));
        }
        if old_status == new_status {
            return Ok(purchase);
        }

        let invoice_number = purchase.invoice_number.clone();
        let updated = self.persist_status(purchase, new_status).await?;

        if new_status == PurchaseStatus::InCoop {
            if let Err(generation_error) = self.generate_batches(purchase_id).await {
                warn!(
                    purchase_id = %purchase_id,
                    error = %generation_error,
                    "Batch generation failed, reverting purchase status"
                );
                match self.persist_status(updated, old_status).await {
                    Ok(_) => {}
                    Err(revert_error) => {
                        // The record is now stuck in in_coop without batches;
                        // surface the original failure but log the revert too
                        error!(
                            purchase_id = %purchase_id,
                            error = %revert_error,
                            "Failed to revert purchase status after generation failure"
                        );
                    }
                }
                return Err(generation_error);
            }
        }

        info!(
            purchase_id = %purchase_id,
            old_status = %old_status,
            new_status = %new_status,
            "Purchase status updated"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PurchaseStatusChanged {
                    purchase_id,
                    invoice_number,
                    old_status: old_status.to_string(),
                    new_status: new_status.to_string(),
                })
                .await
            {
                warn!(error = %e, purchase_id = %purchase_id, "Failed to send status changed event");
            }
        }

        self.require_purchase(purchase_id).await
    }

    async fn persist_status(
        &self,
        purchase: livestock_purchase::Model,
        status: PurchaseStatus,
    ) -> Result<livestock_purchase::Model, ServiceError> {
        let db = &*self.db_pool;
        let mut active: livestock_purchase::ActiveModel = purchase.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await.map_err(ServiceError::DatabaseError)
    }

    /// Deletes a purchase, unwinding everything it materialized. Blocked for
    /// `in_coop`/`complete` purchases and for purchases whose livestock
    /// already has depletion, sales or mutation activity. Every removed record
    /// is snapshotted into the audit trail inside the same transaction.
    #[instrument(skip(self), fields(purchase_id = %purchase_id))]
    pub async fn delete_purchase(&self, purchase_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let purchase = self.require_purchase(purchase_id).await?;

        let status = PurchaseStatus::parse(&purchase.status)?;
        if status.blocks_deletion() {
            return Err(ServiceError::InvalidOperation(format!(
                "Purchase '{}' is {} and cannot be deleted",
                purchase.invoice_number, status
            )));
        }

        let batches = BatchEntity::find()
            .filter(livestock_batch::Column::PurchaseId.eq(purchase_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let livestock_ids: BTreeSet<Uuid> = batches.iter().map(|b| b.livestock_id).collect();
        for livestock_id in &livestock_ids {
            let livestock = LivestockEntity::find_by_id(*livestock_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Livestock {} not found", livestock_id))
                })?;
            if livestock.quantity_depletion > 0
                || livestock.quantity_sales > 0
                || livestock.quantity_mutated > 0
            {
                return Err(ServiceError::InvalidOperation(format!(
                    "Livestock '{}' already has recorded activity; purchase '{}' cannot be deleted",
                    livestock.name, purchase.invoice_number
                )));
            }
        }

        let items = PurchaseItemEntity::find()
            .filter(livestock_purchase_item::Column::PurchaseId.eq(purchase_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let invoice_number = purchase.invoice_number.clone();
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to start purchase deletion transaction");
            ServiceError::DatabaseError(e)
        })?;

        // Snapshot everything the cascade is about to remove
        self.audit
            .record_deletion(&txn, "livestock_purchase", purchase.id, &purchase)
            .await?;
        for item in &items {
            self.audit
                .record_deletion(&txn, "livestock_purchase_item", item.id, item)
                .await?;
        }
        for batch in &batches {
            self.audit
                .record_deletion(&txn, "livestock_batch", batch.id, batch)
                .await?;
        }

        let removed_quantity: i32 = batches.iter().map(|b| b.initial_quantity).sum();
        let removed_weight: Decimal = batches.iter().map(|b| b.initial_weight).sum();

        // Drop the batches first so aggregate recomputation sees what remains
        BatchEntity::delete_many()
            .filter(livestock_batch::Column::PurchaseId.eq(purchase_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let now = Utc::now();
        for livestock_id in &livestock_ids {
            let livestock = LivestockEntity::find_by_id(*livestock_id)
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Livestock {} not found", livestock_id))
                })?;

            let remaining = BatchEntity::find()
                .filter(livestock_batch::Column::LivestockId.eq(*livestock_id))
                .all(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            if remaining.is_empty() {
                self.audit
                    .record_deletion(&txn, "livestock", livestock.id, &livestock)
                    .await?;
                CurrentLivestockEntity::delete_many()
                    .filter(current_livestock::Column::LivestockId.eq(*livestock_id))
                    .exec(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                LivestockEntity::delete_by_id(*livestock_id)
                    .exec(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                continue;
            }

            let aggregate_quantity: i32 = remaining.iter().map(|b| b.initial_quantity).sum();
            let aggregate_weight: Decimal = remaining.iter().map(|b| b.initial_weight).sum();
            let average_price = weighted_average_price(&remaining);

            let mut active: livestock::ActiveModel = livestock.into();
            active.initial_quantity = Set(aggregate_quantity);
            active.initial_weight = Set(aggregate_weight);
            active.price_per_unit = Set(average_price);
            active.updated_at = Set(Some(now));
            active
                .update(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            let removed_here: i32 = batches
                .iter()
                .filter(|b| b.livestock_id == *livestock_id)
                .map(|b| b.initial_quantity)
                .sum();
            let removed_weight_here: Decimal = batches
                .iter()
                .filter(|b| b.livestock_id == *livestock_id)
                .map(|b| b.initial_weight)
                .sum();

            if let Some(current) = CurrentLivestockEntity::find()
                .filter(current_livestock::Column::LivestockId.eq(*livestock_id))
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?
            {
                let quantity = (current.quantity - removed_here).max(0);
                let weight_total = (current.weight_total - removed_weight_here).max(Decimal::ZERO);
                let avg_weight = if quantity > 0 {
                    weight_total / Decimal::from(quantity)
                } else {
                    Decimal::ZERO
                };
                let mut active: current_livestock::ActiveModel = current.into();
                active.quantity = Set(quantity);
                active.weight_total = Set(weight_total);
                active.avg_weight = Set(avg_weight);
                active.updated_at = Set(Some(now));
                active
                    .update(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            }
        }

        // Unwind the coop counters the batches contributed
        if removed_quantity > 0 || removed_weight > Decimal::ZERO {
            let coop = CoopEntity::find_by_id(purchase.coop_id)
                .one(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Coop {} not found", purchase.coop_id))
                })?;
            let quantity = (coop.quantity - removed_quantity).max(0);
            let weight = (coop.weight - removed_weight).max(Decimal::ZERO);
            let mut active: coop::ActiveModel = coop.into();
            active.quantity = Set(quantity);
            active.weight = Set(weight);
            if quantity == 0 {
                active.status = Set("empty".to_string());
            }
            active.updated_at = Set(Some(now));
            active
                .update(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;
        }

        PurchaseItemEntity::delete_many()
            .filter(livestock_purchase_item::Column::PurchaseId.eq(purchase_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        PurchaseEntity::delete_by_id(purchase_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to commit purchase deletion transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(purchase_id = %purchase_id, "Purchase deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PurchaseDeleted {
                    purchase_id,
                    invoice_number,
                })
                .await
            {
                warn!(error = %e, purchase_id = %purchase_id, "Failed to send purchase deleted event");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn batch(quantity: i32, price: Decimal) -> livestock_batch::Model {
        livestock_batch::Model {
            id: Uuid::new_v4(),
            purchase_id: Uuid::new_v4(),
            purchase_item_id: Uuid::new_v4(),
            livestock_id: Uuid::new_v4(),
            farm_id: Uuid::new_v4(),
            coop_id: Uuid::new_v4(),
            strain_id: Uuid::new_v4(),
            name: "test-batch".to_string(),
            initial_quantity: quantity,
            initial_weight: Decimal::ZERO,
            price_per_unit: price,
            status: "active".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn item_totals_multiply_per_unit_values() {
        let item = PurchaseItemInput {
            strain_id: Uuid::new_v4(),
            quantity: 100,
            price_per_unit: dec!(5000),
            weight_per_unit: dec!(0.045),
        };
        let (price_total, weight_total) = compute_item_totals(&item);
        assert_eq!(price_total, dec!(500000));
        assert_eq!(weight_total, dec!(4.500));
    }

    #[test]
    fn weighted_average_price_weights_by_quantity() {
        let batches = vec![batch(100, dec!(5000)), batch(300, dec!(7000))];
        assert_eq!(weighted_average_price(&batches), dec!(6500));
    }

    #[test]
    fn weighted_average_price_of_nothing_is_zero() {
        assert_eq!(weighted_average_price(&[]), Decimal::ZERO);
        assert_eq!(
            weighted_average_price(&[batch(0, dec!(5000))]),
            Decimal::ZERO
        );
    }

    #[test]
    fn negative_price_is_rejected() {
        let item = PurchaseItemInput {
            strain_id: Uuid::new_v4(),
            quantity: 10,
            price_per_unit: dec!(-1),
            weight_per_unit: dec!(0.04),
        };
        assert!(matches!(
            PurchaseService::validate_item(&item),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let item = PurchaseItemInput {
            strain_id: Uuid::new_v4(),
            quantity: 0,
            price_per_unit: dec!(5000),
            weight_per_unit: dec!(0.04),
        };
        assert!(matches!(
            PurchaseService::validate_item(&item),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
