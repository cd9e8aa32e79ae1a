//! End-to-end tests for the livestock purchasing workflow: transactional
//! create, batch materialization with aggregate roll-up, the status state
//! machine with its generation fallback, and guarded cascading deletes.

mod common;

use assert_matches::assert_matches;
use common::{item, purchase_request, TestContext};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use farmstock_api::{
    entities::{audit_trail, coop, current_livestock, livestock, livestock_batch, livestock_purchase, livestock_purchase_item},
    errors::ServiceError,
    services::{purchase_status::PurchaseStatus, purchases::GenerateOutcome},
};

async fn batch_count(ctx: &TestContext, purchase_id: uuid::Uuid) -> u64 {
    livestock_batch::Entity::find()
        .filter(livestock_batch::Column::PurchaseId.eq(purchase_id))
        .count(&*ctx.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn create_purchase_persists_items_with_draft_status() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("PT Unggas Jaya", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();

    assert_eq!(response.purchase.status, "draft");
    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].price_total, dec!(500000));
    assert_eq!(response.items[0].weight_total, dec!(50));

    // The item rows are persisted, not just returned
    let stored_items = livestock_purchase_item::Entity::find()
        .filter(livestock_purchase_item::Column::PurchaseId.eq(response.purchase.id))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(stored_items.len(), 1);
    assert_eq!(stored_items[0].quantity, 100);

    // No batch exists until generation runs
    assert_eq!(batch_count(&ctx, response.purchase.id).await, 0);
}

#[tokio::test]
async fn duplicate_invoice_number_is_rejected() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    ctx.purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 10, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();

    let result = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 10, dec!(5000), dec!(0.5))],
        ))
        .await;

    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn customer_cannot_be_used_as_supplier() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let customer = ctx
        .seed_partner("Toko Ayam", farmstock_api::services::PartnerType::Customer)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let result = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-002",
            customer.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 10, dec!(5000), dec!(0.5))],
        ))
        .await;

    assert_matches!(result, Err(ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn generate_batches_materializes_and_rolls_up_aggregates() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();
    let purchase_id = response.purchase.id;

    let outcome = ctx.purchases.generate_batches(purchase_id).await.unwrap();
    assert_eq!(outcome, GenerateOutcome::Generated { batch_count: 1 });

    // Exactly one batch per item
    let batches = livestock_batch::Entity::find()
        .filter(livestock_batch::Column::PurchaseId.eq(purchase_id))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].initial_quantity, 100);
    // Name rendered from the default template {farm}-{coop}-{date}-{index}
    assert_eq!(batches[0].name, "FRM1-K01-20250301-1");

    // Coop counters moved
    let coop_after = coop::Entity::find_by_id(coop.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coop_after.quantity, 100);
    assert_eq!(coop_after.status, "in_use");

    // Livestock aggregate equals the sum over its purchase items
    let livestock_row = livestock::Entity::find()
        .filter(livestock::Column::FarmId.eq(farm.id))
        .filter(livestock::Column::CoopId.eq(coop.id))
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(livestock_row.initial_quantity, 100);
    assert_eq!(livestock_row.initial_weight, dec!(50));
    assert_eq!(livestock_row.price_per_unit, dec!(5000));

    // Current livestock mirrors the landed population
    let current = current_livestock::Entity::find()
        .filter(current_livestock::Column::LivestockId.eq(livestock_row.id))
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.quantity, 100);
    assert_eq!(current.weight_total, dec!(50));
    assert_eq!(current.avg_weight, dec!(0.5));
}

#[tokio::test]
async fn generate_batches_is_idempotent() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();
    let purchase_id = response.purchase.id;

    assert_eq!(
        ctx.purchases.generate_batches(purchase_id).await.unwrap(),
        GenerateOutcome::Generated { batch_count: 1 }
    );
    assert_eq!(
        ctx.purchases.generate_batches(purchase_id).await.unwrap(),
        GenerateOutcome::AlreadyGenerated
    );

    assert_eq!(batch_count(&ctx, purchase_id).await, 1);

    // Aggregates were not double-counted
    let coop_after = coop::Entity::find_by_id(coop.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coop_after.quantity, 100);
}

#[tokio::test]
async fn capacity_overflow_rejects_generation_and_persists_nothing() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 50).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();
    let purchase_id = response.purchase.id;

    let result = ctx.purchases.generate_batches(purchase_id).await;
    assert_matches!(result, Err(ServiceError::CoopCapacityExceeded(_)));

    // Nothing persisted: no batches, no livestock, untouched coop
    assert_eq!(batch_count(&ctx, purchase_id).await, 0);
    let livestock_rows = livestock::Entity::find()
        .count(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(livestock_rows, 0);
    let coop_after = coop::Entity::find_by_id(coop.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coop_after.quantity, 0);
}

#[tokio::test]
async fn weighted_average_rolls_up_across_items() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let cobb = ctx.seed_strain("COBB").await;
    let ross = ctx.seed_strain("ROSS").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![
                item(cobb.id, 100, dec!(5000), dec!(0.5)),
                item(ross.id, 300, dec!(7000), dec!(0.5)),
            ],
        ))
        .await
        .unwrap();

    ctx.purchases
        .generate_batches(response.purchase.id)
        .await
        .unwrap();

    assert_eq!(batch_count(&ctx, response.purchase.id).await, 2);

    let livestock_row = livestock::Entity::find()
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(livestock_row.initial_quantity, 400);
    assert_eq!(livestock_row.price_per_unit, dec!(6500));
}

#[tokio::test]
async fn status_transition_to_in_coop_generates_batches() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();
    let purchase_id = response.purchase.id;

    let updated = ctx
        .purchases
        .update_status(purchase_id, PurchaseStatus::InCoop)
        .await
        .unwrap();
    assert_eq!(updated.status, "in_coop");
    assert_eq!(batch_count(&ctx, purchase_id).await, 1);

    // And onwards to complete
    let completed = ctx
        .purchases
        .update_status(purchase_id, PurchaseStatus::Complete)
        .await
        .unwrap();
    assert_eq!(completed.status, "complete");
}

#[tokio::test]
async fn invalid_transition_is_rejected() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();

    let result = ctx
        .purchases
        .update_status(response.purchase.id, PurchaseStatus::Complete)
        .await;
    assert_matches!(result, Err(ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn failed_generation_reverts_status_to_previous() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    // Capacity too small for the purchase, so generation must fail
    let coop = ctx.seed_coop(farm.id, "K01", 50).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();
    let purchase_id = response.purchase.id;

    let result = ctx
        .purchases
        .update_status(purchase_id, PurchaseStatus::InCoop)
        .await;
    assert_matches!(result, Err(ServiceError::CoopCapacityExceeded(_)));

    // The record is not left stuck in in_coop
    let purchase = livestock_purchase::Entity::find_by_id(purchase_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(purchase.status, "draft");
    assert_eq!(batch_count(&ctx, purchase_id).await, 0);
}

#[tokio::test]
async fn item_ceiling_from_company_config_is_enforced() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let company = ctx.company.create_company("Farmstock".to_string()).await.unwrap();
    ctx.company
        .update_config(
            company.id,
            json!({ "purchasing": { "max_items_per_purchase": 2 } }),
        )
        .await
        .unwrap();

    let result = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![
                item(strain.id, 10, dec!(5000), dec!(0.5)),
                item(strain.id, 10, dec!(5000), dec!(0.5)),
                item(strain.id, 10, dec!(5000), dec!(0.5)),
            ],
        ))
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn add_item_appends_to_draft_and_rejects_locked_purchase() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();
    let purchase_id = response.purchase.id;

    let added = ctx
        .purchases
        .add_item(purchase_id, item(strain.id, 50, dec!(4500), dec!(0.5)))
        .await
        .unwrap();
    assert_eq!(added.price_total, dec!(225000));

    let full = ctx
        .purchases
        .get_purchase(purchase_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(full.items.len(), 2);

    // Once in_coop, the purchase is no longer editable
    ctx.purchases
        .update_status(purchase_id, PurchaseStatus::InCoop)
        .await
        .unwrap();
    let result = ctx
        .purchases
        .add_item(purchase_id, item(strain.id, 10, dec!(4500), dec!(0.5)))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn delete_is_blocked_once_in_coop() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();
    let purchase_id = response.purchase.id;

    ctx.purchases
        .update_status(purchase_id, PurchaseStatus::InCoop)
        .await
        .unwrap();

    let result = ctx.purchases.delete_purchase(purchase_id).await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));

    // Nothing was removed
    assert!(livestock_purchase::Entity::find_by_id(purchase_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .is_some());
    assert_eq!(batch_count(&ctx, purchase_id).await, 1);
}

#[tokio::test]
async fn delete_draft_unwinds_batches_and_counters_with_audit_trail() {
    let ctx = TestContext::new().await;
    let farm = ctx.seed_farm("FRM1").await;
    let coop = ctx.seed_coop(farm.id, "K01", 1000).await;
    let supplier = ctx
        .seed_partner("Supplier A", farmstock_api::services::PartnerType::Supplier)
        .await;
    let strain = ctx.seed_strain("COBB").await;

    let response = ctx
        .purchases
        .create_purchase(purchase_request(
            "INV-001",
            supplier.id,
            farm.id,
            coop.id,
            vec![item(strain.id, 100, dec!(5000), dec!(0.5))],
        ))
        .await
        .unwrap();
    let purchase_id = response.purchase.id;

    // Materialize while still draft, then delete
    ctx.purchases.generate_batches(purchase_id).await.unwrap();
    ctx.purchases.delete_purchase(purchase_id).await.unwrap();

    // Header, items and batches are gone
    assert!(livestock_purchase::Entity::find_by_id(purchase_id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .is_none());
    assert_eq!(batch_count(&ctx, purchase_id).await, 0);
    let remaining_items = livestock_purchase_item::Entity::find()
        .filter(livestock_purchase_item::Column::PurchaseId.eq(purchase_id))
        .count(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(remaining_items, 0);

    // Counters unwound and the now-empty aggregate removed
    let coop_after = coop::Entity::find_by_id(coop.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coop_after.quantity, 0);
    assert_eq!(coop_after.weight, Decimal::ZERO);
    assert_eq!(coop_after.status, "empty");
    assert_eq!(livestock::Entity::find().count(&*ctx.db).await.unwrap(), 0);
    assert_eq!(
        current_livestock::Entity::find().count(&*ctx.db).await.unwrap(),
        0
    );

    // Every removed record was snapshotted
    let audits = audit_trail::Entity::find().all(&*ctx.db).await.unwrap();
    let audited_types: Vec<&str> = audits.iter().map(|a| a.entity_type.as_str()).collect();
    assert!(audited_types.contains(&"livestock_purchase"));
    assert!(audited_types.contains(&"livestock_purchase_item"));
    assert!(audited_types.contains(&"livestock_batch"));
    assert!(audited_types.contains(&"livestock"));
    assert!(audits.iter().all(|a| a.action == "delete"));
    assert!(audits.iter().all(|a| a.before.is_some()));
}
