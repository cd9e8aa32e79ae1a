//! Company configuration tests: persistence of overrides and resolution of
//! the effective config.

mod common;

use assert_matches::assert_matches;
use common::TestContext;
use serde_json::json;

use farmstock_api::{
    errors::ServiceError,
    services::company_config::MethodKind,
};

#[tokio::test]
async fn effective_config_defaults_when_no_overrides() {
    let ctx = TestContext::new().await;
    let company = ctx.company.create_company("Farmstock".to_string()).await.unwrap();

    let config = ctx.company.effective_config(company.id).await.unwrap();
    assert_eq!(config.purchasing.max_items_per_purchase, 50);
    assert!(config
        .available_livestock_methods(MethodKind::Depletion)
        .contains(&"fifo".to_string()));
}

#[tokio::test]
async fn config_patches_merge_and_persist() {
    let ctx = TestContext::new().await;
    let company = ctx.company.create_company("Farmstock".to_string()).await.unwrap();

    ctx.company
        .update_config(
            company.id,
            json!({ "purchasing": { "max_items_per_purchase": 5 } }),
        )
        .await
        .unwrap();

    // A later patch to another section must not clobber the first one
    let config = ctx
        .company
        .update_config(
            company.id,
            json!({ "batch": { "naming_template": "{farm}/{coop}/{index}" } }),
        )
        .await
        .unwrap();

    assert_eq!(config.purchasing.max_items_per_purchase, 5);
    assert_eq!(config.batch.naming_template, "{farm}/{coop}/{index}");

    // And the merged state survives a fresh read
    let reread = ctx.company.effective_config(company.id).await.unwrap();
    assert_eq!(reread.purchasing.max_items_per_purchase, 5);
    assert_eq!(reread.batch.naming_template, "{farm}/{coop}/{index}");
}

#[tokio::test]
async fn malformed_patch_is_rejected_and_not_persisted() {
    let ctx = TestContext::new().await;
    let company = ctx.company.create_company("Farmstock".to_string()).await.unwrap();

    let result = ctx
        .company
        .update_config(
            company.id,
            json!({ "purchasing": { "max_items_per_purchase": "many" } }),
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    // The stored config is untouched
    let config = ctx.company.effective_config(company.id).await.unwrap();
    assert_eq!(config.purchasing.max_items_per_purchase, 50);
}

#[tokio::test]
async fn method_toggles_respect_enabled_and_ready() {
    let ctx = TestContext::new().await;
    let company = ctx.company.create_company("Farmstock".to_string()).await.unwrap();

    let config = ctx
        .company
        .update_config(
            company.id,
            json!({
                "livestock": {
                    "depletion": {
                        "fifo": { "enabled": false, "status": "ready" },
                        "lifo": { "enabled": true, "status": "ready" }
                    }
                }
            }),
        )
        .await
        .unwrap();

    let methods = config.available_livestock_methods(MethodKind::Depletion);
    assert!(!methods.contains(&"fifo".to_string()));
    assert!(methods.contains(&"lifo".to_string()));
    // manual is untouched by the patch and stays available
    assert!(methods.contains(&"manual".to_string()));
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let ctx = TestContext::new().await;
    let result = ctx.company.effective_config(uuid::Uuid::new_v4()).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}
