//! HTTP-level tests driving the real router with an in-memory database and a
//! temp-dir notification store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use farmstock_api::{
    config::{AppConfig, NotificationConfig},
    events::EventSender,
    handlers::AppServices,
    migrator::Migrator,
    notifications::{FileNotificationStore, NotificationBuilder, NotificationService},
    AppState,
};

struct TestApp {
    router: Router,
    notifications: Arc<FileNotificationStore>,
    _tempdir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let mut opts = ConnectOptions::new("sqlite::memory:".to_owned());
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts)
            .await
            .expect("sqlite in-memory connection");
        Migrator::up(&db, None).await.expect("migrations apply");
        let db = Arc::new(db);

        let tempdir = TempDir::new().expect("tempdir");
        let notification_config = NotificationConfig {
            file_path: tempdir.path().join("sse-notifications.json"),
            history_limit: 50,
            lock_attempts: 5,
            lock_backoff_ms: 5,
        };
        let notifications = Arc::new(FileNotificationStore::new(&notification_config));

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let notifier: Arc<dyn NotificationService> = notifications.clone();
        tokio::spawn(farmstock_api::events::process_events(event_rx, Some(notifier)));

        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 5,
            db_idle_timeout_secs: 60,
            db_acquire_timeout_secs: 5,
            event_channel_capacity: 64,
            notifications: notification_config,
        };

        let services = AppServices::new(db.clone(), Arc::new(event_sender.clone()));
        let state = AppState {
            db,
            config,
            event_sender,
            services,
            notifications: notifications.clone(),
        };

        let router = Router::new()
            .nest("/api/v1", farmstock_api::api_v1_routes())
            .with_state(state);

        Self {
            router,
            notifications,
            _tempdir: tempdir,
        }
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

#[tokio::test]
async fn status_endpoint_reports_service_name() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "farmstock-api");
}

#[tokio::test]
async fn health_endpoint_reports_healthy_checks() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["checks"]["database"], "healthy");
    assert_eq!(body["data"]["checks"]["notifications"], "healthy");
}

#[tokio::test]
async fn farm_crud_over_http() {
    let app = TestApp::new().await;

    let (status, farm) = app
        .request(
            Method::POST,
            "/api/v1/farms",
            Some(json!({ "code": "FRM1", "name": "North Farm" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let farm_id = farm["id"].as_str().expect("farm id").to_string();

    let (status, fetched) = app
        .request(Method::GET, &format!("/api/v1/farms/{}", farm_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["code"], "FRM1");

    // Duplicate code conflicts
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/farms",
            Some(json!({ "code": "FRM1", "name": "Duplicate" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_partner_returns_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/partners/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn purchase_workflow_over_http() {
    let app = TestApp::new().await;

    let (_, farm) = app
        .request(
            Method::POST,
            "/api/v1/farms",
            Some(json!({ "code": "FRM1", "name": "North Farm" })),
        )
        .await;
    let farm_id = farm["id"].as_str().unwrap().to_string();

    let (_, coop) = app
        .request(
            Method::POST,
            "/api/v1/coops",
            Some(json!({ "farm_id": farm_id, "code": "K01", "name": "Coop 1", "capacity": 1000 })),
        )
        .await;
    let coop_id = coop["id"].as_str().unwrap().to_string();

    let (_, supplier) = app
        .request(
            Method::POST,
            "/api/v1/partners",
            Some(json!({ "name": "Supplier A", "partner_type": "supplier" })),
        )
        .await;
    let supplier_id = supplier["id"].as_str().unwrap().to_string();

    let (_, strain) = app
        .request(
            Method::POST,
            "/api/v1/strains",
            Some(json!({ "code": "COBB", "name": "Cobb 500" })),
        )
        .await;
    let strain_id = strain["id"].as_str().unwrap().to_string();

    let (status, purchase) = app
        .request(
            Method::POST,
            "/api/v1/livestock-purchases",
            Some(json!({
                "invoice_number": "INV-001",
                "purchase_date": "2025-03-01",
                "supplier_id": supplier_id,
                "farm_id": farm_id,
                "coop_id": coop_id,
                "items": [
                    { "strain_id": strain_id, "quantity": 100, "price_per_unit": "5000", "weight_per_unit": "0.5" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(purchase["status"], "draft");
    let purchase_id = purchase["id"].as_str().unwrap().to_string();

    // Move into the coop; batches generate on the way
    let (status, updated) = app
        .request(
            Method::PUT,
            &format!("/api/v1/livestock-purchases/{}/status", purchase_id),
            Some(json!({ "status": "in_coop" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "in_coop");

    // Generation is idempotent through the endpoint as well
    let (status, outcome) = app
        .request(
            Method::POST,
            &format!("/api/v1/livestock-purchases/{}/generate-batches", purchase_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "already_generated");

    // Deleting an in-coop purchase is rejected
    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/livestock-purchases/{}", purchase_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn capacity_overflow_maps_to_unprocessable_entity() {
    let app = TestApp::new().await;

    let (_, farm) = app
        .request(
            Method::POST,
            "/api/v1/farms",
            Some(json!({ "code": "FRM1", "name": "North Farm" })),
        )
        .await;
    let farm_id = farm["id"].as_str().unwrap().to_string();
    let (_, coop) = app
        .request(
            Method::POST,
            "/api/v1/coops",
            Some(json!({ "farm_id": farm_id, "code": "K01", "name": "Small coop", "capacity": 50 })),
        )
        .await;
    let coop_id = coop["id"].as_str().unwrap().to_string();
    let (_, supplier) = app
        .request(
            Method::POST,
            "/api/v1/partners",
            Some(json!({ "name": "Supplier A", "partner_type": "supplier" })),
        )
        .await;
    let supplier_id = supplier["id"].as_str().unwrap().to_string();
    let (_, strain) = app
        .request(
            Method::POST,
            "/api/v1/strains",
            Some(json!({ "code": "COBB", "name": "Cobb 500" })),
        )
        .await;
    let strain_id = strain["id"].as_str().unwrap().to_string();

    let (_, purchase) = app
        .request(
            Method::POST,
            "/api/v1/livestock-purchases",
            Some(json!({
                "invoice_number": "INV-001",
                "purchase_date": "2025-03-01",
                "supplier_id": supplier_id,
                "farm_id": farm_id,
                "coop_id": coop_id,
                "items": [
                    { "strain_id": strain_id, "quantity": 100, "price_per_unit": "5000", "weight_per_unit": "0.5" }
                ]
            })),
        )
        .await;
    let purchase_id = purchase["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/livestock-purchases/{}/generate-batches", purchase_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("capacity"));
}

#[tokio::test]
async fn recent_notifications_come_from_the_file_store() {
    let app = TestApp::new().await;

    app.notifications
        .send(NotificationBuilder::system("bridge online"))
        .await
        .unwrap();

    let (status, body) = app
        .request(Method::GET, "/api/v1/notifications?limit=10", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().expect("notification array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["message"], "bridge online");
    assert_eq!(items[0]["type"], "system_message");
}
