//! Shared test harness: an in-memory SQLite database with the embedded
//! migrations applied, plus seed helpers for master data.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use farmstock_api::{
    db::DbPool,
    entities::{coop, farm, livestock_strain, partner},
    migrator::Migrator,
    services::{
        company_config::CompanyService,
        coops::{CoopService, CreateCoopRequest},
        farms::{CreateFarmRequest, FarmService},
        partners::{CreatePartnerRequest, PartnerService, PartnerType},
        purchases::{CreatePurchaseRequest, PurchaseItemInput, PurchaseService},
        strains::{CreateStrainRequest, StrainService},
    },
};

pub struct TestContext {
    pub db: Arc<DbPool>,
    pub partners: PartnerService,
    pub farms: FarmService,
    pub coops: CoopService,
    pub strains: StrainService,
    pub purchases: PurchaseService,
    pub company: CompanyService,
}

impl TestContext {
    pub async fn new() -> Self {
        // A single connection keeps every query on the same in-memory database
        let mut opts = ConnectOptions::new("sqlite::memory:".to_owned());
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts)
            .await
            .expect("sqlite in-memory connection");
        Migrator::up(&db, None).await.expect("migrations apply");

        let db = Arc::new(db);
        Self {
            partners: PartnerService::new(db.clone(), None),
            farms: FarmService::new(db.clone(), None),
            coops: CoopService::new(db.clone(), None),
            strains: StrainService::new(db.clone(), None),
            purchases: PurchaseService::new(db.clone(), None),
            company: CompanyService::new(db.clone(), None),
            db,
        }
    }

    pub async fn seed_farm(&self, code: &str) -> farm::Model {
        self.farms
            .create_farm(CreateFarmRequest {
                code: code.to_string(),
                name: format!("Farm {}", code),
                address: None,
            })
            .await
            .expect("seed farm")
    }

    pub async fn seed_coop(&self, farm_id: Uuid, code: &str, capacity: i32) -> coop::Model {
        self.coops
            .create_coop(CreateCoopRequest {
                farm_id,
                code: code.to_string(),
                name: format!("Coop {}", code),
                capacity,
            })
            .await
            .expect("seed coop")
    }

    pub async fn seed_partner(&self, name: &str, partner_type: PartnerType) -> partner::Model {
        self.partners
            .create_partner(CreatePartnerRequest {
                name: name.to_string(),
                partner_type,
                email: None,
                phone: None,
                address: None,
            })
            .await
            .expect("seed partner")
    }

    pub async fn seed_strain(&self, code: &str) -> livestock_strain::Model {
        self.strains
            .create_strain(CreateStrainRequest {
                code: code.to_string(),
                name: format!("Strain {}", code),
                description: None,
            })
            .await
            .expect("seed strain")
    }
}

pub fn item(strain_id: Uuid, quantity: i32, price: Decimal, weight: Decimal) -> PurchaseItemInput {
    PurchaseItemInput {
        strain_id,
        quantity,
        price_per_unit: price,
        weight_per_unit: weight,
    }
}

pub fn purchase_request(
    invoice: &str,
    supplier_id: Uuid,
    farm_id: Uuid,
    coop_id: Uuid,
    items: Vec<PurchaseItemInput>,
) -> CreatePurchaseRequest {
    CreatePurchaseRequest {
        invoice_number: invoice.to_string(),
        purchase_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        supplier_id,
        expedition_id: None,
        farm_id,
        coop_id,
        notes: None,
        items,
    }
}
