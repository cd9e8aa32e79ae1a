use std::sync::Arc;

use crate::{
    db::DbPool,
    events::EventSender,
    services::{
        company_config::CompanyService, coops::CoopService, farms::FarmService,
        partners::PartnerService, purchases::PurchaseService, strains::StrainService,
    },
};

pub mod common;
pub mod company;
pub mod coops;
pub mod farms;
pub mod notifications;
pub mod partners;
pub mod purchases;
pub mod strains;

/// Aggregated service handles shared by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub partners: Arc<PartnerService>,
    pub farms: Arc<FarmService>,
    pub coops: Arc<CoopService>,
    pub strains: Arc<StrainService>,
    pub purchases: Arc<PurchaseService>,
    pub company: Arc<CompanyService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            partners: Arc::new(PartnerService::new(db.clone(), Some(event_sender.clone()))),
            farms: Arc::new(FarmService::new(db.clone(), Some(event_sender.clone()))),
            coops: Arc::new(CoopService::new(db.clone(), Some(event_sender.clone()))),
            strains: Arc::new(StrainService::new(db.clone(), Some(event_sender.clone()))),
            purchases: Arc::new(PurchaseService::new(db.clone(), Some(event_sender.clone()))),
            company: Arc::new(CompanyService::new(db, Some(event_sender))),
        }
    }
}
