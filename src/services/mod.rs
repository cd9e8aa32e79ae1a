pub mod audit;
pub mod company_config;
pub mod coops;
pub mod farms;
pub mod partners;
pub mod purchase_status;
pub mod purchases;
pub mod strains;

pub use audit::AuditRecorder;
pub use company_config::{CompanyConfig, CompanyService, MethodKind};
pub use coops::CoopService;
pub use farms::FarmService;
pub use partners::{PartnerService, PartnerType};
pub use purchase_status::PurchaseStatus;
pub use purchases::PurchaseService;
pub use strains::StrainService;
