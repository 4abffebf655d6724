pub mod admin;
pub mod common;
pub mod documents;
pub mod masters;
pub mod portal;
pub mod repair_orders;
pub mod reports;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    events::EventSender,
    services::{
        costing::CostingService, documents::DocumentService, mapping::MappingService,
        masters::MasterDataService, repair_orders::RepairOrderService, reports::ReportService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub repair_orders: Arc<RepairOrderService>,
    pub costing: Arc<CostingService>,
    pub documents: Arc<DocumentService>,
    pub mapping: Arc<MappingService>,
    pub masters: Arc<MasterDataService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, config: &AppConfig) -> Self {
        Self {
            repair_orders: Arc::new(RepairOrderService::new(db.clone(), event_sender.clone())),
            costing: Arc::new(CostingService::new(db.clone(), event_sender.clone())),
            documents: Arc::new(DocumentService::new(db.clone(), event_sender)),
            mapping: Arc::new(MappingService::new(
                db.clone(),
                config.company.clone(),
                config.default_warehouse.clone(),
            )),
            masters: Arc::new(MasterDataService::new(db.clone())),
            reports: Arc::new(ReportService::new(
                db,
                config.workday_hours,
                config.weekly_capacity_hours,
            )),
        }
    }
}
