//! Business logic services for the AgriOps Platform backend

pub mod harvest_crate;
pub mod harvest_record;
pub mod totals;

pub use harvest_crate::HarvestCrateService;
pub use harvest_record::HarvestRecordService;
