//! HTTP handlers for the AgriOps Platform backend

pub mod harvest_crate;
pub mod harvest_record;
pub mod health;

pub use harvest_crate::*;
pub use harvest_record::*;
pub use health::*;
