//! Shared types and domain logic for the AgriOps Platform
//!
//! This crate contains the harvest domain model, the grade aggregation
//! core, the authorization policy, and input validation rules shared
//! between the backend and other components of the system.

pub mod models;
pub mod policy;
pub mod totals;
pub mod validation;

pub use models::*;
pub use policy::*;
pub use totals::*;
pub use validation::*;
