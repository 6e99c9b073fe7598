//! Domain models for the AgriOps Platform

mod harvest;

pub use harvest::*;
