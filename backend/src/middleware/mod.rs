//! HTTP middleware for the AgriOps Platform backend

pub mod auth;

pub use auth::{auth_middleware, CurrentActor};
