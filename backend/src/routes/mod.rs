//! Route definitions for the AgriOps Platform backend

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - harvest record lifecycle
        .nest("/harvest-records", harvest_record_routes())
        // Protected routes - individual crates
        .nest("/crates", crate_routes())
}

/// Harvest record routes (protected)
fn harvest_record_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_harvest_records).post(handlers::create_harvest_record),
        )
        .route(
            "/:record_id",
            get(handlers::get_harvest_record)
                .put(handlers::update_harvest_record)
                .delete(handlers::delete_harvest_record),
        )
        .route("/:record_id/submit", post(handlers::submit_harvest_record))
        .route(
            "/:record_id/approve",
            post(handlers::approve_harvest_record),
        )
        .route(
            "/:record_id/crates",
            get(handlers::list_crates).post(handlers::add_crates),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Crate routes (protected)
fn crate_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:crate_id",
            put(handlers::update_crate).delete(handlers::delete_crate),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}
