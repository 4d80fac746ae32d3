//! API routes module

pub mod health;

use axum::Router;

use crate::state::AppState;

/// Create all API routes
/// Note: These are nested under /api by axum_helpers::create_router
pub fn routes(state: &AppState) -> Router {
    Router::new()
        .merge(domain_catalog::handlers::router(state.catalog.clone()))
        .merge(health::router(state.clone()))
}
