use axum::{middleware, routing::get};
use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_catalog::{AtomicIdAllocator, CatalogService, MongoEntityStore};
use observability::{init_metrics, metrics_handler, metrics_middleware};
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    init_tracing(&config.environment);
    init_metrics()?;

    info!("Connecting to MongoDB at {}", config.mongodb.redacted_url());

    let mongo_client =
        database::mongodb::connect_from_config_with_retry(&config.mongodb, None).await?;
    let db = mongo_client.database(config.mongodb.database());

    info!(
        database = config.mongodb.database(),
        events = %config.catalog.events_collection,
        users = %config.catalog.users_collection,
        "Connected to MongoDB"
    );

    let store = MongoEntityStore::new(&mongo_client, db, &config.catalog);
    let (event_ids, user_ids) = tokio::try_join!(
        AtomicIdAllocator::for_events(&store),
        AtomicIdAllocator::for_users(&store)
    )?;
    let service = CatalogService::new(
        store,
        Arc::new(event_ids),
        Arc::new(user_ids),
        config.catalog.clone(),
    );

    let state = AppState {
        config,
        mongo_client,
        catalog: Arc::new(service),
    };

    // Build router with API routes
    let api_routes = api::routes(&state);

    // Create a router with OpenAPI docs
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes, &state.config.environment)?;

    // Merge health and metrics endpoints
    let app = router
        .merge(health_router(state.config.app.clone()))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(metrics_middleware));

    info!(
        "Starting catalog API (shutdown timeout {:?})",
        state.config.server.shutdown_timeout
    );

    let server = state.config.server.clone();
    let mongo_client = state.mongo_client.clone();
    create_production_app(app, &server, async move {
        info!("Shutting down: closing MongoDB connections");
        mongo_client.shutdown().await;
        info!("MongoDB connection closed successfully");
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Catalog API shutdown complete");
    Ok(())
}
