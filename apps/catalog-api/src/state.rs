//! Shared application state passed to the route builders.

use domain_catalog::{CatalogService, MongoEntityStore};
use mongodb::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: crate::config::Config,
    /// MongoDB client (cloneable, shares underlying connection pool)
    pub mongo_client: Client,
    pub catalog: Arc<CatalogService<MongoEntityStore>>,
}
