//! Catalog Domain
//!
//! Events and users stored in MongoDB, with ratings embedded in user
//! documents. Rating queries join the two collections in memory; user
//! writes (accounts, favorites, event reviews) go straight to the store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, query-parameter validation
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← snapshot → extract → aggregate → rank / compare / filter
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ EntityStore │  ← trait + MongoDB and in-memory implementations
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← lenient documents, dual identifiers
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_catalog::{
//!     AtomicIdAllocator, CatalogService, CatalogSettings, MongoEntityStore, handlers,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = mongodb::Client::with_uri_str("mongodb://localhost:27017").await?;
//! let settings = CatalogSettings::default();
//! let store = MongoEntityStore::new(&client, client.database("catalog"), &settings);
//!
//! let event_ids = AtomicIdAllocator::for_events(&store).await?;
//! let user_ids = AtomicIdAllocator::for_users(&store).await?;
//! let service = CatalogService::new(store, Arc::new(event_ids), Arc::new(user_ids), settings);
//!
//! let router = handlers::router(Arc::new(service));
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod allocator;
pub mod comparison;
pub mod config;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod identifier;
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod ranking;
pub mod repository;
pub mod service;
pub mod users;
pub mod validation;
pub mod year_filter;

// Re-export commonly used types
pub use aggregation::{EventStats, Mean, Stats};
pub use allocator::{AtomicIdAllocator, IdAllocator};
pub use config::CatalogSettings;
pub use error::{CatalogError, CatalogResult};
pub use extractor::{NormalizedRating, RatingExtractor};
pub use handlers::ApiDoc;
pub use identifier::{EventIndex, EventKey, RawEventRef};
pub use memory::InMemoryEntityStore;
pub use models::{DocumentId, Event, Favorite, Page, User};
pub use self::mongodb::MongoEntityStore;
pub use ranking::SortOrder;
pub use repository::EntityStore;
pub use service::CatalogService;
pub use users::{EventReview, NewFavorite, NewReview, NewUser};
