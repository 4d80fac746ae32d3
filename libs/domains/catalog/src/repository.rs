use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::CatalogResult;
use crate::identifier::{EventKey, RawEventRef};
use crate::models::{DocumentId, Event, Favorite, User};
use crate::users::EventReview;

/// Read/write access to the event and user collections
///
/// Queries over ratings read whole collections; the paged and keyed lookups
/// serve listings, detail views and joins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// All events in store order
    async fn list_all_events(&self) -> CatalogResult<Vec<Event>>;

    /// All users in store order
    async fn list_all_users(&self) -> CatalogResult<Vec<User>>;

    /// Events matching any of the references under either identifier form
    async fn find_events_by_keys(&self, refs: &[RawEventRef]) -> CatalogResult<Vec<Event>>;

    async fn find_user(&self, id: &DocumentId) -> CatalogResult<Option<User>>;

    /// One page of events in store order
    async fn list_events_page(&self, skip: u64, limit: u64) -> CatalogResult<Vec<Event>>;

    async fn count_events(&self) -> CatalogResult<u64>;

    /// One page of users, `_id` descending
    async fn list_users_page(&self, skip: u64, limit: u64) -> CatalogResult<Vec<User>>;

    async fn count_users(&self) -> CatalogResult<u64>;

    /// Insert events and return them with their store ids set
    async fn insert_events(&self, events: Vec<Event>) -> CatalogResult<Vec<Event>>;

    /// Highest sequential `id` currently stored
    async fn max_event_seq(&self) -> CatalogResult<Option<i64>>;

    /// Insert users; their `_id` is already assigned
    async fn insert_users(&self, users: Vec<User>) -> CatalogResult<Vec<User>>;

    /// Highest numeric user `_id` currently stored
    async fn max_user_id(&self) -> CatalogResult<Option<i64>>;

    /// Set top-level fields on a user; false when no user matched
    async fn update_user(&self, id: &DocumentId, fields: Map<String, Value>) -> CatalogResult<bool>;

    /// False when no user matched
    async fn delete_user(&self, id: &DocumentId) -> CatalogResult<bool>;

    /// Append to the `reviews` array of the event with this canonical key;
    /// false when no event matched
    async fn push_event_review(&self, key: &EventKey, review: &EventReview) -> CatalogResult<bool>;

    /// Append to a user's favorites; false when no user matched
    async fn push_favorite(&self, user_id: &DocumentId, favorite: &Favorite) -> CatalogResult<bool>;

    /// Remove every favorite with this movieid; false when nothing was removed
    async fn pull_favorite(&self, user_id: &DocumentId, movieid: &DocumentId) -> CatalogResult<bool>;

    /// Check the backing store is reachable
    async fn ping(&self) -> CatalogResult<()>;
}
