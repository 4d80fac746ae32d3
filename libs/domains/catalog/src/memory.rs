use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::{CatalogError, CatalogResult};
use crate::identifier::{EventKey, RawEventRef};
use crate::models::{DocumentId, Event, Favorite, User};
use crate::repository::EntityStore;
use crate::users::EventReview;

#[derive(Debug, Default)]
struct Collections {
    events: Vec<Event>,
    users: Vec<User>,
    next_store_id: u64,
}

/// In-memory implementation of EntityStore (for development/testing)
///
/// Store ids assigned on insert are 24-digit hex strings, like ObjectIds,
/// and never all-decimal so they cannot be mistaken for sequential ids.
#[derive(Debug, Clone)]
pub struct InMemoryEntityStore {
    inner: Arc<RwLock<Collections>>,
    available: Arc<AtomicBool>,
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl InMemoryEntityStore {
    pub fn new(events: Vec<Event>, users: Vec<User>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Collections {
                events,
                users,
                next_store_id: 1,
            })),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make `ping` fail, as if the store went away
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

/// Same matching rules as the MongoDB filter
fn matches_ref(event: &Event, reference: &RawEventRef) -> bool {
    match reference {
        RawEventRef::Int(n) => {
            event.id == Some(*n)
                || matches!(&event.store_id, Some(DocumentId::Int(id)) if id == n)
                || matches!(&event.store_id, Some(DocumentId::Text(id)) if *id == n.to_string())
        }
        RawEventRef::Text(s) => {
            matches!(&event.store_id, Some(DocumentId::Text(id)) if id == s)
                || s.parse::<i64>().is_ok_and(|n| {
                    event.id == Some(n)
                        || matches!(&event.store_id, Some(DocumentId::Int(id)) if *id == n)
                })
        }
    }
}

fn matches_user(user: &User, id: &DocumentId) -> bool {
    match (&user.id, id) {
        (DocumentId::Text(stored), DocumentId::Int(n)) => *stored == n.to_string(),
        (stored, wanted) => stored == wanted,
    }
}

fn matches_key(event: &Event, key: &EventKey) -> bool {
    match key {
        EventKey::Seq(n) => event.id == Some(*n),
        EventKey::Store(id) => event.store_id.as_ref() == Some(id),
    }
}

fn store_id(n: u64) -> String {
    format!("ca7a{:020x}", n)
}

fn page<T: Clone>(items: &[T], skip: u64, limit: u64) -> Vec<T> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    items.iter().skip(skip).take(limit).cloned().collect()
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn list_all_events(&self) -> CatalogResult<Vec<Event>> {
        Ok(self.inner.read().await.events.clone())
    }

    async fn list_all_users(&self) -> CatalogResult<Vec<User>> {
        Ok(self.inner.read().await.users.clone())
    }

    async fn find_events_by_keys(&self, refs: &[RawEventRef]) -> CatalogResult<Vec<Event>> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .iter()
            .filter(|event| refs.iter().any(|r| matches_ref(event, r)))
            .cloned()
            .collect())
    }

    async fn find_user(&self, id: &DocumentId) -> CatalogResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|user| matches_user(user, id)).cloned())
    }

    async fn list_events_page(&self, skip: u64, limit: u64) -> CatalogResult<Vec<Event>> {
        Ok(page(&self.inner.read().await.events, skip, limit))
    }

    async fn count_events(&self) -> CatalogResult<u64> {
        Ok(self.inner.read().await.events.len() as u64)
    }

    async fn list_users_page(&self, skip: u64, limit: u64) -> CatalogResult<Vec<User>> {
        let mut users = self.inner.read().await.users.clone();
        users.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page(&users, skip, limit))
    }

    async fn count_users(&self) -> CatalogResult<u64> {
        Ok(self.inner.read().await.users.len() as u64)
    }

    async fn insert_events(&self, events: Vec<Event>) -> CatalogResult<Vec<Event>> {
        let mut inner = self.inner.write().await;
        let mut stored = Vec::with_capacity(events.len());

        for mut event in events {
            if event.store_id.is_none() {
                event.store_id = Some(DocumentId::Text(store_id(inner.next_store_id)));
                inner.next_store_id += 1;
            }
            inner.events.push(event.clone());
            stored.push(event);
        }

        tracing::info!(count = stored.len(), "Events inserted");
        Ok(stored)
    }

    async fn max_event_seq(&self) -> CatalogResult<Option<i64>> {
        Ok(self.inner.read().await.events.iter().filter_map(|e| e.id).max())
    }

    async fn insert_users(&self, users: Vec<User>) -> CatalogResult<Vec<User>> {
        let mut inner = self.inner.write().await;
        inner.users.extend(users.iter().cloned());
        tracing::info!(count = users.len(), "Users inserted");
        Ok(users)
    }

    async fn max_user_id(&self) -> CatalogResult<Option<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .filter_map(|user| match user.id {
                DocumentId::Int(n) => Some(n),
                DocumentId::Text(_) => None,
            })
            .max())
    }

    async fn update_user(&self, id: &DocumentId, fields: Map<String, Value>) -> CatalogResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.iter_mut().find(|user| matches_user(user, id)) else {
            return Ok(false);
        };

        let mut document = match serde_json::to_value(&*user)? {
            Value::Object(map) => map,
            other => {
                return Err(CatalogError::Internal(format!(
                    "user encoded to a non-object value: {}",
                    other
                )));
            }
        };
        document.extend(fields);
        document.insert("_id".to_string(), serde_json::to_value(&user.id)?);
        *user = serde_json::from_value(Value::Object(document))?;
        Ok(true)
    }

    async fn delete_user(&self, id: &DocumentId) -> CatalogResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.users.len();
        if let Some(position) = inner.users.iter().position(|user| matches_user(user, id)) {
            inner.users.remove(position);
        }
        Ok(inner.users.len() < before)
    }

    async fn push_event_review(&self, key: &EventKey, review: &EventReview) -> CatalogResult<bool> {
        let review = serde_json::to_value(review)?;
        let mut inner = self.inner.write().await;
        let Some(event) = inner.events.iter_mut().find(|event| matches_key(event, key)) else {
            return Ok(false);
        };

        match event.reviews.as_mut() {
            Some(Value::Array(reviews)) => reviews.push(review),
            _ => event.reviews = Some(Value::Array(vec![review])),
        }
        Ok(true)
    }

    async fn push_favorite(&self, user_id: &DocumentId, favorite: &Favorite) -> CatalogResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.iter_mut().find(|user| matches_user(user, user_id)) else {
            return Ok(false);
        };
        user.favorites.push(favorite.clone());
        Ok(true)
    }

    async fn pull_favorite(&self, user_id: &DocumentId, movieid: &DocumentId) -> CatalogResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.iter_mut().find(|user| matches_user(user, user_id)) else {
            return Ok(false);
        };
        let before = user.favorites.len();
        user.favorites.retain(|favorite| favorite.movieid != *movieid);
        Ok(user.favorites.len() < before)
    }

    async fn ping(&self) -> CatalogResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CatalogError::Internal("store unavailable".to_string()))
        }
    }
}
