//! Sequential id allocation for events and users.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{CatalogError, CatalogResult};
use crate::repository::EntityStore;

/// Hands out contiguous blocks of sequential ids
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdAllocator: Send + Sync {
    /// Reserve `count` ids and return the first; the block is
    /// `first..first + count`
    async fn allocate(&self, count: u64) -> CatalogResult<i64>;
}

/// Process-local allocator backed by an atomic counter
#[derive(Debug)]
pub struct AtomicIdAllocator {
    next: AtomicI64,
}

impl AtomicIdAllocator {
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    /// Seed past the highest event `id` stored; 1 for an empty collection
    pub async fn for_events<S: EntityStore + ?Sized>(store: &S) -> CatalogResult<Self> {
        Self::seeded("events", store.max_event_seq().await?)
    }

    /// Seed past the highest numeric user `_id` stored
    pub async fn for_users<S: EntityStore + ?Sized>(store: &S) -> CatalogResult<Self> {
        Self::seeded("users", store.max_user_id().await?)
    }

    fn seeded(collection: &str, max: Option<i64>) -> CatalogResult<Self> {
        let first = match max {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                CatalogError::Internal(format!("{} id space exhausted", collection))
            })?,
            None => 1,
        };
        tracing::info!(collection, first_id = first, "Id allocator seeded");
        Ok(Self::starting_at(first.max(1)))
    }
}

#[async_trait]
impl IdAllocator for AtomicIdAllocator {
    async fn allocate(&self, count: u64) -> CatalogResult<i64> {
        let count = i64::try_from(count)
            .map_err(|_| CatalogError::validation("batch too large for id allocation"))?;

        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(count))
            .map_err(|_| CatalogError::Internal("id space exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEntityStore;
    use crate::models::{DocumentId, Event, User};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_blocks_are_contiguous_and_disjoint() {
        let allocator = AtomicIdAllocator::starting_at(10);
        assert_eq!(allocator.allocate(3).await.unwrap(), 10);
        assert_eq!(allocator.allocate(1).await.unwrap(), 13);
        assert_eq!(allocator.allocate(2).await.unwrap(), 14);
    }

    #[tokio::test]
    async fn test_seed_from_empty_store() {
        let store = InMemoryEntityStore::default();
        let events = AtomicIdAllocator::for_events(&store).await.unwrap();
        assert_eq!(events.allocate(1).await.unwrap(), 1);
        let users = AtomicIdAllocator::for_users(&store).await.unwrap();
        assert_eq!(users.allocate(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seed_from_max_id() {
        let events = [4, 17, 9]
            .into_iter()
            .map(|id| Event {
                id: Some(id),
                ..Default::default()
            })
            .collect();
        let users = vec![
            User::new(DocumentId::Int(6)),
            User::new(DocumentId::Text("65f0c0ffee0000000000abcd".into())),
        ];
        let store = InMemoryEntityStore::new(events, users);

        let events = AtomicIdAllocator::for_events(&store).await.unwrap();
        assert_eq!(events.allocate(1).await.unwrap(), 18);
        let users = AtomicIdAllocator::for_users(&store).await.unwrap();
        assert_eq!(users.allocate(1).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_overflow_is_an_error() {
        let allocator = AtomicIdAllocator::starting_at(i64::MAX - 1);
        assert!(allocator.allocate(5).await.is_err());
        assert_eq!(allocator.allocate(1).await.unwrap(), i64::MAX - 1);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_never_overlap() {
        let allocator = Arc::new(AtomicIdAllocator::starting_at(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                tokio::spawn(async move { allocator.allocate(5).await.unwrap() })
            })
            .collect();

        let mut firsts = Vec::new();
        for handle in handles {
            firsts.push(handle.await.unwrap());
        }
        firsts.sort_unstable();
        for pair in firsts.windows(2) {
            assert_eq!(pair[1] - pair[0], 5);
        }
    }
}
