//! Catalog Service - query orchestration over store snapshots
//!
//! Every rating query reads a fresh snapshot of both collections and runs
//! the extraction, aggregation and ranking passes in memory. Nothing is
//! cached between requests.

use chrono::{NaiveDate, Utc};
use observability::{CatalogMetrics, SoftCondition};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use utoipa::ToSchema;

use crate::aggregation::{Aggregation, EventStats, Mean, aggregate};
use crate::allocator::IdAllocator;
use crate::comparison::{Comparison, compare};
use crate::config::CatalogSettings;
use crate::error::{CatalogError, CatalogResult};
use crate::extractor::RatingExtractor;
use crate::identifier::{EventIndex, EventKey, RawEventRef};
use crate::models::{DocumentId, Event, Favorite, Page, User};
use crate::ranking::{RankedEvent, RankingKey, SortOrder, TopReviewer, rank_events, rank_reviewers};
use crate::repository::EntityStore;
use crate::users::{EventReview, NewFavorite, NewReview, NewUser, validate_patch};
use crate::validation::parse_user_id;
use crate::year_filter::events_in_year;

const PROFILE_TOP_EVENTS: usize = 3;
const UNTITLED: &str = "Untitled";

/// Statistics of one event
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EventStatsView {
    pub event_id: EventKey,
    pub title: Option<String>,
    pub stats: EventStats,
}

/// An event with its rating summary
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    /// Null when the event has no qualifying ratings
    pub average_rating: Option<Mean>,
    pub stats: EventStats,
}

/// Events with at least one rating dated in `year`, by canonical key
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct YearReport {
    pub year: i32,
    pub total: usize,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i64>,
    pub occupation: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            gender: user.gender.clone(),
            age: user.age,
            occupation: user.occupation.clone(),
        }
    }
}

/// One of a user's best-rated events
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProfileEvent {
    pub event_id: EventKey,
    pub title: String,
    pub rating: u8,
    pub date: Option<NaiveDate>,
    pub subject: Option<String>,
    pub venue: Option<String>,
    pub link: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub featured_image: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserProfile {
    pub user: UserSummary,
    pub top_events: Vec<ProfileEvent>,
}

/// A user's favorites, in the order they were added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FavoritesView {
    pub total: usize,
    pub data: Vec<Favorite>,
}

/// Both collections as read for one query
struct Snapshot {
    events: Vec<Event>,
    users: Vec<User>,
}

/// Catalog service providing the rating queries, listings, ingestion and
/// user writes
pub struct CatalogService<S: EntityStore> {
    store: Arc<S>,
    event_ids: Arc<dyn IdAllocator>,
    user_ids: Arc<dyn IdAllocator>,
    settings: CatalogSettings,
    extractor: RatingExtractor,
}

impl<S: EntityStore> CatalogService<S> {
    pub fn new(
        store: S,
        event_ids: Arc<dyn IdAllocator>,
        user_ids: Arc<dyn IdAllocator>,
        settings: CatalogSettings,
    ) -> Self {
        let extractor = RatingExtractor::new().with_event_reviews(settings.include_event_reviews);
        Self {
            store: Arc::new(store),
            event_ids,
            user_ids,
            settings,
            extractor,
        }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    async fn snapshot(&self) -> CatalogResult<Snapshot> {
        let (events, users) =
            tokio::try_join!(self.store.list_all_events(), self.store.list_all_users())?;
        tracing::debug!(events = events.len(), users = users.len(), "Snapshot read");
        Ok(Snapshot { events, users })
    }

    fn aggregate_snapshot(&self, snapshot: &Snapshot, index: &EventIndex<'_>) -> Aggregation {
        let aggregation = aggregate(self.extractor.extract(&snapshot.users, &snapshot.events), index);
        self.record_skipped(&snapshot.users, &snapshot.events, aggregation.dangling);
        aggregation
    }

    /// Count records that were skipped; never fails the query
    fn record_skipped(&self, users: &[User], events: &[Event], dangling: u64) {
        let report = self.extractor.report(users, events);
        CatalogMetrics::record_soft_condition(SoftCondition::MalformedRating, report.malformed);
        CatalogMetrics::record_soft_condition(SoftCondition::DanglingReference, dangling);
        if report.malformed > 0 || dangling > 0 {
            tracing::debug!(
                malformed = report.malformed,
                dangling = dangling,
                qualifying = report.qualifying,
                "Skipped rating records"
            );
        }
    }

    async fn rank(
        &self,
        operation: &'static str,
        ranked_by: RankingKey,
        order: SortOrder,
        limit: NonZeroUsize,
    ) -> CatalogResult<Vec<RankedEvent>> {
        let started = Instant::now();
        let snapshot = self.snapshot().await?;
        let index = EventIndex::build(&snapshot.events);
        let aggregation = self.aggregate_snapshot(&snapshot, &index);

        let ranked = rank_events(&index, &aggregation, ranked_by, order, limit);
        CatalogMetrics::record_query(operation, started.elapsed());
        Ok(ranked)
    }

    /// Stats of a single event, or `NoRatings`
    ///
    /// The reference is resolved against every stored event, so a rating
    /// aimed at another event never lands on this one.
    #[instrument(skip(self))]
    pub async fn compute_event_stats(&self, event_id: &str) -> CatalogResult<EventStatsView> {
        let started = Instant::now();
        let snapshot = self.snapshot().await?;
        let index = EventIndex::build(&snapshot.events);
        let key = resolve_key(&index, event_id)?;
        let aggregation = self.aggregate_snapshot(&snapshot, &index);

        let title = index
            .get(&key)
            .and_then(|event| event.title_text().map(str::to_string));
        CatalogMetrics::record_query("compute_event_stats", started.elapsed());
        Ok(EventStatsView {
            stats: aggregation.event_stats(&key),
            event_id: key,
            title,
        })
    }

    /// Events by mean rating, best first; unrated events are left out
    #[instrument(skip(self))]
    pub async fn top_events_by_mean(&self, limit: NonZeroUsize) -> CatalogResult<Vec<RankedEvent>> {
        self.rank("top_events_by_mean", RankingKey::MeanRating, SortOrder::Desc, limit)
            .await
    }

    #[instrument(skip(self))]
    pub async fn top_events_by_review_count(
        &self,
        order: SortOrder,
        limit: NonZeroUsize,
    ) -> CatalogResult<Vec<RankedEvent>> {
        self.rank("top_events_by_review_count", RankingKey::ReviewCount, order, limit)
            .await
    }

    #[instrument(skip(self))]
    pub async fn top_events_by_five_star(
        &self,
        limit: NonZeroUsize,
    ) -> CatalogResult<Vec<RankedEvent>> {
        self.rank("top_events_by_five_star", RankingKey::FiveStarCount, SortOrder::Desc, limit)
            .await
    }

    /// Compare two events; either unresolved reference is `EventNotFound`
    #[instrument(skip(self))]
    pub async fn compare_events(&self, event_a: &str, event_b: &str) -> CatalogResult<Comparison> {
        let started = Instant::now();
        let snapshot = self.snapshot().await?;
        let index = EventIndex::build(&snapshot.events);
        let key_a = resolve_key(&index, event_a)?;
        let key_b = resolve_key(&index, event_b)?;

        let aggregation = self.aggregate_snapshot(&snapshot, &index);
        let side = |key: &EventKey| -> CatalogResult<(EventKey, Event, EventStats)> {
            let event = index
                .get(key)
                .ok_or_else(|| CatalogError::Internal(format!("indexed event {} missing", key)))?;
            Ok((key.clone(), event.clone(), aggregation.event_stats(key)))
        };
        let (a, b) = (side(&key_a)?, side(&key_b)?);

        let comparison = compare((&a.0, &a.1, a.2), (&b.0, &b.1, b.2));
        CatalogMetrics::record_query("compare_events", started.elapsed());
        Ok(comparison)
    }

    /// Events with at least one rating dated in `year`, ordered by canonical key
    #[instrument(skip(self))]
    pub async fn events_reviewed_in_year(&self, year: i32) -> CatalogResult<YearReport> {
        let started = Instant::now();
        let snapshot = self.snapshot().await?;
        let index = EventIndex::build(&snapshot.events);

        let matches = events_in_year(
            self.extractor.extract(&snapshot.users, &snapshot.events),
            &index,
            year,
        );
        CatalogMetrics::record_soft_condition(SoftCondition::UndatedRating, matches.undated);
        self.record_skipped(&snapshot.users, &snapshot.events, matches.dangling);

        let events: Vec<Event> = matches
            .keys
            .iter()
            .filter_map(|key| index.get(key).cloned())
            .collect();
        CatalogMetrics::record_query("events_reviewed_in_year", started.elapsed());
        Ok(YearReport {
            year,
            total: events.len(),
            events,
        })
    }

    /// Users with the most qualifying ratings
    #[instrument(skip(self))]
    pub async fn top_reviewers(&self, limit: NonZeroUsize) -> CatalogResult<Vec<TopReviewer>> {
        let started = Instant::now();
        let users = self.store.list_all_users().await?;
        self.record_skipped(&users, &[], 0);

        let ranked = rank_reviewers(&users, &self.extractor, limit);
        CatalogMetrics::record_query("top_reviewers", started.elapsed());
        Ok(ranked)
    }

    /// One fixed-size page of events in store order
    #[instrument(skip(self))]
    pub async fn list_events(&self, page: u64) -> CatalogResult<Page<Event>> {
        let limit = self.settings.page_size.get() as u64;
        let skip = page.saturating_sub(1).saturating_mul(limit);
        let (total, data) = tokio::try_join!(
            self.store.count_events(),
            self.store.list_events_page(skip, limit)
        )?;
        Ok(Page::new(page, limit, total, data))
    }

    /// One fixed-size page of users, newest `_id` first
    #[instrument(skip(self))]
    pub async fn list_users(&self, page: u64) -> CatalogResult<Page<User>> {
        let limit = self.settings.page_size.get() as u64;
        let skip = page.saturating_sub(1).saturating_mul(limit);
        let (total, data) = tokio::try_join!(
            self.store.count_users(),
            self.store.list_users_page(skip, limit)
        )?;
        Ok(Page::new(page, limit, total, data))
    }

    /// An event resolved under either identifier form, with its rating summary
    #[instrument(skip(self))]
    pub async fn event_detail(&self, event_id: &str) -> CatalogResult<EventDetail> {
        let started = Instant::now();
        let snapshot = self.snapshot().await?;
        let index = EventIndex::build(&snapshot.events);
        let key = resolve_key(&index, event_id)?;
        let aggregation = self.aggregate_snapshot(&snapshot, &index);

        let stats = aggregation.event_stats(&key);
        let event = index
            .get(&key)
            .cloned()
            .ok_or_else(|| CatalogError::EventNotFound(event_id.to_string()))?;
        CatalogMetrics::record_query("event_detail", started.elapsed());
        Ok(EventDetail {
            event,
            average_rating: stats.mean(),
            stats,
        })
    }

    /// A user's summary and their three best-rated existing events
    #[instrument(skip(self))]
    pub async fn user_profile(&self, user_id: &str) -> CatalogResult<UserProfile> {
        let started = Instant::now();
        let id = parse_user_id(user_id)?;
        let user = self.find_user(&id, user_id).await?;

        let mut ratings: Vec<_> = self.extractor.extract_user(&user).collect();
        // stable: equal ratings keep insertion order
        ratings.sort_by(|a, b| b.value.cmp(&a.value));

        let refs: Vec<RawEventRef> = ratings
            .iter()
            .map(|r| r.event_ref.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let events = self.store.find_events_by_keys(&refs).await?;
        let index = EventIndex::build(&events);

        let top_events: Vec<ProfileEvent> = ratings
            .iter()
            .filter_map(|rating| {
                let key = index.resolve(&rating.event_ref)?;
                let event = index.get(key)?;
                Some(ProfileEvent {
                    event_id: key.clone(),
                    title: event.title_text().unwrap_or(UNTITLED).to_string(),
                    rating: rating.value,
                    date: rating.date,
                    subject: event.subject_text().map(str::to_string),
                    venue: event.venue_name().map(str::to_string),
                    link: event.link_text().map(str::to_string),
                    featured_image: event.featured_media_large.clone(),
                })
            })
            .take(PROFILE_TOP_EVENTS)
            .collect();

        CatalogMetrics::record_query("user_profile", started.elapsed());
        Ok(UserProfile {
            user: UserSummary::from(&user),
            top_events,
        })
    }

    /// Insert a batch of events under freshly allocated sequential ids
    ///
    /// Caller-supplied `id` and `_id` values are replaced.
    #[instrument(skip(self, events), fields(batch = events.len()))]
    pub async fn create_events(&self, events: Vec<Event>) -> CatalogResult<Vec<Event>> {
        if events.is_empty() {
            return Err(CatalogError::validation("at least one event is required"));
        }
        if let Some(position) = events.iter().position(Event::has_blank_title) {
            return Err(CatalogError::validation(format!(
                "event at position {} has an empty title",
                position
            )));
        }

        let first = self.event_ids.allocate(events.len() as u64).await?;
        let events = events
            .into_iter()
            .zip(first..)
            .map(|(mut event, id)| {
                event.id = Some(id);
                event.store_id = None;
                event
            })
            .collect();

        let stored = self.store.insert_events(events).await?;
        tracing::info!(first_id = first, count = stored.len(), "Events created");
        Ok(stored)
    }

    /// Validate and insert users under freshly allocated sequential `_id`s
    ///
    /// Nothing is inserted when any record is invalid.
    #[instrument(skip(self, users), fields(batch = users.len()))]
    pub async fn create_users(&self, users: Vec<NewUser>) -> CatalogResult<Vec<User>> {
        if users.is_empty() {
            return Err(CatalogError::validation("at least one user is required"));
        }
        let validated = users
            .into_iter()
            .enumerate()
            .map(|(position, user)| user.check(position))
            .collect::<CatalogResult<Vec<_>>>()?;

        let first = self.user_ids.allocate(validated.len() as u64).await?;
        let users = validated
            .into_iter()
            .zip(first..)
            .map(|(user, id)| user.into_user(id))
            .collect();

        let stored = self.store.insert_users(users).await?;
        tracing::info!(first_id = first, count = stored.len(), "Users created");
        Ok(stored)
    }

    /// Set fields on a user and return the updated document
    #[instrument(skip(self, fields))]
    pub async fn update_user(&self, user_id: &str, fields: Map<String, Value>) -> CatalogResult<User> {
        let id = parse_user_id(user_id)?;
        let fields = validate_patch(fields)?;
        if !self.store.update_user(&id, fields).await? {
            return Err(CatalogError::UserNotFound(user_id.to_string()));
        }
        tracing::info!(user_id = %id, "User updated");
        self.find_user(&id, user_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> CatalogResult<()> {
        let id = parse_user_id(user_id)?;
        if !self.store.delete_user(&id).await? {
            return Err(CatalogError::UserNotFound(user_id.to_string()));
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Append a review dated today (UTC) to an event's `reviews`
    #[instrument(skip(self, review))]
    pub async fn add_event_review(
        &self,
        user_id: &str,
        event_id: &str,
        review: NewReview,
    ) -> CatalogResult<EventReview> {
        let id = parse_user_id(user_id)?;
        let review = review.into_review(id.clone(), Utc::now().date_naive())?;
        self.find_user(&id, user_id).await?;

        let reference = RawEventRef::parse(event_id)
            .ok_or_else(|| CatalogError::EventNotFound(event_id.to_string()))?;
        // every event matching the reference under any form is fetched, so
        // resolution here agrees with a full index
        let candidates = self
            .store
            .find_events_by_keys(std::slice::from_ref(&reference))
            .await?;
        let key = resolve_key(&EventIndex::build(&candidates), event_id)?;

        if !self.store.push_event_review(&key, &review).await? {
            return Err(CatalogError::EventNotFound(event_id.to_string()));
        }
        tracing::info!(user_id = %id, event_id = %key, rating = review.rating, "Review added");
        Ok(review)
    }

    #[instrument(skip(self))]
    pub async fn list_favorites(&self, user_id: &str) -> CatalogResult<FavoritesView> {
        let id = parse_user_id(user_id)?;
        let user = self.find_user(&id, user_id).await?;
        Ok(FavoritesView {
            total: user.favorites.len(),
            data: user.favorites,
        })
    }

    /// Add a favorite; adding the same movieid twice is a conflict
    #[instrument(skip(self, favorite))]
    pub async fn add_favorite(&self, user_id: &str, favorite: NewFavorite) -> CatalogResult<Favorite> {
        let id = parse_user_id(user_id)?;
        let favorite = favorite.into_favorite()?;
        let user = self.find_user(&id, user_id).await?;

        if user.favorites.contains(&favorite) {
            return Err(CatalogError::Conflict(format!(
                "event {} is already a favorite",
                favorite.movieid
            )));
        }
        if !self.store.push_favorite(&id, &favorite).await? {
            return Err(CatalogError::UserNotFound(user_id.to_string()));
        }
        tracing::info!(user_id = %id, movieid = %favorite.movieid, "Favorite added");
        Ok(favorite)
    }

    #[instrument(skip(self))]
    pub async fn remove_favorite(&self, user_id: &str, movieid: &str) -> CatalogResult<()> {
        let id = parse_user_id(user_id)?;
        let movieid = movieid.trim();
        if movieid.is_empty() {
            return Err(CatalogError::validation("movieid is required"));
        }
        let movieid = DocumentId::parse(movieid);
        self.find_user(&id, user_id).await?;

        if !self.store.pull_favorite(&id, &movieid).await? {
            return Err(CatalogError::FavoriteNotFound {
                user_id: id.to_string(),
                movieid: movieid.to_string(),
            });
        }
        tracing::info!(user_id = %id, movieid = %movieid, "Favorite removed");
        Ok(())
    }

    async fn find_user(&self, id: &DocumentId, raw: &str) -> CatalogResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| CatalogError::UserNotFound(raw.to_string()))
    }

    /// Check the store answers
    pub async fn ready(&self) -> CatalogResult<()> {
        self.store.ping().await
    }
}

/// Resolve a caller's event reference; empty or unknown is `EventNotFound`
fn resolve_key(index: &EventIndex<'_>, raw: &str) -> CatalogResult<EventKey> {
    RawEventRef::parse(raw)
        .and_then(|reference| index.resolve(&reference).cloned())
        .ok_or_else(|| CatalogError::EventNotFound(raw.to_string()))
}
