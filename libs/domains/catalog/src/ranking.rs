//! Deterministic rankings of events and users.

use crate::aggregation::{Aggregation, EventStats};
use crate::extractor::RatingExtractor;
use crate::identifier::{EventIndex, EventKey};
use crate::models::{DocumentId, User};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::num::NonZeroUsize;
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Sort direction; parses only `asc` and `desc`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Statistic an event ranking is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RankingKey {
    MeanRating,
    ReviewCount,
    FiveStarCount,
}

/// Order items by a statistic, ties broken by id ascending in both directions
///
/// Items whose statistic is None are left out. The sort is stable and the
/// result holds at most `limit` entries.
pub fn rank_by<T, I, S>(
    items: impl IntoIterator<Item = T>,
    id_of: impl Fn(&T) -> I,
    stat_of: impl Fn(&T) -> Option<S>,
    order: SortOrder,
    limit: NonZeroUsize,
) -> Vec<(T, S)>
where
    I: Ord,
    S: Ord,
{
    let mut ranked: Vec<(T, S)> = items
        .into_iter()
        .filter_map(|item| {
            let stat = stat_of(&item)?;
            Some((item, stat))
        })
        .collect();

    ranked.sort_by(|(a, stat_a), (b, stat_b)| {
        by_stat_then_id(order, (stat_a, &id_of(a)), (stat_b, &id_of(b)))
    });
    ranked.truncate(limit.get());
    ranked
}

/// One row of an event ranking
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RankedEvent {
    pub rank: usize,
    pub event_id: EventKey,
    pub title: Option<String>,
    pub ranked_by: RankingKey,
    pub stats: EventStats,
}

/// Rank indexed events by one of their statistics
///
/// Mean rankings leave out events without ratings; count rankings include
/// them with a count of zero.
pub fn rank_events(
    index: &EventIndex<'_>,
    aggregation: &Aggregation,
    ranked_by: RankingKey,
    order: SortOrder,
    limit: NonZeroUsize,
) -> Vec<RankedEvent> {
    let rows = index
        .iter()
        .map(|(key, event)| (key, event, aggregation.event_stats(key)));

    let ranked = match ranked_by {
        RankingKey::MeanRating => rank_by(
            rows,
            |(key, _, _)| (*key).clone(),
            |(_, _, stats)| stats.mean().map(|m| m.hundredths()),
            order,
            limit,
        ),
        RankingKey::ReviewCount => rank_by(
            rows,
            |(key, _, _)| (*key).clone(),
            |(_, _, stats)| Some(stats.count()),
            order,
            limit,
        ),
        RankingKey::FiveStarCount => rank_by(
            rows,
            |(key, _, _)| (*key).clone(),
            |(_, _, stats)| Some(stats.five_star_count()),
            order,
            limit,
        ),
    };

    ranked
        .into_iter()
        .enumerate()
        .map(|(position, ((key, event, stats), _))| RankedEvent {
            rank: position + 1,
            event_id: key.clone(),
            title: event.title_text().map(str::to_string),
            ranked_by,
            stats,
        })
        .collect()
}

/// One row of the top-reviewers ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopReviewer {
    pub rank: usize,
    pub user_id: DocumentId,
    pub name: Option<String>,
    pub review_count: u64,
}

/// Users ordered by their number of qualifying ratings, most first
///
/// Every user has a count; users without qualifying ratings rank last with 0.
pub fn rank_reviewers(
    users: &[User],
    extractor: &RatingExtractor,
    limit: NonZeroUsize,
) -> Vec<TopReviewer> {
    let counted = users
        .iter()
        .map(|user| (user, extractor.extract_user(user).count() as u64));

    rank_by(
        counted,
        |(user, _)| user.id.clone(),
        |(_, count)| Some(*count),
        SortOrder::Desc,
        limit,
    )
    .into_iter()
    .enumerate()
    .map(|(position, ((user, _), review_count))| TopReviewer {
        rank: position + 1,
        user_id: user.id.clone(),
        name: user.name.clone(),
        review_count,
    })
    .collect()
}

/// Statistic in the requested direction, then id ascending
pub fn by_stat_then_id<S: Ord, I: Ord>(order: SortOrder, a: (&S, &I), b: (&S, &I)) -> Ordering {
    let by_stat = match order {
        SortOrder::Asc => a.0.cmp(b.0),
        SortOrder::Desc => b.0.cmp(a.0),
    };
    by_stat.then_with(|| a.1.cmp(b.1))
}
