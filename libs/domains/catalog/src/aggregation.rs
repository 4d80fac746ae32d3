//! Per-event rating statistics.

use crate::extractor::{MAX_RATING, NormalizedRating};
use crate::identifier::{EventIndex, EventKey};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

/// Mean rating held as exact hundredths, rounded half away from zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema)]
#[schema(value_type = f64, example = 4.33)]
pub struct Mean(u64);

impl Mean {
    /// `sum / count` to two decimals; None when `count` is zero
    pub fn from_ratio(sum: u64, count: u64) -> Option<Self> {
        if count == 0 {
            return None;
        }
        // round(sum * 100 / count) with halves rounded up; all terms are non-negative
        Some(Self((sum * 200 + count) / (2 * count)))
    }

    pub fn hundredths(&self) -> u64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Mean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Mean {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Mean {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !(0.0..=f64::from(MAX_RATING)).contains(&value) {
            return Err(serde::de::Error::custom("mean out of range"));
        }
        Ok(Self((value * 100.0).round() as u64))
    }
}

/// Running totals for one event
///
/// Serialized with the derived `mean`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
pub struct Stats {
    pub count: u64,
    pub sum: u64,
    pub five_star_count: u64,
}

impl Stats {
    pub fn record(&mut self, value: u8) {
        self.count += 1;
        self.sum += u64::from(value);
        if value == MAX_RATING {
            self.five_star_count += 1;
        }
    }

    /// Computed on read; None for zero ratings
    pub fn mean(&self) -> Option<Mean> {
        Mean::from_ratio(self.sum, self.count)
    }
}

impl Serialize for Stats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Stats", 4)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("sum", &self.sum)?;
        state.serialize_field("mean", &self.mean())?;
        state.serialize_field("five_star_count", &self.five_star_count)?;
        state.end()
    }
}

/// Statistics of one event; events without qualifying ratings are `NoRatings`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventStats {
    Rated(Stats),
    NoRatings,
}

impl EventStats {
    pub fn mean(&self) -> Option<Mean> {
        match self {
            Self::Rated(stats) => stats.mean(),
            Self::NoRatings => None,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Self::Rated(stats) => stats.count,
            Self::NoRatings => 0,
        }
    }

    pub fn five_star_count(&self) -> u64 {
        match self {
            Self::Rated(stats) => stats.five_star_count,
            Self::NoRatings => 0,
        }
    }
}

impl From<Option<&Stats>> for EventStats {
    fn from(stats: Option<&Stats>) -> Self {
        match stats {
            Some(stats) if stats.count > 0 => Self::Rated(*stats),
            _ => Self::NoRatings,
        }
    }
}

/// Result of one aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub stats: BTreeMap<EventKey, Stats>,
    /// Ratings whose subject matched no event
    pub dangling: u64,
}

impl Aggregation {
    pub fn event_stats(&self, key: &EventKey) -> EventStats {
        self.stats.get(key).into()
    }
}

/// Group ratings by canonical event key in a single pass
pub fn aggregate<I>(ratings: I, index: &EventIndex<'_>) -> Aggregation
where
    I: IntoIterator<Item = NormalizedRating>,
{
    let mut aggregation = Aggregation::default();

    for rating in ratings {
        match index.resolve(&rating.event_ref) {
            Some(key) => aggregation
                .stats
                .entry(key.clone())
                .or_default()
                .record(rating.value),
            None => aggregation.dangling += 1,
        }
    }

    aggregation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::RawEventRef;
    use crate::models::Event;
    use proptest::prelude::*;
    use serde_json::json;

    fn rating(event: i64, value: u8) -> NormalizedRating {
        NormalizedRating {
            event_ref: RawEventRef::Int(event),
            value,
            date: None,
            user_id: None,
        }
    }

    fn events(ids: &[i64]) -> Vec<Event> {
        ids.iter()
            .map(|&id| Event {
                id: Some(id),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_two_five_star_ratings() {
        let events = events(&[1]);
        let index = EventIndex::build(&events);
        let aggregation = aggregate(vec![rating(1, 5), rating(1, 5)], &index);

        let stats = aggregation.stats[&EventKey::Seq(1)];
        assert_eq!(
            stats,
            Stats {
                count: 2,
                sum: 10,
                five_star_count: 2
            }
        );
        assert_eq!(stats.mean().unwrap().to_string(), "5.00");
    }

    #[test]
    fn test_zero_ratings_is_no_ratings() {
        let events = events(&[1, 2]);
        let index = EventIndex::build(&events);
        let aggregation = aggregate(vec![rating(1, 3)], &index);

        assert_eq!(aggregation.event_stats(&EventKey::Seq(2)), EventStats::NoRatings);
        assert_eq!(aggregation.event_stats(&EventKey::Seq(2)).mean(), None);
        assert_eq!(EventStats::from(Some(&Stats::default())), EventStats::NoRatings);
    }

    #[test]
    fn test_dangling_rating_contributes_nothing() {
        let events = events(&[1]);
        let index = EventIndex::build(&events);
        let aggregation = aggregate(vec![rating(999, 4), rating(1, 2)], &index);

        assert_eq!(aggregation.dangling, 1);
        assert_eq!(aggregation.stats.len(), 1);
        assert_eq!(aggregation.stats[&EventKey::Seq(1)].sum, 2);
    }

    #[test]
    fn test_mean_rounds_half_away_from_zero() {
        // 4.335 -> 4.34, 2/3 -> 0.67, 4/3 -> 1.33
        assert_eq!(Mean::from_ratio(867, 200).unwrap().to_string(), "4.34");
        assert_eq!(Mean::from_ratio(2, 3).unwrap().to_string(), "0.67");
        assert_eq!(Mean::from_ratio(4, 3).unwrap().to_string(), "1.33");
        assert_eq!(Mean::from_ratio(1, 8).unwrap().to_string(), "0.13");
        assert_eq!(Mean::from_ratio(0, 0), None);
    }

    #[test]
    fn test_stats_serialize_with_mean() {
        let mut stats = Stats::default();
        stats.record(4);
        stats.record(5);
        stats.record(4);

        let json = serde_json::to_value(EventStats::Rated(stats)).unwrap();
        assert_eq!(
            json,
            json!({ "status": "rated", "count": 3, "sum": 13, "mean": 4.33, "five_star_count": 1 })
        );
        assert_eq!(
            serde_json::to_value(EventStats::NoRatings).unwrap(),
            json!({ "status": "no_ratings" })
        );
    }

    proptest! {
        #[test]
        fn prop_five_star_never_exceeds_count(values in proptest::collection::vec(1u8..=5, 0..64)) {
            let events = events(&[1]);
            let index = EventIndex::build(&events);
            let aggregation = aggregate(values.iter().map(|&v| rating(1, v)), &index);

            let stats = aggregation.event_stats(&EventKey::Seq(1));
            prop_assert!(stats.five_star_count() <= stats.count());
            prop_assert_eq!(stats.count(), values.len() as u64);
            if let Some(mean) = stats.mean() {
                prop_assert!((100..=500).contains(&mean.hundredths()));
            }
        }
    }
}
