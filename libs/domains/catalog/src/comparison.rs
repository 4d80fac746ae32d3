//! Side-by-side comparison of two events.

use crate::aggregation::{EventStats, Mean};
use crate::identifier::EventKey;
use crate::models::Event;
use serde::Serialize;
use utoipa::ToSchema;

/// Summary of one side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ComparisonRow {
    pub event_id: EventKey,
    pub label: String,
    /// Absent when the event has no qualifying ratings
    pub mean_rating: Option<Mean>,
    pub total_reviews: u64,
    /// Share of five-star ratings with one decimal, e.g. `66.7%`
    pub five_star_percent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Comparison {
    pub a: ComparisonRow,
    pub b: ComparisonRow,
}

impl ComparisonRow {
    pub fn new(key: &EventKey, event: &Event, stats: EventStats) -> Self {
        Self {
            event_id: key.clone(),
            label: event
                .title_text()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Event {}", key)),
            mean_rating: stats.mean(),
            total_reviews: stats.count(),
            five_star_percent: five_star_percent(stats.five_star_count(), stats.count()),
        }
    }
}

/// Percentage rounded half away from zero to one decimal; `0%` for no reviews
pub fn five_star_percent(five_star: u64, total: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let tenths = (u128::from(five_star) * 2000 + u128::from(total)) / (2 * u128::from(total));
    format!("{}.{}%", tenths / 10, tenths % 10)
}

/// Compare two resolved events
///
/// Each side is computed from its own stats only, so swapping the inputs
/// swaps the rows.
pub fn compare(a: (&EventKey, &Event, EventStats), b: (&EventKey, &Event, EventStats)) -> Comparison {
    Comparison {
        a: ComparisonRow::new(a.0, a.1, a.2),
        b: ComparisonRow::new(b.0, b.1, b.2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Stats;
    use proptest::prelude::*;
    use serde_json::json;

    fn stats(values: &[u8]) -> EventStats {
        let mut stats = Stats::default();
        for &v in values {
            stats.record(v);
        }
        EventStats::from(Some(&stats))
    }

    #[test]
    fn test_five_star_percent_formatting() {
        assert_eq!(five_star_percent(2, 3), "66.7%");
        assert_eq!(five_star_percent(1, 3), "33.3%");
        assert_eq!(five_star_percent(0, 4), "0.0%");
        assert_eq!(five_star_percent(4, 4), "100.0%");
        assert_eq!(five_star_percent(1, 8), "12.5%");
        // 1/16 = 6.25 rounds away from zero
        assert_eq!(five_star_percent(1, 16), "6.3%");
        assert_eq!(five_star_percent(0, 0), "0%");
    }

    #[test]
    fn test_compare_rows() {
        let titled = Event {
            id: Some(1),
            title: Some(json!("Jazz Night")),
            ..Default::default()
        };
        let untitled = Event {
            id: Some(2),
            ..Default::default()
        };

        let result = compare(
            (&EventKey::Seq(1), &titled, stats(&[5, 5, 2])),
            (&EventKey::Seq(2), &untitled, EventStats::NoRatings),
        );

        assert_eq!(result.a.label, "Jazz Night");
        assert_eq!(result.a.total_reviews, 3);
        assert_eq!(result.a.five_star_percent, "66.7%");
        assert_eq!(result.a.mean_rating.map(|m| m.to_string()), Some("4.00".to_string()));

        assert_eq!(result.b.label, "Event 2");
        assert_eq!(result.b.mean_rating, None);
        assert_eq!(result.b.total_reviews, 0);
        assert_eq!(result.b.five_star_percent, "0%");
    }

    proptest! {
        #[test]
        fn prop_compare_is_symmetric(
            left in proptest::collection::vec(1u8..=5, 0..20),
            right in proptest::collection::vec(1u8..=5, 0..20),
        ) {
            let event_a = Event { id: Some(1), ..Default::default() };
            let event_b = Event { id: Some(2), ..Default::default() };
            let (key_a, key_b) = (EventKey::Seq(1), EventKey::Seq(2));

            let forward = compare((&key_a, &event_a, stats(&left)), (&key_b, &event_b, stats(&right)));
            let backward = compare((&key_b, &event_b, stats(&right)), (&key_a, &event_a, stats(&left)));

            prop_assert_eq!(forward.a, backward.b);
            prop_assert_eq!(forward.b, backward.a);
        }

        #[test]
        fn prop_percent_in_range(total in 1u64..10_000, five in 0u64..10_000) {
            let five = five % (total + 1);
            let text = five_star_percent(five, total);
            let number: f64 = text.trim_end_matches('%').parse().unwrap();
            prop_assert!((0.0..=100.0).contains(&number));
        }
    }
}
