//! Events reviewed in a given calendar year.

use crate::error::{CatalogError, CatalogResult};
use crate::extractor::NormalizedRating;
use crate::identifier::{EventIndex, EventKey};
use chrono::Datelike;
use std::collections::BTreeSet;

/// Outcome of a year filter pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearMatches {
    pub keys: BTreeSet<EventKey>,
    /// Qualifying ratings skipped for lacking a parseable date
    pub undated: u64,
    /// Ratings in the year whose subject matched no event
    pub dangling: u64,
}

/// Parse a year path segment
pub fn parse_year(raw: &str) -> CatalogResult<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| CatalogError::validation(format!("year must be an integer, got '{}'", raw)))
}

/// Distinct events having at least one rating dated in `year`
pub fn events_in_year<I>(ratings: I, index: &EventIndex<'_>, year: i32) -> YearMatches
where
    I: IntoIterator<Item = NormalizedRating>,
{
    let mut matches = YearMatches::default();

    for rating in ratings {
        let Some(date) = rating.date else {
            matches.undated += 1;
            continue;
        };
        if date.year() != year {
            continue;
        }
        match index.resolve(&rating.event_ref) {
            Some(key) => {
                matches.keys.insert(key.clone());
            }
            None => matches.dangling += 1,
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::RawEventRef;
    use crate::models::{DocumentId, Event};
    use chrono::NaiveDate;

    fn dated(event: RawEventRef, date: Option<(i32, u32, u32)>) -> NormalizedRating {
        NormalizedRating {
            event_ref: event,
            value: 4,
            date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            user_id: None,
        }
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2024").unwrap(), 2024);
        assert_eq!(parse_year(" 1999 ").unwrap(), 1999);
        assert!(matches!(parse_year("twenty"), Err(CatalogError::Validation(_))));
        assert!(parse_year("2024.5").is_err());
    }

    #[test]
    fn test_events_in_year_dedupes_and_skips_undated() {
        let events = vec![
            Event { id: Some(1), ..Default::default() },
            Event {
                store_id: Some(DocumentId::Text("abc".into())),
                ..Default::default()
            },
            Event { id: Some(3), ..Default::default() },
        ];
        let index = EventIndex::build(&events);

        let ratings = vec![
            dated(RawEventRef::Int(1), Some((2024, 1, 5))),
            dated(RawEventRef::Int(1), Some((2024, 12, 31))),
            dated(RawEventRef::Text("abc".into()), Some((2024, 6, 1))),
            dated(RawEventRef::Int(3), Some((2023, 12, 31))),
            dated(RawEventRef::Int(3), None),
            dated(RawEventRef::Int(99), Some((2024, 2, 2))),
        ];

        let matches = events_in_year(ratings, &index, 2024);
        assert_eq!(matches.keys.len(), 2);
        assert!(matches.keys.contains(&EventKey::Seq(1)));
        assert!(matches.keys.contains(&EventKey::Store(DocumentId::Text("abc".into()))));
        assert_eq!(matches.undated, 1);
        assert_eq!(matches.dangling, 1);
    }

    #[test]
    fn test_year_with_no_ratings_is_empty() {
        let events = vec![Event { id: Some(1), ..Default::default() }];
        let index = EventIndex::build(&events);
        let matches = events_in_year(vec![dated(RawEventRef::Int(1), Some((2020, 1, 1)))], &index, 1990);
        assert!(matches.keys.is_empty());
    }
}
