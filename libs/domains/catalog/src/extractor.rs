//! Rating extraction: turns embedded rating records into validated tuples.
//!
//! This is the only place raw `movies` and `reviews` elements are read. A
//! record qualifies when it names a subject event and carries an integer value
//! in 1..=5; everything else is skipped and only counted.

use crate::identifier::{RawEventRef, canonical_id};
use crate::models::{DocumentId, Event, RawRating, User, integral};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A qualifying rating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRating {
    pub event_ref: RawEventRef,
    pub value: u8,
    /// None when the record has no date or it could not be parsed
    pub date: Option<NaiveDate>,
    pub user_id: Option<DocumentId>,
}

/// Why a record was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingSubject,
    InvalidValue,
}

/// Counts gathered over one extraction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub qualifying: u64,
    pub malformed: u64,
    /// Qualifying ratings without a usable date
    pub undated: u64,
}

/// Rating value when it is an integer in 1..=5
///
/// Floats with a zero fraction count; numeric strings do not.
pub fn rating_value(value: &Value) -> Option<u8> {
    let n = integral(value.as_number()?)?;
    (i64::from(MIN_RATING)..=i64::from(MAX_RATING))
        .contains(&n)
        .then_some(n as u8)
}

/// Parse a rating date
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`,
/// `DD/MM/YYYY` and extended JSON `{"$date": ...}`.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Object(map) => match map.get("$date")? {
            Value::String(s) => parse_date_str(s.trim()),
            Value::Object(inner) => {
                let millis: i64 = inner.get("$numberLong")?.as_str()?.parse().ok()?;
                DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
            }
            Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?).map(|dt| dt.date_naive()),
            _ => None,
        },
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

/// Validate one embedded record
pub fn classify(
    raw: &RawRating,
    user_id: Option<&DocumentId>,
) -> Result<NormalizedRating, Rejection> {
    let event_ref = raw
        .movieid
        .as_ref()
        .and_then(RawEventRef::from_value)
        .ok_or(Rejection::MissingSubject)?;
    let value = raw
        .rating
        .as_ref()
        .and_then(rating_value)
        .ok_or(Rejection::InvalidValue)?;

    Ok(NormalizedRating {
        event_ref,
        value,
        date: raw.date.as_ref().and_then(parse_date),
        user_id: user_id.cloned(),
    })
}

/// Validate a review embedded in an event; its subject is that event
fn classify_event_review(event_ref: &RawEventRef, review: &Value) -> Result<NormalizedRating, Rejection> {
    let value = review
        .get("rating")
        .and_then(rating_value)
        .ok_or(Rejection::InvalidValue)?;

    Ok(NormalizedRating {
        event_ref: event_ref.clone(),
        value,
        date: review.get("date").and_then(parse_date),
        user_id: review.get("user_id").and_then(DocumentId::from_value),
    })
}

/// Flattens embedded ratings from users (and optionally events)
#[derive(Debug, Clone, Copy, Default)]
pub struct RatingExtractor {
    include_event_reviews: bool,
}

impl RatingExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also read reviews embedded in event documents
    pub fn with_event_reviews(mut self, include: bool) -> Self {
        self.include_event_reviews = include;
        self
    }

    /// Lazy sequence of qualifying ratings: users in collection order, each
    /// user's records in insertion order, then event reviews when enabled.
    ///
    /// The iterator is `Clone` and holds no shared state; each clone replays
    /// the sequence from its own position.
    pub fn extract<'a>(
        &self,
        users: &'a [User],
        events: &'a [Event],
    ) -> impl Iterator<Item = NormalizedRating> + Clone + 'a {
        let from_users = users.iter().flat_map(|user| {
            user.movies
                .iter()
                .filter_map(move |raw| classify(raw, Some(&user.id)).ok())
        });

        let include = self.include_event_reviews;
        let from_events = events
            .iter()
            .filter(move |_| include)
            .flat_map(|event| event_reviews(event))
            .filter_map(|(event_ref, review)| classify_event_review(&event_ref, review).ok());

        from_users.chain(from_events)
    }

    /// Qualifying ratings of a single user, in insertion order
    pub fn extract_user<'a>(&self, user: &'a User) -> impl Iterator<Item = NormalizedRating> + Clone + 'a {
        user.movies
            .iter()
            .filter_map(move |raw| classify(raw, Some(&user.id)).ok())
    }

    /// Count qualifying, malformed and undated records over the same input
    pub fn report(&self, users: &[User], events: &[Event]) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        let mut tally = |outcome: Result<NormalizedRating, Rejection>| match outcome {
            Ok(rating) => {
                report.qualifying += 1;
                if rating.date.is_none() {
                    report.undated += 1;
                }
            }
            Err(_) => report.malformed += 1,
        };

        for user in users {
            for raw in &user.movies {
                tally(classify(raw, Some(&user.id)));
            }
        }
        if self.include_event_reviews {
            for (event_ref, review) in events.iter().flat_map(|event| event_reviews(event)) {
                tally(classify_event_review(&event_ref, review));
            }
        }

        report
    }
}

/// Embedded reviews of an event paired with the event's own reference
fn event_reviews(event: &Event) -> impl Iterator<Item = (RawEventRef, &Value)> + Clone + '_ {
    let event_ref = canonical_id(event).map(|key| RawEventRef::from(&key));
    let reviews: &[Value] = match (&event_ref, event.reviews.as_ref()) {
        (Some(_), Some(Value::Array(items))) => items.as_slice(),
        _ => &[],
    };
    reviews
        .iter()
        .filter_map(move |review| Some((event_ref.clone()?, review)))
}
