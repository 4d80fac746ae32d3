//! Catalog domain models
//!
//! Documents are decoded leniently: loosely typed fields stay as JSON values
//! and are interpreted by the accessors below or by the rating extractor.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use utoipa::ToSchema;

/// Store identifier as found in `_id` (or a raw reference to one)
///
/// ObjectIds are carried as their hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    Text(String),
}

impl DocumentId {
    /// Interpret a JSON value (including extended JSON `$oid`/`$numberLong`)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => integral(n).map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Object(map) => match (map.get("$oid"), map.get("$numberLong")) {
                (Some(Value::String(oid)), _) => Some(Self::Text(oid.clone())),
                (_, Some(Value::String(n))) => n.parse().ok().map(Self::Int),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parse a path segment; all-digit input becomes `Int`
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Text(raw.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| de::Error::custom(format!("unsupported identifier: {}", value)))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Integer value of a JSON number; floats count only when they have no fraction
pub(crate) fn integral(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => integral(&n),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_ratings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RawRating>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.iter().map(RawRating::from_value).collect(),
        _ => Vec::new(),
    })
}

fn lenient_favorites<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Favorite>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("movieid").and_then(DocumentId::from_value))
            .map(|movieid| Favorite { movieid })
            .collect(),
        _ => Vec::new(),
    })
}

/// Catalog event
///
/// `id` is the sequential identifier; `_id` is assigned by the store. Fields not
/// modelled here are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<DocumentId>,

    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,

    /// Plain string or `{ "rendered": "..." }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub title: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub venue: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub start_date: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub end_date: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<String>>)]
    pub occurrences: Option<Value>,

    /// Reviews embedded directly in the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub reviews: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub link: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub subject: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub featured_media_large: Option<Value>,

    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Title text, from either a plain string or a `rendered` wrapper
    pub fn title_text(&self) -> Option<&str> {
        let text = match self.title.as_ref()? {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map.get("rendered")?.as_str()?,
            _ => return None,
        };
        (!text.trim().is_empty()).then_some(text)
    }

    /// A title is present but has no text
    pub fn has_blank_title(&self) -> bool {
        self.title.as_ref().is_some_and(|t| !t.is_null()) && self.title_text().is_none()
    }

    /// Venue name: `venue.name`, or the name of the first nested venue entry
    pub fn venue_name(&self) -> Option<&str> {
        let venue = self.venue.as_ref()?.as_object()?;
        if let Some(name) = venue.get("name").and_then(Value::as_str) {
            return Some(name);
        }
        venue.values().next()?.get("name")?.as_str()
    }

    pub fn link_text(&self) -> Option<&str> {
        self.link.as_ref()?.as_str()
    }

    pub fn subject_text(&self) -> Option<&str> {
        self.subject.as_ref()?.as_str()
    }
}

/// One element of a user's embedded `movies` array, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RawRating {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub movieid: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i64>)]
    pub rating: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub date: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub comment: Option<Value>,
}

impl RawRating {
    /// Non-object elements become an empty record, which the extractor rejects
    fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        let field = |key: &str| map.get(key).filter(|v| !v.is_null()).cloned();
        Self {
            movieid: field("movieid"),
            rating: field("rating"),
            date: field("date"),
            comment: field("comment"),
        }
    }
}

/// An event a user marked as favorite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Favorite {
    pub movieid: DocumentId,
}

/// Catalog user with embedded ratings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: DocumentId,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub gender: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<i64>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub occupation: Option<String>,

    /// Ratings, under their historical attribute name
    #[serde(default, deserialize_with = "lenient_ratings")]
    pub movies: Vec<RawRating>,

    #[serde(
        default,
        deserialize_with = "lenient_favorites",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub favorites: Vec<Favorite>,

    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: DocumentId) -> Self {
        Self {
            id,
            name: None,
            gender: None,
            age: None,
            occupation: None,
            movies: Vec::new(),
            favorites: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// One fixed-size page of a listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(page: u64, limit: u64, total: u64, data: Vec<T>) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit.max(1)),
            data,
        }
    }
}

/// Request body for event creation: a single event or an array of them
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum NewEvents {
    Many(Vec<Event>),
    One(Event),
}

impl NewEvents {
    pub fn into_vec(self) -> Vec<Event> {
        match self {
            Self::Many(events) => events,
            Self::One(event) => vec![event],
        }
    }
}
