//! Canonical event keys and the dual-scheme event index.
//!
//! Events carry a sequential numeric `id` and a store `_id`; ratings may refer
//! to either. Every join goes through [`EventIndex`], which maps both forms
//! onto one [`EventKey`].

use crate::models::{DocumentId, Event, integral};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use utoipa::ToSchema;

/// Canonical event key: the sequential `id` when present, otherwise `_id`
///
/// Ordering puts sequential keys (numerically) before store keys.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(untagged)]
pub enum EventKey {
    Seq(i64),
    Store(DocumentId),
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{}", n),
            Self::Store(id) => write!(f, "{}", id),
        }
    }
}

/// A reference to an event as written by a caller or a rating record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawEventRef {
    Int(i64),
    Text(String),
}

impl RawEventRef {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => integral(n).map(Self::Int),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.trim().to_string())),
            Value::Object(_) => DocumentId::from_value(value).map(Self::from),
            _ => None,
        }
    }

    /// Parse a path segment such as `42` or `65f0c0ffee0000000000abcd`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Text(raw.to_string()),
        })
    }
}

impl From<DocumentId> for RawEventRef {
    fn from(id: DocumentId) -> Self {
        match id {
            DocumentId::Int(n) => Self::Int(n),
            DocumentId::Text(s) => Self::Text(s),
        }
    }
}

impl From<&EventKey> for RawEventRef {
    fn from(key: &EventKey) -> Self {
        match key {
            EventKey::Seq(n) => Self::Int(*n),
            EventKey::Store(id) => id.clone().into(),
        }
    }
}

impl fmt::Display for RawEventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Canonical key of an event, or None when it has neither identifier
pub fn canonical_id(event: &Event) -> Option<EventKey> {
    match (event.id, &event.store_id) {
        (Some(seq), _) => Some(EventKey::Seq(seq)),
        (None, Some(store)) => Some(EventKey::Store(store.clone())),
        (None, None) => None,
    }
}

/// Bidirectional index over one snapshot of events
///
/// When one reference matches the sequential id of one event and the store id
/// of another, the sequential match wins. Events without any identifier are
/// not indexed.
pub struct EventIndex<'a> {
    events: Vec<(EventKey, &'a Event)>,
    by_key: HashMap<EventKey, usize>,
    by_seq: HashMap<i64, usize>,
    by_store: HashMap<DocumentId, usize>,
}

impl<'a> EventIndex<'a> {
    pub fn build(events: &'a [Event]) -> Self {
        let mut index = Self {
            events: Vec::with_capacity(events.len()),
            by_key: HashMap::with_capacity(events.len()),
            by_seq: HashMap::with_capacity(events.len()),
            by_store: HashMap::with_capacity(events.len()),
        };

        for event in events {
            let Some(key) = canonical_id(event) else {
                continue;
            };
            // First occurrence of a duplicated key wins
            if index.by_key.contains_key(&key) {
                continue;
            }
            let position = index.events.len();
            index.by_key.insert(key.clone(), position);
            if let Some(seq) = event.id {
                index.by_seq.entry(seq).or_insert(position);
            }
            if let Some(store) = &event.store_id {
                index.by_store.entry(store.clone()).or_insert(position);
            }
            index.events.push((key, event));
        }

        index
    }

    /// Resolve a raw reference against both identifier forms
    pub fn resolve(&self, reference: &RawEventRef) -> Option<&EventKey> {
        let position = match reference {
            RawEventRef::Int(n) => self
                .by_seq
                .get(n)
                .or_else(|| self.by_store.get(&DocumentId::Int(*n)))
                .or_else(|| self.by_store.get(&DocumentId::Text(n.to_string()))),
            RawEventRef::Text(s) => self
                .by_store
                .get(&DocumentId::Text(s.clone()))
                .or_else(|| {
                    let n = s.parse::<i64>().ok()?;
                    self.by_seq
                        .get(&n)
                        .or_else(|| self.by_store.get(&DocumentId::Int(n)))
                }),
        }?;
        Some(&self.events[*position].0)
    }

    pub fn get(&self, key: &EventKey) -> Option<&'a Event> {
        self.by_key.get(key).map(|&position| self.events[position].1)
    }

    /// Indexed events in snapshot order
    pub fn iter(&self) -> impl Iterator<Item = (&EventKey, &'a Event)> + '_ {
        self.events.iter().map(|(key, event)| (key, *event))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
