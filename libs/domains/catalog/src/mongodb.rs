//! MongoDB implementation of EntityStore
//!
//! Collections are read as raw BSON documents and converted through relaxed
//! extended JSON, so loosely typed legacy fields survive decoding. Documents
//! that cannot be decoded at all are logged and skipped.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, Document, doc, oid::ObjectId, to_bson},
    options::{FindOneOptions, FindOptions},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::config::CatalogSettings;
use crate::error::{CatalogError, CatalogResult};
use crate::identifier::{EventKey, RawEventRef};
use crate::models::{DocumentId, Event, Favorite, User};
use crate::repository::EntityStore;
use crate::users::EventReview;

/// MongoDB-backed entity store
#[derive(Clone)]
pub struct MongoEntityStore {
    client: Client,
    events: Collection<Document>,
    users: Collection<Document>,
}

impl MongoEntityStore {
    /// Open the configured collections in `db`
    ///
    /// # Example
    /// ```ignore
    /// let client = database::mongodb::connect_from_config(&config).await?;
    /// let store = MongoEntityStore::new(&client, client.database("catalog"), &settings);
    /// ```
    pub fn new(client: &Client, db: Database, settings: &CatalogSettings) -> Self {
        Self {
            client: client.clone(),
            events: db.collection::<Document>(&settings.events_collection),
            users: db.collection::<Document>(&settings.users_collection),
        }
    }

    /// Filter matching an event under either identifier form
    fn event_ref_clauses(reference: &RawEventRef) -> Vec<Document> {
        match reference {
            RawEventRef::Int(n) => vec![
                doc! { "id": *n },
                doc! { "_id": *n },
                doc! { "_id": n.to_string() },
            ],
            RawEventRef::Text(s) => {
                let mut clauses = vec![doc! { "_id": s.as_str() }];
                if let Ok(oid) = ObjectId::parse_str(s) {
                    clauses.push(doc! { "_id": oid });
                }
                if let Ok(n) = s.parse::<i64>() {
                    clauses.push(doc! { "id": n });
                    clauses.push(doc! { "_id": n });
                }
                clauses
            }
        }
    }

    fn build_events_filter(refs: &[RawEventRef]) -> Document {
        let clauses: Vec<Document> = refs.iter().flat_map(Self::event_ref_clauses).collect();
        doc! { "$or": clauses }
    }

    fn build_user_filter(id: &DocumentId) -> Document {
        let clauses = match id {
            DocumentId::Int(n) => vec![doc! { "_id": *n }, doc! { "_id": n.to_string() }],
            DocumentId::Text(s) => {
                let mut clauses = vec![doc! { "_id": s.as_str() }];
                if let Ok(oid) = ObjectId::parse_str(s) {
                    clauses.push(doc! { "_id": oid });
                }
                clauses
            }
        };
        doc! { "$or": clauses }
    }

    /// Filter matching exactly the event with this canonical key
    fn build_event_key_filter(key: &EventKey) -> Document {
        match key {
            EventKey::Seq(n) => doc! { "id": *n },
            EventKey::Store(DocumentId::Int(n)) => doc! { "_id": *n },
            EventKey::Store(DocumentId::Text(s)) => {
                let mut clauses = vec![doc! { "_id": s.as_str() }];
                if let Ok(oid) = ObjectId::parse_str(s) {
                    clauses.push(doc! { "_id": oid });
                }
                doc! { "$or": clauses }
            }
        }
    }

    async fn find_decoded<T: DeserializeOwned>(
        collection: &Collection<Document>,
        filter: Document,
        options: Option<FindOptions>,
    ) -> CatalogResult<Vec<T>> {
        let cursor = collection.find(filter).with_options(options).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents.into_iter().filter_map(decode_or_skip).collect())
    }
}

/// Convert a raw document through relaxed extended JSON
pub(crate) fn decode<T: DeserializeOwned>(document: Document) -> Result<T, serde_json::Error> {
    serde_json::from_value(Bson::Document(document).into_relaxed_extjson())
}

fn decode_or_skip<T: DeserializeOwned>(document: Document) -> Option<T> {
    let id = document.get("_id").map(ToString::to_string).unwrap_or_default();
    match decode(document) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(document_id = %id, error = %e, "Skipping undecodable document");
            None
        }
    }
}

/// Convert a document model to BSON; extended JSON markers such as `$oid`
/// become BSON types
pub(crate) fn encode<T: Serialize>(value: &T) -> CatalogResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => encode_fields(map),
        other => Err(CatalogError::Internal(format!(
            "document encoded to a non-object value: {}",
            other
        ))),
    }
}

fn encode_fields(fields: Map<String, Value>) -> CatalogResult<Document> {
    Document::try_from(fields).map_err(|e| CatalogError::Decode(e.to_string()))
}

fn id_bson(id: &DocumentId) -> Bson {
    match id {
        DocumentId::Int(n) => Bson::Int64(*n),
        DocumentId::Text(s) => Bson::String(s.clone()),
    }
}

fn inserted_id(id: &Bson) -> Option<DocumentId> {
    match id {
        Bson::ObjectId(oid) => Some(DocumentId::Text(oid.to_hex())),
        Bson::String(s) => Some(DocumentId::Text(s.clone())),
        Bson::Int32(n) => Some(DocumentId::Int(i64::from(*n))),
        Bson::Int64(n) => Some(DocumentId::Int(*n)),
        _ => None,
    }
}

#[async_trait]
impl EntityStore for MongoEntityStore {
    #[instrument(skip(self))]
    async fn list_all_events(&self) -> CatalogResult<Vec<Event>> {
        Self::find_decoded(&self.events, doc! {}, None).await
    }

    #[instrument(skip(self))]
    async fn list_all_users(&self) -> CatalogResult<Vec<User>> {
        Self::find_decoded(&self.users, doc! {}, None).await
    }

    #[instrument(skip(self), fields(refs = refs.len()))]
    async fn find_events_by_keys(&self, refs: &[RawEventRef]) -> CatalogResult<Vec<Event>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        Self::find_decoded(&self.events, Self::build_events_filter(refs), None).await
    }

    #[instrument(skip(self))]
    async fn find_user(&self, id: &DocumentId) -> CatalogResult<Option<User>> {
        let document = self.users.find_one(Self::build_user_filter(id)).await?;
        Ok(document.and_then(decode_or_skip))
    }

    #[instrument(skip(self))]
    async fn list_events_page(&self, skip: u64, limit: u64) -> CatalogResult<Vec<Event>> {
        let options = FindOptions::builder()
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        Self::find_decoded(&self.events, doc! {}, Some(options)).await
    }

    #[instrument(skip(self))]
    async fn count_events(&self) -> CatalogResult<u64> {
        Ok(self.events.count_documents(doc! {}).await?)
    }

    #[instrument(skip(self))]
    async fn list_users_page(&self, skip: u64, limit: u64) -> CatalogResult<Vec<User>> {
        let options = FindOptions::builder()
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .sort(doc! { "_id": -1 })
            .build();
        Self::find_decoded(&self.users, doc! {}, Some(options)).await
    }

    #[instrument(skip(self))]
    async fn count_users(&self) -> CatalogResult<u64> {
        Ok(self.users.count_documents(doc! {}).await?)
    }

    #[instrument(skip(self, events), fields(batch = events.len()))]
    async fn insert_events(&self, events: Vec<Event>) -> CatalogResult<Vec<Event>> {
        if events.is_empty() {
            return Ok(events);
        }
        let documents = events.iter().map(encode).collect::<CatalogResult<Vec<_>>>()?;
        let result = self.events.insert_many(documents).await?;

        let stored = events
            .into_iter()
            .enumerate()
            .map(|(position, mut event)| {
                event.store_id = result.inserted_ids.get(&position).and_then(inserted_id);
                event
            })
            .collect::<Vec<_>>();

        tracing::info!(count = stored.len(), "Events inserted");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn max_event_seq(&self) -> CatalogResult<Option<i64>> {
        let options = FindOneOptions::builder().sort(doc! { "id": -1 }).build();
        let document = self
            .events
            .find_one(doc! { "id": { "$type": "number" } })
            .with_options(options)
            .await?;
        Ok(document
            .and_then(decode_or_skip::<Event>)
            .and_then(|event| event.id))
    }

    #[instrument(skip(self, users), fields(batch = users.len()))]
    async fn insert_users(&self, users: Vec<User>) -> CatalogResult<Vec<User>> {
        if users.is_empty() {
            return Ok(users);
        }
        let documents = users.iter().map(encode).collect::<CatalogResult<Vec<_>>>()?;
        self.users.insert_many(documents).await?;
        tracing::info!(count = users.len(), "Users inserted");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn max_user_id(&self) -> CatalogResult<Option<i64>> {
        let options = FindOneOptions::builder().sort(doc! { "_id": -1 }).build();
        let document = self
            .users
            .find_one(doc! { "_id": { "$type": "number" } })
            .with_options(options)
            .await?;
        Ok(document
            .and_then(decode_or_skip::<User>)
            .and_then(|user| match user.id {
                DocumentId::Int(n) => Some(n),
                DocumentId::Text(_) => None,
            }))
    }

    #[instrument(skip(self, fields))]
    async fn update_user(&self, id: &DocumentId, fields: Map<String, Value>) -> CatalogResult<bool> {
        let fields = encode_fields(fields)?;
        let update = doc! { "$set": fields };
        let result = self.users.update_one(Self::build_user_filter(id), update).await?;
        Ok(result.matched_count > 0)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: &DocumentId) -> CatalogResult<bool> {
        let result = self.users.delete_one(Self::build_user_filter(id)).await?;
        Ok(result.deleted_count > 0)
    }

    #[instrument(skip(self, review))]
    async fn push_event_review(&self, key: &EventKey, review: &EventReview) -> CatalogResult<bool> {
        let review = to_bson(review)?;
        let update = doc! { "$push": { "reviews": review } };
        let result = self
            .events
            .update_one(Self::build_event_key_filter(key), update)
            .await?;
        Ok(result.matched_count > 0)
    }

    #[instrument(skip(self))]
    async fn push_favorite(&self, user_id: &DocumentId, favorite: &Favorite) -> CatalogResult<bool> {
        let update = doc! { "$push": { "favorites": { "movieid": id_bson(&favorite.movieid) } } };
        let result = self
            .users
            .update_one(Self::build_user_filter(user_id), update)
            .await?;
        Ok(result.matched_count > 0)
    }

    #[instrument(skip(self))]
    async fn pull_favorite(&self, user_id: &DocumentId, movieid: &DocumentId) -> CatalogResult<bool> {
        let update = doc! { "$pull": { "favorites": { "movieid": id_bson(movieid) } } };
        let result = self
            .users
            .update_one(Self::build_user_filter(user_id), update)
            .await?;
        Ok(result.modified_count > 0)
    }

    #[instrument(skip(self))]
    async fn ping(&self) -> CatalogResult<()> {
        let status = database::mongodb::check_health_detailed(&self.client).await;
        if status.healthy {
            Ok(())
        } else {
            Err(CatalogError::Internal(
                status.message.unwrap_or_else(|| "MongoDB ping failed".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_events_filter_covers_both_forms() {
        let filter = MongoEntityStore::build_events_filter(&[
            RawEventRef::Int(7),
            RawEventRef::Text("65f0c0ffee0000000000abcd".into()),
        ]);
        let clauses = filter.get_array("$or").unwrap();
        // 3 clauses for the integer, 2 for the ObjectId-shaped text
        assert_eq!(clauses.len(), 5);
        assert!(clauses.contains(&Bson::Document(doc! { "id": 7_i64 })));
        assert!(clauses.contains(&Bson::Document(doc! { "_id": "7" })));
    }

    #[test]
    fn test_build_events_filter_numeric_text() {
        let filter = MongoEntityStore::build_events_filter(&[RawEventRef::Text("12".into())]);
        let clauses = filter.get_array("$or").unwrap();
        assert!(clauses.contains(&Bson::Document(doc! { "id": 12_i64 })));
        assert!(clauses.contains(&Bson::Document(doc! { "_id": "12" })));
    }

    #[test]
    fn test_build_user_filter() {
        let filter = MongoEntityStore::build_user_filter(&DocumentId::Int(3));
        assert_eq!(filter.get_array("$or").unwrap().len(), 2);
    }

    #[test]
    fn test_build_event_key_filter_matches_one_form() {
        assert_eq!(
            MongoEntityStore::build_event_key_filter(&EventKey::Seq(4)),
            doc! { "id": 4_i64 }
        );
        assert_eq!(
            MongoEntityStore::build_event_key_filter(&EventKey::Store(DocumentId::Int(4))),
            doc! { "_id": 4_i64 }
        );
        let filter = MongoEntityStore::build_event_key_filter(&EventKey::Store(DocumentId::Text(
            "65f0c0ffee0000000000abcd".into(),
        )));
        assert_eq!(filter.get_array("$or").unwrap().len(), 2);
    }

    #[test]
    fn test_encode_user_keeps_integer_id() {
        let mut user = User::new(DocumentId::Int(12));
        user.name = Some("Ana".into());
        user.favorites.push(Favorite {
            movieid: DocumentId::Int(3),
        });
        let document = encode(&user).unwrap();
        // integers that fit in 32 bits encode as Int32
        assert_eq!(document.get_i32("_id").unwrap(), 12);
        assert_eq!(document.get_array("favorites").unwrap().len(), 1);
    }

    #[test]
    fn test_review_bson_shape() {
        let review = EventReview {
            user_id: DocumentId::Int(2),
            rating: 5,
            comment: "great".into(),
            date: "05/06/2024".into(),
        };
        let Bson::Document(document) = to_bson(&review).unwrap() else {
            panic!("expected a document");
        };
        assert_eq!(document.get_str("date").unwrap(), "05/06/2024");
        assert!(document.contains_key("user_id"));
    }

    #[test]
    fn test_decode_legacy_event_document() {
        let oid = ObjectId::parse_str("65f0c0ffee0000000000abcd").unwrap();
        let document = doc! {
            "_id": oid,
            "id": 4_i32,
            "title": { "rendered": "Open Air" },
            "venue": { "12": { "name": "Park" } },
        };
        let event: Event = decode(document).unwrap();
        assert_eq!(event.store_id, Some(DocumentId::Text(oid.to_hex())));
        assert_eq!(event.id, Some(4));
        assert_eq!(event.title_text(), Some("Open Air"));
        assert_eq!(event.venue_name(), Some("Park"));
    }

    #[test]
    fn test_decode_user_with_mixed_ratings() {
        let document = doc! {
            "_id": 9_i64,
            "name": "Lia",
            "movies": [
                { "movieid": 1, "rating": 5, "date": "2024-03-01" },
                "garbage",
            ],
        };
        let user: User = decode(document).unwrap();
        assert_eq!(user.id, DocumentId::Int(9));
        assert_eq!(user.movies.len(), 2);
        assert_eq!(user.movies[0].rating, Some(json!(5)));
    }

    #[test]
    fn test_encode_drops_absent_store_id() {
        let event = Event {
            id: Some(1),
            title: Some(json!("Gala")),
            ..Default::default()
        };
        let document = encode(&event).unwrap();
        assert!(!document.contains_key("_id"));
        assert_eq!(document.get_str("title").unwrap(), "Gala");
    }

    #[test]
    fn test_inserted_id_forms() {
        let oid = ObjectId::new();
        assert_eq!(inserted_id(&Bson::ObjectId(oid)), Some(DocumentId::Text(oid.to_hex())));
        assert_eq!(inserted_id(&Bson::Int32(5)), Some(DocumentId::Int(5)));
        assert_eq!(inserted_id(&Bson::Null), None);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_round_trip_against_container() {
        let mongo = test_utils::TestMongo::new().await;
        let db = mongo.database("catalog_it");
        let builder = test_utils::TestDataBuilder::from_test_name("mongo_round_trip");

        db.collection::<Document>("events")
            .insert_many(vec![builder.event(1, "First"), builder.legacy_event(2, "Second")])
            .await
            .unwrap();
        db.collection::<Document>("users")
            .insert_one(builder.user(1, "Ana", vec![builder.rating(1, 5, "2024-01-01")]))
            .await
            .unwrap();

        let store = MongoEntityStore::new(&mongo.client(), db, &CatalogSettings::default());
        store.ping().await.unwrap();

        assert_eq!(store.list_all_events().await.unwrap().len(), 2);
        assert_eq!(store.max_event_seq().await.unwrap(), Some(1));
        let found = store.find_events_by_keys(&[RawEventRef::Int(1)]).await.unwrap();
        assert_eq!(found.len(), 1);
        let user = store.find_user(&DocumentId::Int(1)).await.unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Ana"));
    }
}
