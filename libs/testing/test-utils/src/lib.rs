//! Shared test utilities for the catalog crates
//!
//! - `TestMongo`: MongoDB container with automatic cleanup (feature: "mongo")
//! - `TestDataBuilder`: deterministic event and user documents (always available)
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestMongo};
//!
//! #[tokio::test]
//! #[ignore]
//! async fn my_mongo_test() {
//!     let mongo = TestMongo::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_mongo_test");
//!
//!     let db = mongo.database(&builder.name("db", "main"));
//!     db.collection("events").insert_one(builder.event(1, "Fado Night")).await.unwrap();
//! }
//! ```

use mongodb::bson::{Bson, Document, doc, oid::ObjectId};

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "mongo")]
pub use mongo::TestMongo;

/// Builder for test documents with deterministic identifiers
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (seed is the hash of the name)
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_top_rated");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Deterministic ObjectId; `n` distinguishes ids within one test
    pub fn object_id(&self, n: u32) -> ObjectId {
        let mut bytes = [0u8; 12];
        bytes[..8].copy_from_slice(&self.seed.to_be_bytes());
        bytes[8..].copy_from_slice(&n.to_be_bytes());
        ObjectId::from_bytes(bytes)
    }

    /// Unique name, e.g. for a per-test database
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.name("db", "main"), "test-db-7-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Event with a sequential `id`, a store `_id` and a WordPress-style title
    pub fn event(&self, seq: i64, title: &str) -> Document {
        doc! {
            "_id": self.object_id(seq as u32),
            "id": seq,
            "title": { "rendered": title },
            "venue": { "1": { "name": format!("Venue {}", seq) } },
            "occurrences": ["2024-05-01"],
        }
    }

    /// Event that only carries a store `_id`
    pub fn legacy_event(&self, n: u32, title: &str) -> Document {
        doc! {
            "_id": self.object_id(n),
            "title": title,
        }
    }

    /// Rating record as embedded in a user's `movies` array
    pub fn rating(&self, movieid: impl Into<Bson>, rating: impl Into<Bson>, date: &str) -> Document {
        doc! {
            "movieid": movieid.into(),
            "rating": rating.into(),
            "date": date,
        }
    }

    /// User with a numeric `_id` and the given embedded ratings
    pub fn user(&self, id: i64, name: &str, ratings: Vec<Document>) -> Document {
        doc! {
            "_id": id,
            "name": name,
            "gender": "F",
            "age": 30,
            "occupation": "engineer",
            "movies": ratings,
        }
    }
}
