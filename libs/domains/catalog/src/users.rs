//! User writes: creation payloads, partial updates, favorites and the
//! reviews users leave on events.
//!
//! Payloads are checked here before anything reaches the store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::error::{CatalogError, CatalogResult};
use crate::extractor::rating_value;
use crate::models::{DocumentId, Favorite, RawRating, User, integral};

pub const GENDERS: [&str; 2] = ["M", "F"];

/// Date format of reviews embedded in events
pub const REVIEW_DATE_FORMAT: &str = "%d/%m/%Y";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be empty".into()));
    }
    Ok(())
}

fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    match normalize_gender(gender) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("gender").with_message("must be M or F".into())),
    }
}

fn validate_age(age: &Value) -> Result<(), ValidationError> {
    match parse_age(age) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("age").with_message("must be a positive number".into())),
    }
}

fn validate_rating(rating: &Value) -> Result<(), ValidationError> {
    match rating_value(rating) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("rating")
            .with_message("must be an integer between 1 and 5".into())),
    }
}

/// Body for user creation
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct NewUser {
    #[serde(default)]
    #[validate(required(message = "is required"), custom(function = "not_blank"))]
    pub name: Option<String>,
    /// `M` or `F`, any case
    #[serde(default)]
    #[validate(required(message = "is required"), custom(function = "validate_gender"))]
    pub gender: Option<String>,
    /// Number or numeric string
    #[serde(default)]
    #[validate(required(message = "is required"), custom(function = "validate_age"))]
    #[schema(value_type = Option<i64>)]
    pub age: Option<Value>,
    #[serde(default)]
    #[validate(required(message = "is required"), custom(function = "not_blank"))]
    pub occupation: Option<String>,
    #[serde(default)]
    pub movies: Vec<RawRating>,
    #[serde(default)]
    pub favorites: Vec<Favorite>,
}

/// Request body for user creation: a single user or an array of them
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum NewUsers {
    Many(Vec<NewUser>),
    One(NewUser),
}

impl NewUsers {
    pub fn into_vec(self) -> Vec<NewUser> {
        match self {
            Self::Many(users) => users,
            Self::One(user) => vec![user],
        }
    }
}

/// A creation payload that passed validation, waiting for its id
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUser {
    name: String,
    gender: String,
    age: i64,
    occupation: String,
    movies: Vec<RawRating>,
    favorites: Vec<Favorite>,
}

impl NewUser {
    /// Validate and normalize; `position` names the record in error messages
    pub fn check(self, position: usize) -> CatalogResult<ValidatedUser> {
        self.validate().map_err(|e| {
            CatalogError::validation(format!("user at position {}: {}", position, e))
        })?;

        let gender = self.gender.as_deref().and_then(normalize_gender);
        let age = self.age.as_ref().and_then(parse_age);
        match (self.name, gender, age, self.occupation) {
            (Some(name), Some(gender), Some(age), Some(occupation)) => Ok(ValidatedUser {
                name: name.trim().to_string(),
                gender,
                age,
                occupation: occupation.trim().to_string(),
                movies: self.movies,
                favorites: self.favorites,
            }),
            _ => Err(CatalogError::validation(format!(
                "user at position {} is incomplete",
                position
            ))),
        }
    }
}

impl ValidatedUser {
    pub fn into_user(self, id: i64) -> User {
        let mut user = User::new(DocumentId::Int(id));
        user.name = Some(self.name);
        user.gender = Some(self.gender);
        user.age = Some(self.age);
        user.occupation = Some(self.occupation);
        user.movies = self.movies;
        user.favorites = self.favorites;
        user
    }
}

/// Upper-cased gender when it is one of [`GENDERS`]
pub fn normalize_gender(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    GENDERS.contains(&upper.as_str()).then_some(upper)
}

/// Positive age from a number or a numeric string
pub fn parse_age(value: &Value) -> Option<i64> {
    let age = match value {
        Value::Number(n) => integral(n)?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (age > 0).then_some(age)
}

/// Validate the fields of a partial user update
///
/// `_id` is never updated. Known fields are checked like on creation; other
/// fields are stored as given.
pub fn validate_patch(mut fields: Map<String, Value>) -> CatalogResult<Map<String, Value>> {
    fields.remove("_id");
    if fields.is_empty() {
        return Err(CatalogError::validation("no fields to update"));
    }

    for field in ["name", "occupation"] {
        if let Some(value) = fields.get(field) {
            let valid = value.as_str().is_some_and(|s| !s.trim().is_empty());
            if !valid {
                return Err(CatalogError::validation(format!(
                    "\"{}\" must be a non-empty string",
                    field
                )));
            }
        }
    }
    if let Some(value) = fields.get_mut("gender") {
        let gender = value
            .as_str()
            .and_then(normalize_gender)
            .ok_or_else(|| CatalogError::validation("invalid gender; use M or F"))?;
        *value = Value::String(gender);
    }
    if let Some(value) = fields.get_mut("age") {
        let age = parse_age(value)
            .ok_or_else(|| CatalogError::validation("\"age\" must be a positive number"))?;
        *value = Value::from(age);
    }
    for field in ["movies", "favorites"] {
        if fields.get(field).is_some_and(|value| !value.is_array()) {
            return Err(CatalogError::validation(format!("\"{}\" must be an array", field)));
        }
    }

    Ok(fields)
}

/// Body for adding a favorite
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewFavorite {
    /// Event id or store id
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub movieid: Option<Value>,
}

impl NewFavorite {
    /// Numeric strings become integer ids, matching path-segment parsing
    pub fn into_favorite(self) -> CatalogResult<Favorite> {
        let movieid = match self.movieid {
            Some(Value::Number(n)) => integral(&n).map(DocumentId::Int),
            Some(Value::String(s)) if !s.trim().is_empty() => Some(DocumentId::parse(s.trim())),
            _ => None,
        }
        .ok_or_else(|| CatalogError::validation("movieid is required"))?;
        Ok(Favorite { movieid })
    }
}

/// Body for reviewing an event
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct NewReview {
    /// Integer from 1 to 5
    #[serde(default)]
    #[validate(required(message = "is required"), custom(function = "validate_rating"))]
    #[schema(value_type = Option<i64>)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A review as embedded in an event's `reviews` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EventReview {
    pub user_id: DocumentId,
    pub rating: u8,
    pub comment: String,
    /// `DD/MM/YYYY`
    pub date: String,
}

impl NewReview {
    pub fn into_review(self, user_id: DocumentId, date: NaiveDate) -> CatalogResult<EventReview> {
        self.validate()
            .map_err(|e| CatalogError::validation(e.to_string()))?;
        let rating = self
            .rating
            .as_ref()
            .and_then(rating_value)
            .ok_or_else(|| CatalogError::validation("rating must be an integer between 1 and 5"))?;
        Ok(EventReview {
            user_id,
            rating,
            comment: self.comment.unwrap_or_default(),
            date: date.format(REVIEW_DATE_FORMAT).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_user(body: Value) -> NewUser {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_new_user_normalizes_fields() {
        let user = new_user(json!({
            "name": " Ana ",
            "gender": "f",
            "age": "31",
            "occupation": "engineer"
        }))
        .check(0)
        .unwrap()
        .into_user(12);

        assert_eq!(user.id, DocumentId::Int(12));
        assert_eq!(user.name.as_deref(), Some("Ana"));
        assert_eq!(user.gender.as_deref(), Some("F"));
        assert_eq!(user.age, Some(31));
        assert!(user.movies.is_empty());
        assert!(user.favorites.is_empty());
    }

    #[test]
    fn test_new_user_rejections_name_the_field_and_position() {
        let cases = [
            (json!({ "gender": "M", "age": 20, "occupation": "x" }), "name", "is required"),
            (json!({ "name": "A", "gender": "X", "age": 20, "occupation": "x" }), "gender", "must be M or F"),
            (json!({ "name": "A", "gender": "M", "occupation": "x" }), "age", "is required"),
            (json!({ "name": "A", "gender": "M", "age": "old", "occupation": "x" }), "age", "positive number"),
            (json!({ "name": "A", "gender": "M", "age": 0, "occupation": "x" }), "age", "positive number"),
            (json!({ "name": "A", "gender": "M", "age": 20, "occupation": " " }), "occupation", "must not be empty"),
        ];

        for (body, field, expected) in cases {
            let err = new_user(body).check(2).unwrap_err();
            let CatalogError::Validation(message) = err else {
                panic!("expected a validation error");
            };
            assert!(message.contains("position 2"), "{}", message);
            assert!(message.contains(field), "{}", message);
            assert!(message.contains(expected), "{}", message);
        }
    }

    #[test]
    fn test_new_users_accepts_object_or_array() {
        let one: NewUsers = serde_json::from_value(json!({ "name": "Solo" })).unwrap();
        assert_eq!(one.into_vec().len(), 1);

        let many: NewUsers = serde_json::from_value(json!([{ "name": "A" }, { "name": "B" }])).unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn test_validate_patch() {
        let patch = json!({ "_id": 99, "gender": "m", "age": "40", "city": "Porto" });
        let fields = validate_patch(patch.as_object().unwrap().clone()).unwrap();
        assert!(!fields.contains_key("_id"));
        assert_eq!(fields["gender"], "M");
        assert_eq!(fields["age"], 40);
        assert_eq!(fields["city"], "Porto");

        let only_id = json!({ "_id": 5 });
        assert!(validate_patch(only_id.as_object().unwrap().clone()).is_err());

        for bad in [json!({ "name": "" }), json!({ "age": -1 }), json!({ "movies": "none" })] {
            assert!(validate_patch(bad.as_object().unwrap().clone()).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_favorite_ids() {
        let numeric = NewFavorite { movieid: Some(json!("42")) }.into_favorite().unwrap();
        assert_eq!(numeric.movieid, DocumentId::Int(42));

        let store = NewFavorite { movieid: Some(json!("65f0c0ffee0000000000abcd")) }
            .into_favorite()
            .unwrap();
        assert_eq!(store.movieid, DocumentId::Text("65f0c0ffee0000000000abcd".into()));

        assert!(NewFavorite::default().into_favorite().is_err());
        assert!(NewFavorite { movieid: Some(json!(1.5)) }.into_favorite().is_err());
    }

    #[test]
    fn test_review_formats_date_and_checks_rating() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let review = NewReview {
            rating: Some(json!(4)),
            comment: None,
        }
        .into_review(DocumentId::Int(3), date)
        .unwrap();

        assert_eq!(review.date, "09/03/2024");
        assert_eq!(review.comment, "");
        assert_eq!(
            serde_json::to_value(&review).unwrap(),
            json!({ "user_id": 3, "rating": 4, "comment": "", "date": "09/03/2024" })
        );

        for rating in [json!(0), json!(6), json!(4.5), json!("5")] {
            let bad = NewReview {
                rating: Some(rating),
                comment: None,
            };
            assert!(bad.into_review(DocumentId::Int(3), date).is_err());
        }
    }
}
