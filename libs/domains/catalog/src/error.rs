//! Catalog domain error types

use axum_helpers::AppError;
use thiserror::Error;

/// Result type for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Catalog domain errors
///
/// Dangling references and malformed rating records are not errors; they are
/// skipped during extraction and only counted.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Bad limit, sort order, year, page or payload
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Favorite {movieid} not found for user {user_id}")]
    FavoriteNotFound { user_id: String, movieid: String },

    /// The write would duplicate existing state
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// A document could not be converted to or from BSON
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<mongodb::bson::de::Error> for CatalogError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        Self::Decode(format!("BSON deserialization error: {}", err))
    }
}

impl From<mongodb::bson::ser::Error> for CatalogError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::Decode(format!("BSON serialization error: {}", err))
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(message) => AppError::BadRequest(message),
            CatalogError::EventNotFound(id) => AppError::NotFound(format!("Event not found: {}", id)),
            CatalogError::UserNotFound(id) => AppError::NotFound(format!("User not found: {}", id)),
            err @ CatalogError::FavoriteNotFound { .. } => AppError::NotFound(err.to_string()),
            CatalogError::Conflict(message) => AppError::Conflict(message),
            CatalogError::Database(e) => AppError::Database(e.to_string()),
            CatalogError::Decode(message) => AppError::DatabaseDecode(message),
            CatalogError::Internal(message) => AppError::InternalServerError(message),
        }
    }
}

impl axum::response::IntoResponse for CatalogError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
