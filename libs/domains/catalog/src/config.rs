//! Catalog settings loaded from the environment.

use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};
use std::num::NonZeroUsize;

const DEFAULT_PAGE_SIZE: NonZeroUsize = NonZeroUsize::new(20).unwrap();
const DEFAULT_TOP_LIMIT: NonZeroUsize = NonZeroUsize::new(10).unwrap();

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSettings {
    pub events_collection: String,
    pub users_collection: String,
    /// Fixed page size of the listing endpoints
    pub page_size: NonZeroUsize,
    /// Limit used by ranking endpoints when none is given
    pub default_top_limit: NonZeroUsize,
    /// Also extract reviews embedded in event documents
    pub include_event_reviews: bool,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            events_collection: "events".to_string(),
            users_collection: "users".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            default_top_limit: DEFAULT_TOP_LIMIT,
            include_event_reviews: false,
        }
    }
}

impl FromEnv for CatalogSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            events_collection: env_or_default("CATALOG_EVENTS_COLLECTION", &defaults.events_collection),
            users_collection: env_or_default("CATALOG_USERS_COLLECTION", &defaults.users_collection),
            page_size: env_parse_or("CATALOG_PAGE_SIZE", defaults.page_size)?,
            default_top_limit: env_parse_or("CATALOG_DEFAULT_TOP_LIMIT", defaults.default_top_limit)?,
            include_event_reviews: env_parse_or(
                "CATALOG_INCLUDE_EVENT_REVIEWS",
                defaults.include_event_reviews,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 5] = [
        "CATALOG_EVENTS_COLLECTION",
        "CATALOG_USERS_COLLECTION",
        "CATALOG_PAGE_SIZE",
        "CATALOG_DEFAULT_TOP_LIMIT",
        "CATALOG_INCLUDE_EVENT_REVIEWS",
    ];

    #[test]
    fn test_defaults_when_unset() {
        temp_env::with_vars_unset(VARS, || {
            let settings = CatalogSettings::from_env().unwrap();
            assert_eq!(settings, CatalogSettings::default());
            assert_eq!(settings.page_size.get(), 20);
            assert_eq!(settings.default_top_limit.get(), 10);
            assert!(!settings.include_event_reviews);
        });
    }

    #[test]
    fn test_overrides() {
        temp_env::with_vars(
            [
                ("CATALOG_EVENTS_COLLECTION", Some("shows")),
                ("CATALOG_PAGE_SIZE", Some("50")),
                ("CATALOG_INCLUDE_EVENT_REVIEWS", Some("true")),
            ],
            || {
                let settings = CatalogSettings::from_env().unwrap();
                assert_eq!(settings.events_collection, "shows");
                assert_eq!(settings.users_collection, "users");
                assert_eq!(settings.page_size.get(), 50);
                assert!(settings.include_event_reviews);
            },
        );
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        temp_env::with_var("CATALOG_PAGE_SIZE", Some("0"), || {
            let err = CatalogSettings::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "CATALOG_PAGE_SIZE"));
        });
    }

    #[test]
    fn test_non_boolean_flag_is_rejected() {
        temp_env::with_var("CATALOG_INCLUDE_EVENT_REVIEWS", Some("sometimes"), || {
            assert!(CatalogSettings::from_env().is_err());
        });
    }
}
