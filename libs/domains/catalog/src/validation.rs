//! Query-parameter parsing shared by handlers and service.

use crate::error::{CatalogError, CatalogResult};
use crate::models::DocumentId;
use crate::ranking::SortOrder;
use std::num::NonZeroUsize;

/// Parse a `limit` parameter; absent means `default`
///
/// Non-numeric, zero and negative values are rejected.
pub fn parse_limit(raw: Option<&str>, default: NonZeroUsize) -> CatalogResult<NonZeroUsize> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let raw = raw.trim();
    let value: i64 = raw
        .parse()
        .map_err(|_| CatalogError::validation(format!("limit must be a positive integer, got '{}'", raw)))?;

    usize::try_from(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| CatalogError::validation(format!("limit must be greater than 0, got {}", value)))
}

/// Parse an `order` parameter; absent means descending
pub fn parse_order(raw: Option<&str>) -> CatalogResult<SortOrder> {
    match raw {
        None => Ok(SortOrder::default()),
        Some(raw) => raw.trim().parse().map_err(|_| {
            CatalogError::validation(format!("order must be 'asc' or 'desc', got '{}'", raw))
        }),
    }
}

/// Parse a `page` parameter; anything missing or invalid is page 1
pub fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|&page| page >= 1)
        .unwrap_or(1)
}

/// Parse a user id path segment; user ids are numeric
pub fn parse_user_id(raw: &str) -> CatalogResult<DocumentId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CatalogError::validation("user id must not be empty"));
    }
    raw.parse::<i64>()
        .map(DocumentId::Int)
        .map_err(|_| CatalogError::validation(format!("user id must be numeric, got '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten() -> NonZeroUsize {
        NonZeroUsize::new(10).unwrap()
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None, ten()).unwrap().get(), 10);
        assert_eq!(parse_limit(Some("3"), ten()).unwrap().get(), 3);
        assert_eq!(parse_limit(Some(" 7 "), ten()).unwrap().get(), 7);
    }

    #[test]
    fn test_parse_limit_rejects_bad_values() {
        for bad in ["0", "-2", "abc", "", "1.5"] {
            assert!(
                matches!(parse_limit(Some(bad), ten()), Err(CatalogError::Validation(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_order() {
        assert_eq!(parse_order(None).unwrap(), SortOrder::Desc);
        assert_eq!(parse_order(Some("asc")).unwrap(), SortOrder::Asc);
        assert!(matches!(parse_order(Some("sideways")), Err(CatalogError::Validation(_))));
    }

    #[test]
    fn test_parse_page_falls_back_to_first() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("3")), 3);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-4")), 1);
        assert_eq!(parse_page(Some("next")), 1);
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("42").unwrap(), DocumentId::Int(42));
        assert!(matches!(parse_user_id(""), Err(CatalogError::Validation(_))));
        assert!(matches!(parse_user_id("bob"), Err(CatalogError::Validation(_))));
    }
}
