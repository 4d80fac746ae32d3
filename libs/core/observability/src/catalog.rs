//! Catalog query metrics.

use metrics::{counter, histogram};
use std::time::Duration;

/// Data-quality conditions that are skipped rather than failing a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftCondition {
    /// Rating references an event that does not exist
    DanglingReference,
    /// Rating value missing, non-numeric or outside 1..=5
    MalformedRating,
    /// Rating date missing or unparseable where a date was required
    UndatedRating,
}

impl SoftCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DanglingReference => "dangling_reference",
            Self::MalformedRating => "malformed_rating",
            Self::UndatedRating => "undated_rating",
        }
    }
}

/// Catalog metrics recorder
pub struct CatalogMetrics;

impl CatalogMetrics {
    /// Record one completed query and its duration
    pub fn record_query(operation: &'static str, elapsed: Duration) {
        counter!("catalog_queries_total", "operation" => operation).increment(1);
        histogram!("catalog_query_duration_seconds", "operation" => operation)
            .record(elapsed.as_secs_f64());

        tracing::debug!(
            operation = operation,
            duration_ms = elapsed.as_millis() as u64,
            "Catalog query completed"
        );
    }

    /// Record skipped records; zero counts are not emitted
    pub fn record_soft_condition(kind: SoftCondition, count: u64) {
        if count == 0 {
            return;
        }
        counter!("catalog_soft_conditions_total", "kind" => kind.as_str()).increment(count);
    }
}
