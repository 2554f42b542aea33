//! Product Source Trait
//!
//! This module defines the `ProductSource` trait, the common interface every
//! store backend implements. One implementation covers one storefront; the
//! aggregator only ever talks to this trait, which keeps the search pipeline
//! independent of any store's wire format and lets tests substitute fake
//! backends.

use crate::domain::entities::product::ProductSnapshot;
use async_trait::async_trait;
use thiserror::Error;

/// Common result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur while fetching from a store backend
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Transport or HTTP-level failure reaching the store
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Response could not be parsed, or the store reported application errors
    #[error("store protocol error: {0}")]
    Protocol(String),
}

/// One page of normalized results from a store
#[derive(Debug, Clone)]
pub struct SourcePage {
    /// Snapshots for this page; records missing a usable title, price, or
    /// identity have already been dropped
    pub snapshots: Vec<ProductSnapshot>,
    /// Opaque cursor for the next page, `None` when the store is exhausted
    pub next_cursor: Option<String>,
}

/// Store backend interface
///
/// Implementations must not retry internally; retry and partial-failure policy
/// belong to the pagination and aggregation layers.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Name of the store, used for logging and the snapshot `source` field
    fn store_name(&self) -> &str;

    /// Fetch one page of products whose titles match `search_term`
    ///
    /// # Arguments
    /// * `search_term` - non-empty term, matched case-insensitively by the backend
    /// * `cursor` - pagination cursor from the previous page, `None` for the first
    async fn fetch_page(
        &self,
        search_term: &str,
        cursor: Option<&str>,
    ) -> SourceResult<SourcePage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display() {
        let error = SourceError::Unavailable("connection refused".to_string());
        assert_eq!(error.to_string(), "store unavailable: connection refused");

        let error = SourceError::Protocol("invalid JSON".to_string());
        assert_eq!(error.to_string(), "store protocol error: invalid JSON");
    }
}
