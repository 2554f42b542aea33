//! Search Aggregator
//!
//! Fans one search out across every configured store concurrently and merges
//! the results into a single list sorted by price ascending. A store that
//! fails contributes whatever it returned before failing; its error is logged
//! and never fails the overall search.
//!
//! Results are collected by joining the per-store tasks in store-list order,
//! then stable-sorted, so the final ordering is deterministic no matter which
//! store finishes first. Ties on price keep store-list order.
//!
//! Prices from different currencies are compared nominally; no conversion is
//! performed.

use crate::domain::entities::product::ProductSnapshot;
use crate::domain::repositories::product_source::ProductSource;
use crate::domain::services::paginator;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct SearchAggregator {
    sources: Vec<Arc<dyn ProductSource>>,
}

impl SearchAggregator {
    pub fn new(sources: Vec<Arc<dyn ProductSource>>) -> Self {
        Self { sources }
    }

    pub fn store_count(&self) -> usize {
        self.sources.len()
    }

    /// Search all stores for `search_term`, sorted by price ascending.
    pub async fn search(&self, search_term: &str) -> Vec<ProductSnapshot> {
        let tasks: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let term = search_term.to_string();
                tokio::spawn(async move { paginator::fetch_all(source.as_ref(), &term).await })
            })
            .collect();

        let mut merged = Vec::new();
        for (source, task) in self.sources.iter().zip(tasks) {
            match task.await {
                Ok(outcome) => {
                    debug!(
                        store = %source.store_name(),
                        count = outcome.snapshots.len(),
                        "Store search completed"
                    );
                    if let Some(e) = outcome.error {
                        warn!(
                            store = %source.store_name(),
                            error = %e,
                            "Store failed mid-search, merging partial results"
                        );
                    }
                    merged.extend(outcome.snapshots);
                }
                Err(e) => {
                    error!(store = %source.store_name(), "Store search task panicked: {}", e);
                }
            }
        }

        merged.sort_by(|a, b| a.price.total_cmp(&b.price));
        merged
    }
}
