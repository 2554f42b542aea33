//! Source Paginator
//!
//! Drives a single `ProductSource` through all of its result pages for one
//! search term. Pagination stops when the store returns no continuation
//! cursor, when a safety bound is hit, or on the first source error. Errors do
//! not discard pages already collected: for a multi-store aggregation, partial
//! results beat none.

use crate::domain::entities::product::ProductSnapshot;
use crate::domain::repositories::product_source::{ProductSource, SourceError};
use tracing::warn;

/// Upper bound on pages fetched from one store in one search, so a backend
/// that keeps handing out cursors cannot loop us forever.
pub const MAX_PAGES: usize = 1000;

/// Result of paginating one store: everything collected so far, plus the error
/// that stopped pagination early, if any.
#[derive(Debug)]
pub struct PaginationOutcome {
    pub snapshots: Vec<ProductSnapshot>,
    pub error: Option<SourceError>,
}

/// Fetch every page of results for `search_term` from `source`.
pub async fn fetch_all(source: &dyn ProductSource, search_term: &str) -> PaginationOutcome {
    let mut snapshots = Vec::new();
    let mut cursor: Option<String> = None;

    for page_index in 0..MAX_PAGES {
        match source.fetch_page(search_term, cursor.as_deref()).await {
            Ok(page) => {
                snapshots.extend(page.snapshots);
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => {
                        return PaginationOutcome {
                            snapshots,
                            error: None,
                        }
                    }
                }
            }
            Err(e) => {
                warn!(
                    store = %source.store_name(),
                    page = page_index,
                    error = %e,
                    "Stopping pagination after source error, keeping partial results"
                );
                return PaginationOutcome {
                    snapshots,
                    error: Some(e),
                };
            }
        }
    }

    warn!(
        store = %source.store_name(),
        max_pages = MAX_PAGES,
        "Page safety bound reached, treating store as exhausted"
    );
    PaginationOutcome {
        snapshots,
        error: None,
    }
}
