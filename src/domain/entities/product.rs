//! Product Snapshot Entity
//!
//! A `ProductSnapshot` is the normalized, in-memory representation of one
//! product as seen on one store at fetch time. The `product_url` field is the
//! canonical identity of the product across the whole system: the persistence
//! layer de-duplicates on it, and sources that do not return a direct URL must
//! reconstruct one deterministically from the product handle.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Name of the store this snapshot came from
    pub source: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    /// Canonical product URL, unique per real-world product
    pub product_url: String,
}
