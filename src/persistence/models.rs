//! Database Models
//!
//! Persistent data structures for products, price history, and alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Product record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductRecord {
    pub id: i64,
    pub title: String,
    /// Canonical product URL, unique
    pub store_url: String,
    pub created_at: DateTime<Utc>,
}

/// One price observation, never mutated after insertion
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceHistoryRecord {
    pub id: i64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub product_id: i64,
}

/// Alert record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRecord {
    pub id: i64,
    pub target_price: f64,
    pub product_id: i64,
    pub created_at: DateTime<Utc>,
    /// First time this alert was reported triggered, if ever
    pub fired_at: Option<DateTime<Utc>>,
}

/// One point of a product's price history, as served to callers
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate statistics over a product's observations
///
/// All fields are 0.0 when the product has no observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceStats {
    pub lowest: f64,
    pub highest: f64,
    pub average: f64,
}

/// An alert whose target price is at or above the latest observed price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredAlert {
    pub product_title: String,
    pub target_price: f64,
    pub current_price: f64,
}
