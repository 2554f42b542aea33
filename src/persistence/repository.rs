//! Database Repository
//!
//! Data access layer for tracked products, price history, and alerts.

use super::models::*;
use super::{DatabaseError, DbPool};
use chrono::Utc;
use sqlx::Row;
use tracing::{debug, error};

/// Price ledger: products and their append-only price history
pub struct PriceLedger {
    pool: DbPool,
}

impl PriceLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Return the product id for `store_url`, creating the product if absent.
    ///
    /// Concurrent calls for the same URL are resolved by the uniqueness
    /// constraint: the insert is a no-op on conflict and the existing row is
    /// fetched instead.
    pub async fn upsert_product(&self, title: &str, store_url: &str) -> Result<i64, DatabaseError> {
        let now = Utc::now();
        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO products (title, store_url, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(store_url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(store_url)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to upsert product {}: {}", store_url, e);
            DatabaseError::QueryError(format!("Failed to upsert product: {}", e))
        })?;

        if let Some((id,)) = inserted {
            debug!("Created product {} for {}", id, store_url);
            return Ok(id);
        }

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM products WHERE store_url = ?1")
            .bind(store_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to fetch product {}: {}", store_url, e);
                DatabaseError::QueryError(format!("Failed to fetch product: {}", e))
            })?;

        Ok(id)
    }

    /// Append one price observation for an existing product.
    pub async fn record_observation(
        &self,
        product_id: i64,
        price: f64,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO price_history (price, timestamp, product_id)
            VALUES (?1, ?2, ?3)
            RETURNING id
            "#,
        )
        .bind(price)
        .bind(now)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to record observation for product {}: {}", product_id, e);
            DatabaseError::QueryError(format!("Failed to record observation: {}", e))
        })?;

        debug!("Recorded observation {} for product {}", id, product_id);
        Ok(id)
    }

    /// Create the product if absent and append one observation, as a single
    /// transaction.
    pub async fn track(
        &self,
        title: &str,
        store_url: &str,
        price: f64,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin track transaction: {}", e);
            DatabaseError::QueryError(format!("Failed to begin transaction: {}", e))
        })?;

        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO products (title, store_url, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(store_url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(store_url)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to upsert product {}: {}", store_url, e);
            DatabaseError::QueryError(format!("Failed to upsert product: {}", e))
        })?;

        let product_id = match inserted {
            Some((id,)) => id,
            None => {
                let (id,): (i64,) = sqlx::query_as("SELECT id FROM products WHERE store_url = ?1")
                    .bind(store_url)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| {
                        error!("Failed to fetch product {}: {}", store_url, e);
                        DatabaseError::QueryError(format!("Failed to fetch product: {}", e))
                    })?;
                id
            }
        };

        sqlx::query(
            "INSERT INTO price_history (price, timestamp, product_id) VALUES (?1, ?2, ?3)",
        )
        .bind(price)
        .bind(now)
        .bind(product_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to record observation for {}: {}", store_url, e);
            DatabaseError::QueryError(format!("Failed to record observation: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit track transaction: {}", e);
            DatabaseError::QueryError(format!("Failed to commit transaction: {}", e))
        })?;

        debug!("Tracked {} at {}", store_url, price);
        Ok(product_id)
    }

    /// Get the product identified by `store_url`, if tracked.
    pub async fn find_by_url(&self, store_url: &str) -> Result<Option<ProductRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, ProductRecord>(
            "SELECT * FROM products WHERE store_url = ?1",
        )
        .bind(store_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get product {}: {}", store_url, e);
            DatabaseError::QueryError(format!("Failed to get product: {}", e))
        })?;

        Ok(record)
    }

    /// Full price history for the product at `store_url`, oldest first.
    ///
    /// Unknown URLs yield an empty history, not an error.
    pub async fn history(&self, store_url: &str) -> Result<Vec<PricePoint>, DatabaseError> {
        let points = sqlx::query_as::<_, PricePoint>(
            r#"
            SELECT ph.price, ph.timestamp
            FROM price_history ph
            JOIN products p ON p.id = ph.product_id
            WHERE p.store_url = ?1
            ORDER BY ph.timestamp ASC, ph.id ASC
            "#,
        )
        .bind(store_url)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get history for {}: {}", store_url, e);
            DatabaseError::QueryError(format!("Failed to get history: {}", e))
        })?;

        Ok(points)
    }

    /// Min/max/average over all observations for a product; all zero when the
    /// product has none.
    pub async fn stats(&self, product_id: i64) -> Result<PriceStats, DatabaseError> {
        let stats = sqlx::query_as::<_, PriceStats>(
            r#"
            SELECT
                COALESCE(MIN(price), 0.0) AS lowest,
                COALESCE(MAX(price), 0.0) AS highest,
                COALESCE(AVG(price), 0.0) AS average
            FROM price_history
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get stats for product {}: {}", product_id, e);
            DatabaseError::QueryError(format!("Failed to get stats: {}", e))
        })?;

        Ok(stats)
    }
}

/// Alert repository and evaluator
pub struct AlertRepository {
    pool: DbPool,
}

impl AlertRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register a target price for an existing product. Multiple alerts per
    /// product are allowed.
    pub async fn create(
        &self,
        product_id: i64,
        target_price: f64,
    ) -> Result<AlertRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, AlertRecord>(
            r#"
            INSERT INTO alerts (target_price, product_id, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING *
            "#,
        )
        .bind(target_price)
        .bind(product_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create alert for product {}: {}", product_id, e);
            DatabaseError::QueryError(format!("Failed to create alert: {}", e))
        })?;

        debug!(
            "Created alert {} for product {} at target {}",
            record.id, product_id, target_price
        );
        Ok(record)
    }

    /// Evaluate every alert against the latest observation of its product.
    ///
    /// An alert triggers when a latest observation exists and its price is at
    /// or below the target. Triggered alerts stay in place and are re-reported
    /// on every call; only `fired_at` is stamped on the first trigger.
    pub async fn check_alerts(&self) -> Result<Vec<TriggeredAlert>, DatabaseError> {
        let alerts = sqlx::query(
            r#"
            SELECT a.id, a.target_price, a.product_id, a.fired_at IS NULL AS unfired, p.title
            FROM alerts a
            JOIN products p ON p.id = a.product_id
            ORDER BY a.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load alerts: {}", e);
            DatabaseError::QueryError(format!("Failed to load alerts: {}", e))
        })?;

        let mut triggered = Vec::new();
        for row in alerts {
            let alert_id: i64 = row.get("id");
            let target_price: f64 = row.get("target_price");
            let product_id: i64 = row.get("product_id");
            let unfired: bool = row.get("unfired");
            let title: String = row.get("title");

            let latest: Option<(f64,)> = sqlx::query_as(
                r#"
                SELECT price FROM price_history
                WHERE product_id = ?1
                ORDER BY timestamp DESC, id DESC
                LIMIT 1
                "#,
            )
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get latest price for product {}: {}", product_id, e);
                DatabaseError::QueryError(format!("Failed to get latest price: {}", e))
            })?;

            let Some((current_price,)) = latest else {
                continue;
            };

            if current_price <= target_price {
                if unfired {
                    sqlx::query("UPDATE alerts SET fired_at = ?1 WHERE id = ?2")
                        .bind(Utc::now())
                        .bind(alert_id)
                        .execute(&self.pool)
                        .await
                        .map_err(|e| {
                            error!("Failed to stamp alert {}: {}", alert_id, e);
                            DatabaseError::QueryError(format!("Failed to stamp alert: {}", e))
                        })?;
                }
                triggered.push(TriggeredAlert {
                    product_title: title,
                    target_price,
                    current_price,
                });
            }
        }

        Ok(triggered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{init_database, DatabaseConfig};

    async fn pool() -> DbPool {
        init_database(&DatabaseConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_product_is_idempotent_per_url() {
        let ledger = PriceLedger::new(pool().await);

        let first = ledger
            .upsert_product("Iphone 16", "https://a.example/products/iphone-16")
            .await
            .unwrap();
        let second = ledger
            .upsert_product("Iphone 16 renamed", "https://a.example/products/iphone-16")
            .await
            .unwrap();
        let other = ledger
            .upsert_product("Iphone 16", "https://b.example/products/iphone-16")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_history_unknown_url_is_empty() {
        let ledger = PriceLedger::new(pool().await);
        let history = ledger.history("https://nowhere.example/p/x").await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_stats_zero_without_observations() {
        let ledger = PriceLedger::new(pool().await);
        let id = ledger
            .upsert_product("Untouched", "https://a.example/products/untouched")
            .await
            .unwrap();

        let stats = ledger.stats(id).await.unwrap();
        assert_eq!(stats.lowest, 0.0);
        assert_eq!(stats.highest, 0.0);
        assert_eq!(stats.average, 0.0);
    }

    #[tokio::test]
    async fn test_track_appends_history_in_order() {
        let ledger = PriceLedger::new(pool().await);
        let url = "https://a.example/products/widget";

        ledger.track("Widget", url, 100.0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ledger.track("Widget", url, 50.0).await.unwrap();

        let history = ledger.history(url).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].price, 100.0);
        assert_eq!(history[1].price, 50.0);
        assert!(history[0].timestamp < history[1].timestamp);

        let product = ledger.find_by_url(url).await.unwrap().unwrap();
        let stats = ledger.stats(product.id).await.unwrap();
        assert_eq!(stats.lowest, 50.0);
        assert_eq!(stats.highest, 100.0);
        assert_eq!(stats.average, 75.0);
    }

    #[tokio::test]
    async fn test_check_alerts_trigger_threshold() {
        let db = pool().await;
        let ledger = PriceLedger::new(db.clone());
        let alerts = AlertRepository::new(db);
        let url = "https://a.example/products/gadget";

        let product_id = ledger.track("Gadget", url, 70.0).await.unwrap();
        alerts.create(product_id, 60.0).await.unwrap();

        // Latest price 70.0 is above target 60.0
        let triggered = alerts.check_alerts().await.unwrap();
        assert!(triggered.is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ledger.record_observation(product_id, 50.0).await.unwrap();

        let triggered = alerts.check_alerts().await.unwrap();
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].product_title, "Gadget");
        assert_eq!(triggered[0].target_price, 60.0);
        assert_eq!(triggered[0].current_price, 50.0);
    }

    #[tokio::test]
    async fn test_check_alerts_reports_again_until_removed() {
        let db = pool().await;
        let ledger = PriceLedger::new(db.clone());
        let alerts = AlertRepository::new(db);

        let product_id = ledger
            .track("Gadget", "https://a.example/products/gadget", 40.0)
            .await
            .unwrap();
        alerts.create(product_id, 60.0).await.unwrap();

        let first = alerts.check_alerts().await.unwrap();
        let second = alerts.check_alerts().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].current_price, second[0].current_price);
    }

    #[tokio::test]
    async fn test_alert_without_observations_never_triggers() {
        let db = pool().await;
        let ledger = PriceLedger::new(db.clone());
        let alerts = AlertRepository::new(db);

        let product_id = ledger
            .upsert_product("Bare", "https://a.example/products/bare")
            .await
            .unwrap();
        alerts.create(product_id, 1000.0).await.unwrap();

        let triggered = alerts.check_alerts().await.unwrap();
        assert!(triggered.is_empty());
    }

    #[tokio::test]
    async fn test_alert_exactly_at_target_triggers() {
        let db = pool().await;
        let ledger = PriceLedger::new(db.clone());
        let alerts = AlertRepository::new(db);

        let product_id = ledger
            .track("Edge", "https://a.example/products/edge", 60.0)
            .await
            .unwrap();
        alerts.create(product_id, 60.0).await.unwrap();

        let triggered = alerts.check_alerts().await.unwrap();
        assert_eq!(triggered.len(), 1);
    }
}
