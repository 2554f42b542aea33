use serde::{Deserialize, Serialize};

/// One Shopify storefront to search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    /// Base URL of the store, e.g. "https://example.myshopify.com"
    pub url: String,
    pub storefront_access_token: String,
}

/// Application configuration: store roster and HTTP settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub stores: Vec<StoreConfig>,
    /// Per-request network timeout for store queries, in seconds
    pub http_timeout_secs: u64,
    pub bind_addr: String,
}

impl AppConfig {
    /// Default configuration with the demo storefronts
    pub fn default() -> AppConfig {
        let stores = vec![
            StoreConfig {
                name: "TIA Store-A".to_string(),
                url: "https://tiastore-a.myshopify.com".to_string(),
                storefront_access_token: "34b31616261360c6cb5ab3b7a6e329f5".to_string(),
            },
            StoreConfig {
                name: "TIA Store-B".to_string(),
                url: "https://trackitall-tia.myshopify.com".to_string(),
                storefront_access_token: "6d9742469e7bd501ce13a18b5a949913".to_string(),
            },
            StoreConfig {
                name: "TIA Store-C".to_string(),
                url: "https://tia-store-c.myshopify.com".to_string(),
                storefront_access_token: "032e9d370a8b3db435af0f41a07c6bd2".to_string(),
            },
            StoreConfig {
                name: "TIA Store-D".to_string(),
                url: "https://tia-store-d.myshopify.com".to_string(),
                storefront_access_token: "46432135fd1cd84d0aa4d07471ce079c".to_string(),
            },
        ];

        AppConfig {
            stores,
            http_timeout_secs: 10,
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// `SHOPIFY_STORES` replaces the whole store roster with a JSON array of
    /// `{name, url, storefront_access_token}` objects.
    pub fn from_env() -> AppConfig {
        let mut config = AppConfig::default();

        if let Ok(stores_json) = std::env::var("SHOPIFY_STORES") {
            match serde_json::from_str::<Vec<StoreConfig>>(&stores_json) {
                Ok(stores) if !stores.is_empty() => {
                    config.stores = stores;
                }
                Ok(_) => {
                    tracing::warn!(
                        "SHOPIFY_STORES is an empty list, keeping {} default stores",
                        config.stores.len()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SHOPIFY_STORES: {}, keeping default stores",
                        e
                    );
                }
            }
        }

        if let Ok(timeout) = std::env::var("HTTP_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(value) if (1..=120).contains(&value) => {
                    config.http_timeout_secs = value;
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid HTTP_TIMEOUT_SECS value: {} (must be between 1 and 120), using default: {}",
                        value,
                        config.http_timeout_secs
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse HTTP_TIMEOUT_SECS '{}': {}, using default: {}",
                        timeout,
                        e,
                        config.http_timeout_secs
                    );
                }
            }
        }

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            if !addr.is_empty() {
                config.bind_addr = addr;
            }
        }

        config
    }
}
