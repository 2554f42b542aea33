//! Shopify Storefront Client
//!
//! Fetches product pages from one Shopify storefront through the Storefront
//! GraphQL API and normalizes the response into `ProductSnapshot`s. The
//! response schema is modeled explicitly with optional fields; normalization
//! drops records that lack a usable title, price, or identity instead of
//! erroring.
//!
//! Development stores return a null `onlineStoreUrl`, so the canonical URL is
//! rebuilt from the product handle when needed. No retries happen here; the
//! paginator and aggregator own the failure policy.

use crate::config::StoreConfig;
use crate::domain::entities::product::ProductSnapshot;
use crate::domain::repositories::product_source::{
    ProductSource, SourceError, SourcePage, SourceResult,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Storefront API version pinned for the GraphQL endpoint
const STOREFRONT_API_VERSION: &str = "2024-01";

/// Fixed page size for product queries
pub const PAGE_SIZE: u32 = 20;

const PRODUCT_LIST_QUERY: &str = r#"
query ProductList($cursor: String, $query: String) {
  products(first: 20, after: $cursor, query: $query) {
    pageInfo { hasNextPage, endCursor }
    edges {
      node {
        id
        title
        handle
        onlineStoreUrl
        variants(first: 1) {
          edges { node { price { amount, currencyCode } } }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ResponseData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    products: Option<ProductConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductConnection {
    page_info: PageInfo,
    #[serde(default)]
    edges: Vec<ProductEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductEdge {
    node: ProductNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductNode {
    title: Option<String>,
    handle: Option<String>,
    online_store_url: Option<String>,
    variants: Option<VariantConnection>,
}

#[derive(Debug, Deserialize)]
struct VariantConnection {
    #[serde(default)]
    edges: Vec<VariantEdge>,
}

#[derive(Debug, Deserialize)]
struct VariantNode {
    price: Option<VariantPrice>,
}

#[derive(Debug, Deserialize)]
struct VariantEdge {
    node: VariantNode,
}

/// Storefront returns the amount as a decimal string
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantPrice {
    amount: Option<String>,
    currency_code: Option<String>,
}

/// Client for one Shopify storefront
pub struct ShopifyClient {
    client: Client,
    store: StoreConfig,
}

impl ShopifyClient {
    pub fn new(store: StoreConfig, client: Client) -> Self {
        Self { client, store }
    }

    fn graphql_url(&self) -> String {
        format!(
            "{}/api/{}/graphql.json",
            self.store.url, STOREFRONT_API_VERSION
        )
    }

    fn parse_page(&self, response: GraphqlResponse) -> SourceResult<SourcePage> {
        if let Some(errors) = response.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(SourceError::Protocol(messages.join("; ")));
        }

        let connection = response
            .data
            .and_then(|d| d.products)
            .ok_or_else(|| SourceError::Protocol("response has no products field".to_string()))?;

        let snapshots: Vec<ProductSnapshot> = connection
            .edges
            .into_iter()
            .filter_map(|edge| normalize_node(&self.store, edge.node))
            .collect();

        let next_cursor = if connection.page_info.has_next_page {
            connection.page_info.end_cursor
        } else {
            None
        };

        Ok(SourcePage {
            snapshots,
            next_cursor,
        })
    }
}

/// Turn one raw product node into a snapshot, or drop it.
///
/// A record is dropped when it has no title, when its first variant carries no
/// parseable non-negative price, or when neither a direct URL nor a handle is
/// available to establish the canonical URL.
fn normalize_node(store: &StoreConfig, node: ProductNode) -> Option<ProductSnapshot> {
    let title = node.title?;

    let price_info = node
        .variants?
        .edges
        .into_iter()
        .next()?
        .node
        .price?;

    let price: f64 = price_info.amount?.parse().ok()?;
    if !price.is_finite() || price < 0.0 {
        return None;
    }

    let product_url = match node.online_store_url {
        Some(url) => url,
        None => {
            let handle = node.handle?;
            format!("{}/products/{}", store.url, handle)
        }
    };

    Some(ProductSnapshot {
        source: store.name.clone(),
        title,
        price,
        currency: price_info.currency_code.unwrap_or_default(),
        product_url,
    })
}

#[async_trait]
impl ProductSource for ShopifyClient {
    fn store_name(&self) -> &str {
        &self.store.name
    }

    async fn fetch_page(
        &self,
        search_term: &str,
        cursor: Option<&str>,
    ) -> SourceResult<SourcePage> {
        let payload = serde_json::json!({
            "query": PRODUCT_LIST_QUERY,
            "variables": {
                "cursor": cursor,
                "query": format!("title:*{}*", search_term),
            }
        });

        debug!(store = %self.store.name, cursor = ?cursor, "Fetching product page");

        let response = self
            .client
            .post(self.graphql_url())
            .header("Content-Type", "application/json")
            .header(
                "X-Shopify-Storefront-Access-Token",
                &self.store.storefront_access_token,
            )
            .json(&payload)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Unavailable(format!(
                "storefront API returned {}: {}",
                status, body
            )));
        }

        let parsed: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Protocol(format!("failed to decode response: {}", e)))?;

        self.parse_page(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> StoreConfig {
        StoreConfig {
            name: "TIA Store-A".to_string(),
            url: "https://tiastore-a.myshopify.com".to_string(),
            storefront_access_token: "token".to_string(),
        }
    }

    fn client() -> ShopifyClient {
        ShopifyClient::new(test_store(), Client::new())
    }

    fn node(json: serde_json::Value) -> ProductNode {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_query_requests_fixed_page_size() {
        assert!(PRODUCT_LIST_QUERY.contains(&format!("first: {}", PAGE_SIZE)));
    }

    #[test]
    fn test_normalize_complete_record() {
        let snapshot = normalize_node(
            &test_store(),
            node(serde_json::json!({
                "title": "Iphone 16",
                "handle": "iphone-16",
                "onlineStoreUrl": "https://tiastore-a.myshopify.com/products/iphone-16",
                "variants": {"edges": [{"node": {"price": {"amount": "799.00", "currencyCode": "USD"}}}]}
            })),
        )
        .unwrap();

        assert_eq!(snapshot.title, "Iphone 16");
        assert_eq!(snapshot.price, 799.0);
        assert_eq!(snapshot.currency, "USD");
        assert_eq!(snapshot.source, "TIA Store-A");
    }

    #[test]
    fn test_normalize_rebuilds_url_from_handle() {
        let snapshot = normalize_node(
            &test_store(),
            node(serde_json::json!({
                "title": "Iphone 16",
                "handle": "iphone-16",
                "onlineStoreUrl": null,
                "variants": {"edges": [{"node": {"price": {"amount": "799.00", "currencyCode": "USD"}}}]}
            })),
        )
        .unwrap();

        assert_eq!(
            snapshot.product_url,
            "https://tiastore-a.myshopify.com/products/iphone-16"
        );
    }

    #[test]
    fn test_normalize_drops_record_without_price() {
        let result = normalize_node(
            &test_store(),
            node(serde_json::json!({
                "title": "No price",
                "handle": "no-price",
                "onlineStoreUrl": null,
                "variants": {"edges": []}
            })),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_normalize_drops_record_without_title() {
        let result = normalize_node(
            &test_store(),
            node(serde_json::json!({
                "title": null,
                "handle": "mystery",
                "onlineStoreUrl": null,
                "variants": {"edges": [{"node": {"price": {"amount": "5.00", "currencyCode": "USD"}}}]}
            })),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_normalize_drops_record_without_identity() {
        let result = normalize_node(
            &test_store(),
            node(serde_json::json!({
                "title": "Orphan",
                "handle": null,
                "onlineStoreUrl": null,
                "variants": {"edges": [{"node": {"price": {"amount": "5.00", "currencyCode": "USD"}}}]}
            })),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_normalize_drops_unparseable_amount() {
        let result = normalize_node(
            &test_store(),
            node(serde_json::json!({
                "title": "Bad amount",
                "handle": "bad-amount",
                "onlineStoreUrl": null,
                "variants": {"edges": [{"node": {"price": {"amount": "not-a-number", "currencyCode": "USD"}}}]}
            })),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_parse_page_reports_graphql_errors_as_protocol() {
        let response: GraphqlResponse = serde_json::from_value(serde_json::json!({
            "errors": [{"message": "Invalid access token"}]
        }))
        .unwrap();

        let result = client().parse_page(response);
        assert!(matches!(result, Err(SourceError::Protocol(_))));
    }

    #[test]
    fn test_parse_page_extracts_cursor_only_when_more_pages() {
        let response: GraphqlResponse = serde_json::from_value(serde_json::json!({
            "data": {"products": {
                "pageInfo": {"hasNextPage": true, "endCursor": "abc123"},
                "edges": []
            }}
        }))
        .unwrap();
        let page = client().parse_page(response).unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("abc123"));

        let response: GraphqlResponse = serde_json::from_value(serde_json::json!({
            "data": {"products": {
                "pageInfo": {"hasNextPage": false, "endCursor": "abc123"},
                "edges": []
            }}
        }))
        .unwrap();
        let page = client().parse_page(response).unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_parse_page_drops_incomplete_records_keeps_rest() {
        let response: GraphqlResponse = serde_json::from_value(serde_json::json!({
            "data": {"products": {
                "pageInfo": {"hasNextPage": false, "endCursor": null},
                "edges": [
                    {"node": {
                        "title": "Good",
                        "handle": "good",
                        "onlineStoreUrl": null,
                        "variants": {"edges": [{"node": {"price": {"amount": "10.00", "currencyCode": "USD"}}}]}
                    }},
                    {"node": {
                        "title": "No price",
                        "handle": "no-price",
                        "onlineStoreUrl": null,
                        "variants": {"edges": []}
                    }}
                ]
            }}
        }))
        .unwrap();

        let page = client().parse_page(response).unwrap();
        assert_eq!(page.snapshots.len(), 1);
        assert_eq!(page.snapshots[0].title, "Good");
    }
}
