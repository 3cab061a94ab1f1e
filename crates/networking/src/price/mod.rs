//! Best-effort USD token prices from DexScreener

use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use swapcycle_core::{Error, Result};
use swapcycle_persistence::PriceCache;
use tracing::{debug, warn};

const DEXSCREENER_BASE: &str = "https://api.dexscreener.com";

#[derive(Debug, Deserialize)]
struct TokensResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
struct Pair {
    #[serde(rename = "priceUsd", default)]
    price_usd: Option<String>,
}

/// Price of the first listed pair, if it has one
fn first_pair_price(body: &str) -> Result<Option<f64>> {
    let response: TokensResponse = serde_json::from_str(body)?;
    Ok(response
        .pairs
        .and_then(|pairs| pairs.into_iter().next())
        .and_then(|pair| pair.price_usd)
        .and_then(|p| p.parse::<f64>().ok()))
}

/// Cached price lookups. Never fails: on error the last known price (or 0) is returned.
pub struct PriceFeed {
    http: Client,
    cache: Arc<PriceCache>,
    base_url: String,
}

impl PriceFeed {
    pub fn new(cache: Arc<PriceCache>) -> Result<Self> {
        Self::with_base_url(cache, DEXSCREENER_BASE)
    }

    pub fn with_base_url(cache: Arc<PriceCache>, base_url: &str) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            cache,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn token_price_usd(&self, token: &str) -> f64 {
        if let Some(price) = self.cache.get(token) {
            return price;
        }

        match self.fetch(token).await {
            Ok(Some(price)) => {
                self.cache.insert(token, price);
                price
            }
            Ok(None) => {
                debug!(token, "No priced pair listed");
                self.cache.get_stale(token).unwrap_or(0.0)
            }
            Err(e) => {
                warn!(token, "Price lookup failed: {}", e);
                self.cache.get_stale(token).unwrap_or(0.0)
            }
        }
    }

    async fn fetch(&self, token: &str) -> Result<Option<f64>> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, token);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::NetworkError(format!(
                "price API returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        first_pair_price(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_pair() {
        let body = r#"{"schemaVersion":"1.0.0","pairs":[{"priceUsd":"0.8123"},{"priceUsd":"9"}]}"#;
        assert_eq!(first_pair_price(body).unwrap(), Some(0.8123));
    }

    #[test]
    fn test_parse_no_pairs() {
        assert_eq!(first_pair_price(r#"{"pairs":null}"#).unwrap(), None);
        assert_eq!(first_pair_price(r#"{"pairs":[{}]}"#).unwrap(), None);
        assert!(first_pair_price("<html>").is_err());
    }

    #[tokio::test]
    async fn test_cached_price_skips_network() {
        let cache = Arc::new(PriceCache::default());
        cache.insert("0xabc", 1.5);
        let feed = PriceFeed::with_base_url(cache, "http://127.0.0.1:1").unwrap();
        assert_eq!(feed.token_price_usd("0xABC").await, 1.5);
    }

    #[tokio::test]
    async fn test_unreachable_api_falls_back_to_zero() {
        let feed =
            PriceFeed::with_base_url(Arc::new(PriceCache::default()), "http://127.0.0.1:1")
                .unwrap();
        assert_eq!(feed.token_price_usd("0xdef").await, 0.0);
    }
}
