// REST client for the Binance P2P advertisement search

use crate::config::MarketplaceConfig;
use crate::error::{RatesError, Result};
use crate::marketplace::{ListingPage, ListingQuery, ListingSource};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const BINANCE_P2P_SEARCH_URL: &str =
    "https://p2p.binance.com/bapi/c2c/v2/friendly/c2c/adv/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<Value>>,
}

pub struct BinanceP2pClient {
    client: reqwest::Client,
    search_url: String,
}

impl BinanceP2pClient {
    pub fn new(config: &MarketplaceConfig) -> Result<Self> {
        // Every request carries its own timeout
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                RatesError::Upstream(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
        })
    }
}

#[async_trait]
impl ListingSource for BinanceP2pClient {
    fn name(&self) -> &'static str {
        "Binance P2P"
    }

    async fn fetch_page(&self, query: &ListingQuery) -> Result<ListingPage> {
        debug!(
            "requesting {}/{} page {} ({} rows)",
            query.asset, query.fiat, query.page, query.rows
        );

        let response = self
            .client
            .post(&self.search_url)
            .json(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RatesError::Upstream(format!(
                "Binance P2P returned HTTP {}",
                status
            )));
        }

        let body = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&body).map_err(|e| {
            RatesError::Upstream(format!("Binance P2P returned an undecodable body: {}", e))
        })?;

        if !parsed.success {
            return Err(RatesError::Upstream(format!(
                "Binance P2P search failed: code={:?} message={:?}",
                parsed.code, parsed.message
            )));
        }

        Ok(ListingPage {
            listings: parsed.data.unwrap_or_default(),
        })
    }
}
