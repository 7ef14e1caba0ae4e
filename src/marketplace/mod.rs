// ListingSource trait, sampler
use crate::config::SamplingConfig;
use crate::error::{RatesError, Result};
use crate::models::{
    average_price, decimal_field, decimal_from_f64, AggregateQuote, BestOffer, PriceSample,
};
use crate::observe::FailureSink;
use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub mod binance_p2p;

/// Listings requested per page while sampling.
pub const PAGE_SIZE: u32 = 20;

/// Hard ceiling on pages walked by one aggregation.
pub const MAX_PAGES: u32 = 100;

/// Most prices one aggregation can ever admit.
pub const MAX_SAMPLES: usize = MAX_PAGES as usize * PAGE_SIZE as usize;

/// Rows requested by the single-best-offer lookup.
pub const BEST_OFFER_ROWS: u32 = 10;

/// One page request against the marketplace search endpoint.
///
/// Serialises directly to the upstream request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    pub asset: String,
    pub fiat: String,
    pub page: u32,
    pub rows: u32,
    /// Always `BUY`: the merchant sells the asset, the caller buys.
    pub trade_type: String,
    pub merchant_check: bool,
    pub pay_types: Vec<String>,
    pub publisher_type: Option<String>,
}

impl ListingQuery {
    pub fn buy(asset: &str, fiat: &str, page: u32, rows: u32) -> Self {
        Self {
            asset: asset.to_string(),
            fiat: fiat.to_string(),
            page,
            rows: rows.min(PAGE_SIZE),
            trade_type: "BUY".to_string(),
            merchant_check: false,
            pay_types: Vec::new(),
            publisher_type: None,
        }
    }
}

/// The listings of one successful page, still unvalidated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub listings: Vec<Value>,
}

/// The ListingSource trait is the seam between the sampler and the marketplace.
///
/// Implementations return `Network` for transport failures and timeouts and
/// `Upstream` for non-success payloads. They never retry.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Human-readable marketplace name, reported as the quote source
    fn name(&self) -> &'static str;

    /// Fetches one page of BUY listings
    async fn fetch_page(&self, query: &ListingQuery) -> Result<ListingPage>;
}

/// Parameters of one aggregation call.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRequest {
    pub asset: String,
    pub fiat: String,
    pub target_sample_size: usize,
    pub min_monthly_trades: u64,
    pub min_completion_rate_pct: Decimal,
    /// Payment-method filter; empty means all methods.
    pub pay_types: Vec<String>,
    pub merchant_check: bool,
}

impl TryFrom<&SamplingConfig> for SampleRequest {
    type Error = RatesError;

    fn try_from(config: &SamplingConfig) -> Result<Self> {
        Ok(Self {
            asset: config.asset.clone(),
            fiat: config.fiat.clone(),
            target_sample_size: config.target_sample_size,
            min_monthly_trades: config.min_monthly_trades,
            min_completion_rate_pct: decimal_from_f64(config.min_completion_rate_pct)?,
            pay_types: config.pay_types.clone(),
            merchant_check: config.merchant_check,
        })
    }
}

impl SampleRequest {
    fn query_for(&self, page: u32) -> ListingQuery {
        let mut query = ListingQuery::buy(&self.asset, &self.fiat, page, PAGE_SIZE);
        query.merchant_check = self.merchant_check;
        query.pay_types = self.pay_types.clone();
        query
    }
}

/// Bounded collection of admitted prices.
#[derive(Debug, Clone)]
pub struct PriceAccumulator {
    target: usize,
    min_monthly_trades: u64,
    min_completion_rate_pct: Decimal,
    prices: Vec<Decimal>,
}

impl PriceAccumulator {
    pub fn new(request: &SampleRequest) -> Self {
        Self {
            target: request.target_sample_size,
            min_monthly_trades: request.min_monthly_trades,
            min_completion_rate_pct: request.min_completion_rate_pct,
            prices: Vec::with_capacity(request.target_sample_size.min(MAX_SAMPLES)),
        }
    }

    /// Admits the sample when it qualifies and there is room. Returns whether it was admitted.
    pub fn offer(&mut self, sample: &PriceSample) -> bool {
        if self.is_full() || !sample.qualifies(self.min_monthly_trades, self.min_completion_rate_pct)
        {
            return false;
        }
        self.prices.push(sample.price);
        true
    }

    pub fn is_full(&self) -> bool {
        self.prices.len() >= self.target
    }

    pub fn prices(&self) -> &[Decimal] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Turns a paginated listing feed into a single quote.
pub struct Sampler {
    source: Arc<dyn ListingSource>,
    sink: Arc<dyn FailureSink>,
}

impl Sampler {
    pub fn new(source: Arc<dyn ListingSource>, sink: Arc<dyn FailureSink>) -> Self {
        Self { source, sink }
    }

    /// Averages qualifying listing prices, truncated to 3 decimals.
    ///
    /// Pages are requested strictly one after another. Sampling stops when the
    /// target size is reached, a page comes back empty, or [`MAX_PAGES`] pages
    /// were requested. Any transport or upstream failure aborts the whole call
    /// with `Unavailable`; there is no partial result.
    pub async fn aggregate(&self, request: &SampleRequest) -> Result<AggregateQuote> {
        if request.target_sample_size == 0 {
            return Err(RatesError::Unavailable(
                "target sample size is zero".to_string(),
            ));
        }

        let accumulator = match self.collect(request).await {
            Ok(accumulator) => accumulator,
            Err(e) => {
                self.sink.on_failure("aggregate", &e);
                return Err(RatesError::Unavailable(format!(
                    "{} {}/{} aggregation aborted: {}",
                    self.source.name(),
                    request.asset,
                    request.fiat,
                    e
                )));
            }
        };

        if accumulator.is_empty() {
            return Err(RatesError::Unavailable(format!(
                "no qualifying {}/{} listings on {}",
                request.asset,
                request.fiat,
                self.source.name()
            )));
        }

        let average = average_price(accumulator.prices()).ok_or_else(|| {
            let e = RatesError::DataIntegrity(format!(
                "sum of {} admitted prices overflows",
                accumulator.len()
            ));
            self.sink.on_failure("aggregate", &e);
            RatesError::Unavailable(e.to_string())
        })?;

        Ok(AggregateQuote {
            asset: request.asset.clone(),
            fiat: request.fiat.clone(),
            average_price: average,
            sample_count: accumulator.len(),
            source: self.source.name().to_string(),
        })
    }

    async fn collect(&self, request: &SampleRequest) -> Result<PriceAccumulator> {
        let mut accumulator = PriceAccumulator::new(request);

        for page in 1..=MAX_PAGES {
            let listing_page = self.source.fetch_page(&request.query_for(page)).await?;
            if listing_page.listings.is_empty() {
                debug!("page {} empty, stopping", page);
                break;
            }

            for listing in &listing_page.listings {
                match PriceSample::from_listing(listing) {
                    Ok(sample) => {
                        accumulator.offer(&sample);
                    }
                    Err(e) => debug!("skipping listing on page {}: {}", page, e),
                }
                if accumulator.is_full() {
                    break;
                }
            }

            debug!(
                "page {}: {}/{} samples",
                page,
                accumulator.len(),
                request.target_sample_size
            );
            if accumulator.is_full() {
                break;
            }
        }

        Ok(accumulator)
    }

    /// Runs independent aggregations concurrently. Each keeps its own sequential page chain.
    pub async fn aggregate_many(&self, requests: &[SampleRequest]) -> Vec<Result<AggregateQuote>> {
        futures::future::join_all(requests.iter().map(|request| self.aggregate(request))).await
    }

    /// Price of the first listing on page 1, without trust filtering.
    pub async fn best_offer(
        &self,
        asset: &str,
        fiat: &str,
        pay_types: &[String],
        merchant_check: bool,
    ) -> Result<BestOffer> {
        let mut query = ListingQuery::buy(asset, fiat, 1, BEST_OFFER_ROWS);
        query.merchant_check = merchant_check;
        query.pay_types = pay_types.to_vec();

        let page = match self.source.fetch_page(&query).await {
            Ok(page) => page,
            Err(e) => {
                self.sink.on_failure("best_offer", &e);
                return Err(RatesError::Unavailable(format!(
                    "{} {}/{} best offer failed: {}",
                    self.source.name(),
                    asset,
                    fiat,
                    e
                )));
            }
        };

        let first = page.listings.first().ok_or_else(|| {
            RatesError::Unavailable(format!("no {}/{} listings on {}", asset, fiat, self.source.name()))
        })?;

        let price = first
            .get("adv")
            .ok_or_else(|| RatesError::DataIntegrity("best offer has no adv".to_string()))
            .and_then(|adv| decimal_field(adv, &["price"]))
            .and_then(|price| {
                if price > Decimal::ZERO {
                    Ok(price)
                } else {
                    Err(RatesError::DataIntegrity(format!(
                        "non-positive price {}",
                        price
                    )))
                }
            })
            .map_err(|e| {
                self.sink.on_failure("best_offer", &e);
                RatesError::Unavailable(format!("best offer has no usable price: {}", e))
            })?;

        Ok(BestOffer {
            asset: asset.to_string(),
            fiat: fiat.to_string(),
            price,
            source: self.source.name().to_string(),
        })
    }
}
