//! Venezuelan Bolívar exchange rates
//!
//! This library samples Binance P2P USDT/VES listings into a trust-filtered
//! average quote and keeps a date-keyed ledger of official BCV rates.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod marketplace;
pub mod models;
pub mod observe;
pub mod official;

// Re-export commonly used items
pub use api::start_server;
pub use config::{Settings, SETTINGS};
pub use error::{RatesError, Result};
pub use history::{FileLedger, LedgerBackend, MemoryLedger, RateStore};
pub use marketplace::binance_p2p::BinanceP2pClient;
pub use marketplace::{ListingPage, ListingQuery, ListingSource, SampleRequest, Sampler};
pub use models::{AggregateQuote, BestOffer, Direction, PercentageChange, PriceSample, RateRecord};
pub use observe::{FailureSink, LogSink};
pub use official::OfficialRates;
