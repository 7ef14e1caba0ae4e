use crate::marketplace::binance_p2p::BINANCE_P2P_SEARCH_URL;
use config::{Config, ConfigError, Environment, File};
use lazy_static::lazy_static;
use log::warn;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::RwLock;

// Initialize global configuration for the binary
lazy_static! {
    pub static ref SETTINGS: RwLock<Settings> = RwLock::new(Settings::load());
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceConfig {
    pub search_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    pub asset: String,
    pub fiat: String,
    pub target_sample_size: usize,
    pub min_monthly_trades: u64,
    pub min_completion_rate_pct: f64,
    pub pay_types: Vec<String>,
    /// Merchant-verification flag sent with the averaging search.
    pub merchant_check: bool,
    /// Merchant-verification flag sent with the single-best-offer search.
    pub best_offer_merchant_check: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: Server,
    pub marketplace: MarketplaceConfig,
    pub sampling: SamplingConfig,
    pub history: HistoryConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: Server {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            marketplace: MarketplaceConfig {
                search_url: BINANCE_P2P_SEARCH_URL.to_string(),
                request_timeout_secs: 10,
                user_agent: "ves_rates/0.1".to_string(),
            },
            sampling: SamplingConfig {
                asset: "USDT".to_string(),
                fiat: "VES".to_string(),
                target_sample_size: 20,
                min_monthly_trades: 100,
                min_completion_rate_pct: 95.0,
                pay_types: Vec::new(),
                merchant_check: true,
                best_offer_merchant_check: false,
            },
            history: HistoryConfig {
                path: PathBuf::from("rates_history.json"),
            },
        }
    }
}

impl Settings {
    /// Layers the optional `config` file and `VES_RATES__*` variables over the defaults.
    pub fn new() -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("marketplace.search_url", defaults.marketplace.search_url)?
            .set_default(
                "marketplace.request_timeout_secs",
                defaults.marketplace.request_timeout_secs as i64,
            )?
            .set_default("marketplace.user_agent", defaults.marketplace.user_agent)?
            .set_default("sampling.asset", defaults.sampling.asset)?
            .set_default("sampling.fiat", defaults.sampling.fiat)?
            .set_default(
                "sampling.target_sample_size",
                defaults.sampling.target_sample_size as i64,
            )?
            .set_default(
                "sampling.min_monthly_trades",
                defaults.sampling.min_monthly_trades as i64,
            )?
            .set_default(
                "sampling.min_completion_rate_pct",
                defaults.sampling.min_completion_rate_pct,
            )?
            .set_default("sampling.pay_types", Vec::<String>::new())?
            .set_default("sampling.merchant_check", defaults.sampling.merchant_check)?
            .set_default(
                "sampling.best_offer_merchant_check",
                defaults.sampling.best_offer_merchant_check,
            )?
            .set_default(
                "history.path",
                defaults.history.path.to_string_lossy().into_owned(),
            )?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("VES_RATES").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Like [`Settings::new`], falling back to the defaults when loading fails.
    pub fn load() -> Self {
        Settings::new().unwrap_or_else(|err| {
            warn!(
                "Could not load configuration: {}, using default values",
                err
            );
            Settings::default()
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
