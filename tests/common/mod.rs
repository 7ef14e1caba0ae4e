#![allow(dead_code)]

use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Mutex;
use ves_rates::{FailureSink, RatesError, SampleRequest};

/// A BUY listing as the marketplace returns it.
pub fn listing(price: &str, month_orders: u64, month_finish_rate: f64) -> Value {
    json!({
        "adv": { "price": price, "asset": "USDT", "fiatUnit": "VES" },
        "advertiser": {
            "nickName": "merchant",
            "monthOrderCount": month_orders,
            "monthFinishRate": month_finish_rate,
        },
    })
}

pub fn page_body(listings: Vec<Value>) -> Value {
    json!({
        "code": "000000",
        "message": null,
        "success": true,
        "data": listings,
    })
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn request(target: usize, min_trades: u64, min_completion: &str) -> SampleRequest {
    SampleRequest {
        asset: "USDT".to_string(),
        fiat: "VES".to_string(),
        target_sample_size: target,
        min_monthly_trades: min_trades,
        min_completion_rate_pct: dec(min_completion),
        pay_types: Vec::new(),
        merchant_check: true,
    }
}

/// Sink that remembers every reported failure.
#[derive(Default)]
pub struct RecordingSink {
    pub failures: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }

    pub fn operations(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.split(':').next().unwrap_or_default().to_string())
            .collect()
    }
}

impl FailureSink for RecordingSink {
    fn on_failure(&self, operation: &str, error: &RatesError) {
        self.failures
            .lock()
            .unwrap()
            .push(format!("{}: {}", operation, error));
    }
}

/// Compares a JSON number against an expected float.
pub fn assert_json_close(actual: &Value, expected: f64) {
    let actual = actual
        .as_f64()
        .unwrap_or_else(|| panic!("expected a number, got {}", actual));
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
