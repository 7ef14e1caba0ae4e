// PriceSample, AggregateQuote, RateRecord, PercentageChange
use crate::error::{RatesError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of fractional digits kept on every published figure.
pub const QUOTE_PRECISION: u32 = 3;

/// One marketplace listing reduced to the fields the sampler filters on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub price: Decimal,
    pub merchant_monthly_order_count: u64,
    /// Completion rate scaled to 0-100.
    pub merchant_monthly_completion_rate: Decimal,
}

impl PriceSample {
    /// Validates a raw listing of the shape
    /// `{"advertiser": {"monthOrderCount", "monthFinishRate"}, "adv": {"price"}}`.
    ///
    /// The completion rate arrives as a 0-1 fraction and is scaled by 100.
    /// The `monthlyOrderCount` / `monthlyCompletionRate` spellings are accepted too.
    pub fn from_listing(listing: &Value) -> Result<Self> {
        let advertiser = listing
            .get("advertiser")
            .ok_or_else(|| RatesError::DataIntegrity("listing has no advertiser".to_string()))?;
        let adv = listing
            .get("adv")
            .ok_or_else(|| RatesError::DataIntegrity("listing has no adv".to_string()))?;

        let price = decimal_field(adv, &["price"])?;
        if price <= Decimal::ZERO {
            return Err(RatesError::DataIntegrity(format!(
                "non-positive price {}",
                price
            )));
        }

        let order_count = integer_field(advertiser, &["monthOrderCount", "monthlyOrderCount"])?;

        let completion_fraction =
            decimal_field(advertiser, &["monthFinishRate", "monthlyCompletionRate"])?;
        if completion_fraction < Decimal::ZERO || completion_fraction > Decimal::ONE {
            return Err(RatesError::DataIntegrity(format!(
                "completion rate {} outside 0..1",
                completion_fraction
            )));
        }

        Ok(Self {
            price,
            merchant_monthly_order_count: order_count,
            merchant_monthly_completion_rate: completion_fraction * Decimal::ONE_HUNDRED,
        })
    }

    /// Both thresholds are inclusive.
    pub fn qualifies(&self, min_monthly_trades: u64, min_completion_rate_pct: Decimal) -> bool {
        self.merchant_monthly_order_count >= min_monthly_trades
            && self.merchant_monthly_completion_rate >= min_completion_rate_pct
    }
}

fn lookup<'a>(object: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| object.get(*name))
        .filter(|value| !value.is_null())
}

pub(crate) fn decimal_field(object: &Value, names: &[&str]) -> Result<Decimal> {
    let raw = lookup(object, names)
        .ok_or_else(|| RatesError::DataIntegrity(format!("missing field {}", names[0])))?;

    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(RatesError::DataIntegrity(format!(
                "field {} is not numeric: {}",
                names[0], other
            )))
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| {
            RatesError::DataIntegrity(format!("field {} = {:?}: {}", names[0], text, e))
        })
}

fn integer_field(object: &Value, names: &[&str]) -> Result<u64> {
    let raw = lookup(object, names)
        .ok_or_else(|| RatesError::DataIntegrity(format!("missing field {}", names[0])))?;

    let parsed = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        RatesError::DataIntegrity(format!(
            "field {} is not a non-negative integer: {}",
            names[0], raw
        ))
    })
}

/// Truncates toward zero at [`QUOTE_PRECISION`] digits. Never rounds.
pub fn truncate_to_precision(value: Decimal) -> Decimal {
    let truncated = value.round_dp_with_strategy(QUOTE_PRECISION, RoundingStrategy::ToZero);
    if truncated.is_zero() {
        Decimal::ZERO
    } else {
        truncated
    }
}

/// Truncated arithmetic mean, `None` for an empty slice or a sum past `Decimal::MAX`.
pub fn average_price(prices: &[Decimal]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }
    let sum = prices
        .iter()
        .try_fold(Decimal::ZERO, |acc, price| acc.checked_add(*price))?;
    let mean = sum.checked_div(Decimal::from(prices.len()))?;
    Some(truncate_to_precision(mean))
}

/// Parses a locale-formatted rate such as `"36,50"` or `"36,51780000"`.
pub fn parse_comma_decimal(raw: &str) -> Result<Decimal> {
    let normalized = raw.trim().replace(',', ".");
    Decimal::from_str(&normalized)
        .map_err(|e| RatesError::DataIntegrity(format!("rate {:?}: {}", raw, e)))
}

/// Converts a configured float threshold without binary-float noise (97.99 stays 97.99).
pub fn decimal_from_f64(value: f64) -> Result<Decimal> {
    Decimal::from_str(&value.to_string())
        .or_else(|_| Decimal::from_scientific(&format!("{:e}", value)))
        .map_err(|e| RatesError::DataIntegrity(format!("threshold {}: {}", value, e)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateQuote {
    pub asset: String,
    pub fiat: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_price: Decimal,
    pub sample_count: usize,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestOffer {
    pub asset: String,
    pub fiat: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub source: String,
}

/// A ledger entry. The effective date key is the ledger's map key, not a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    #[serde(rename = "USD")]
    pub usd: String,
    #[serde(rename = "EUR")]
    pub eur: String,
    /// Missing, null or unreadable timestamps read as the Unix epoch and sort oldest.
    #[serde(
        rename = "timestamp",
        with = "iso_timestamp",
        default = "iso_timestamp::missing"
    )]
    pub recorded_at: DateTime<Utc>,
}

impl RateRecord {
    /// False when the stored timestamp was missing or unreadable.
    pub fn has_timestamp(&self) -> bool {
        self.recorded_at != iso_timestamp::missing()
    }
}

/// The whole persisted document: date key -> record.
pub type Ledger = BTreeMap<String, RateRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
    #[serde(rename = "no-change")]
    NoChange,
}

impl Direction {
    pub fn of(change: Decimal) -> Self {
        if change.is_zero() {
            Direction::NoChange
        } else if change.is_sign_negative() {
            Direction::Decrease
        } else {
            Direction::Increase
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageChange {
    #[serde(with = "rust_decimal::serde::float")]
    pub percentage_change: Decimal,
    pub direction: Direction,
    pub latest_date: String,
    pub latest_usd: String,
    pub previous_date: String,
    pub previous_usd: String,
}

impl PercentageChange {
    /// `(latest - previous) / previous * 100`, truncated.
    pub fn between(
        (previous_date, previous): (&str, &RateRecord),
        (latest_date, latest): (&str, &RateRecord),
    ) -> Result<Self> {
        let old = parse_comma_decimal(&previous.usd)?;
        let new = parse_comma_decimal(&latest.usd)?;

        if old.is_zero() {
            return Err(RatesError::DivisionGuard(format!(
                "USD rate for {} is zero",
                previous_date
            )));
        }

        let raw = ((new - old) * Decimal::ONE_HUNDRED)
            .checked_div(old)
            .ok_or_else(|| RatesError::DivisionGuard("change overflows".to_string()))?;
        let percentage_change = truncate_to_precision(raw);

        Ok(Self {
            percentage_change,
            direction: Direction::of(percentage_change),
            latest_date: latest_date.to_string(),
            latest_usd: latest.usd.clone(),
            previous_date: previous_date.to_string(),
            previous_usd: previous.usd.clone(),
        })
    }
}

mod iso_timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    // Older documents carry naive local ISO timestamps without an offset; read those as UTC.
    // Anything else unreadable falls back to the epoch so the rest of the document survives.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().and_then(parse).unwrap_or_else(missing))
    }

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn missing() -> DateTime<Utc> {
        DateTime::<Utc>::from(std::time::UNIX_EPOCH)
    }
}
