// Official BCV rates handed over by the page extractor
use crate::error::{RatesError, Result};
use crate::history::RateStore;
use serde::{Deserialize, Serialize};

/// Fields extracted from the central-bank page. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialRates {
    #[serde(rename = "USD", default, skip_serializing_if = "Option::is_none")]
    pub usd: Option<String>,
    #[serde(rename = "EUR", default, skip_serializing_if = "Option::is_none")]
    pub eur: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl OfficialRates {
    /// Trims the rates and collapses runs of whitespace in the date. Empty fields become `None`.
    pub fn normalized(self) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            usd: clean(self.usd),
            eur: clean(self.eur),
            date: self
                .date
                .map(|d| d.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|d| !d.is_empty()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.usd.is_some() && self.eur.is_some() && self.date.is_some()
    }

    /// Upserts the rates when all three fields are present; rate strings are stored unchanged.
    pub fn record_into(&self, store: &RateStore) -> Result<()> {
        match (&self.date, &self.usd, &self.eur) {
            (Some(date), Some(usd), Some(eur)) => store.upsert(date, usd, eur),
            _ => Err(RatesError::DataIntegrity(
                "official rates need USD, EUR and date".to_string(),
            )),
        }
    }
}
