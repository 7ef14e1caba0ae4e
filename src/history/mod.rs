// Historical rate store
use crate::error::{RatesError, Result};
use crate::models::{Ledger, PercentageChange, RateRecord};
use crate::observe::FailureSink;
use chrono::{DateTime, Utc};
use log::info;
use std::sync::{Arc, Mutex};

pub mod ledger;

pub use ledger::{FileLedger, LedgerBackend, MemoryLedger};

/// Date-keyed ledger of official rates.
///
/// Every write is a whole-ledger load, modify, store cycle. Writes from this
/// store are serialised by an internal lock; several stores (or processes)
/// sharing one backend can still lose updates.
pub struct RateStore {
    backend: Arc<dyn LedgerBackend>,
    sink: Arc<dyn FailureSink>,
    write_lock: Mutex<()>,
}

impl RateStore {
    pub fn new(backend: Arc<dyn LedgerBackend>, sink: Arc<dyn FailureSink>) -> Self {
        Self {
            backend,
            sink,
            write_lock: Mutex::new(()),
        }
    }

    /// Reads the ledger; an unreadable or corrupt document reads as empty.
    fn load(&self) -> Ledger {
        let ledger = self.backend.load().unwrap_or_else(|e| {
            self.sink.on_failure("load ledger", &e);
            Ledger::new()
        });

        let undated: Vec<&str> = ledger
            .iter()
            .filter(|(_, record)| !record.has_timestamp())
            .map(|(date, _)| date.as_str())
            .collect();
        if !undated.is_empty() {
            self.sink.on_failure(
                "load ledger",
                &RatesError::DataIntegrity(format!(
                    "no readable timestamp for {}",
                    undated.join(", ")
                )),
            );
        }
        ledger
    }

    /// Writes or overwrites the record for `date_key`, stamped now.
    pub fn upsert(&self, date_key: &str, usd: &str, eur: &str) -> Result<()> {
        self.upsert_at(date_key, usd, eur, Utc::now())
    }

    pub fn upsert_at(
        &self,
        date_key: &str,
        usd: &str,
        eur: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut ledger = self.load();
        ledger.insert(
            date_key.to_string(),
            RateRecord {
                usd: usd.to_string(),
                eur: eur.to_string(),
                recorded_at,
            },
        );

        if let Err(e) = self.backend.store(&ledger) {
            self.sink.on_failure("store ledger", &e);
            return Err(e);
        }
        info!("Rate saved to history: {}", date_key);
        Ok(())
    }

    pub fn get_all(&self) -> Ledger {
        self.load()
    }

    pub fn get_by_date(&self, date_key: &str) -> Result<RateRecord> {
        self.load()
            .remove(date_key)
            .ok_or_else(|| RatesError::NotFound(format!("no rate recorded for {}", date_key)))
    }

    /// Entries sorted by `recorded_at`, newest first. Ties keep date-key order.
    fn by_recency(&self) -> Vec<(String, RateRecord)> {
        let mut entries: Vec<(String, RateRecord)> = self.load().into_iter().collect();
        entries.sort_by(|a, b| b.1.recorded_at.cmp(&a.1.recorded_at));
        entries
    }

    pub fn list_dates_by_recency(&self) -> Vec<String> {
        self.by_recency().into_iter().map(|(date, _)| date).collect()
    }

    pub fn get_latest(&self) -> Result<(String, RateRecord)> {
        self.by_recency().into_iter().next().ok_or(RatesError::Empty)
    }

    /// USD change between the two most recently recorded entries.
    pub fn get_usd_change(&self) -> Result<PercentageChange> {
        let mut entries = self.by_recency().into_iter();
        let (latest_date, latest) = entries.next().ok_or(RatesError::Empty)?;
        let (previous_date, previous) = entries.next().ok_or_else(|| {
            RatesError::Unavailable("at least two recorded rates are needed".to_string())
        })?;

        PercentageChange::between(
            (previous_date.as_str(), &previous),
            (latest_date.as_str(), &latest),
        )
    }
}
