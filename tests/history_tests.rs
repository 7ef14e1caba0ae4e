mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{assert_json_close, dec, RecordingSink};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use ves_rates::{Direction, FileLedger, MemoryLedger, OfficialRates, RateStore, RatesError};

fn memory_store() -> RateStore {
    RateStore::new(Arc::new(MemoryLedger::new()), Arc::new(RecordingSink::default()))
}

fn at(offset_minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 30, 9, 0, 0).unwrap() + Duration::minutes(offset_minutes)
}

#[test]
fn test_read_your_write() {
    let store = memory_store();
    store.upsert("D1", "36,50", "39,75").unwrap();

    let record = store.get_by_date("D1").unwrap();
    assert_eq!(record.usd, "36,50");
    assert_eq!(record.eur, "39,75");
    assert!(record.recorded_at <= Utc::now());
}

#[test]
fn test_upsert_overwrites_same_date() {
    let store = memory_store();
    store.upsert_at("Lunes, 30 Diciembre 2025", "36,50", "39,75", at(0)).unwrap();
    store.upsert_at("Lunes, 30 Diciembre 2025", "36,90", "40,10", at(5)).unwrap();

    let all = store.get_all();
    assert_eq!(all.len(), 1);
    let record = &all["Lunes, 30 Diciembre 2025"];
    assert_eq!(record.usd, "36,90");
    assert_eq!(record.eur, "40,10");
    assert_eq!(record.recorded_at, at(5));
}

#[test]
fn test_unknown_date_is_not_found() {
    let store = memory_store();
    store.upsert("D1", "36,50", "39,75").unwrap();

    assert!(matches!(store.get_by_date("D2"), Err(RatesError::NotFound(_))));
}

#[test]
fn test_recency_follows_timestamps_not_insertion_order() {
    let store = memory_store();
    store.upsert_at("Miércoles, 1 Enero 2026", "37,00", "40,00", at(20)).unwrap();
    store.upsert_at("Lunes, 30 Diciembre 2025", "36,00", "39,00", at(0)).unwrap();
    store.upsert_at("Martes, 31 Diciembre 2025", "36,50", "39,50", at(10)).unwrap();

    assert_eq!(
        store.list_dates_by_recency(),
        vec![
            "Miércoles, 1 Enero 2026".to_string(),
            "Martes, 31 Diciembre 2025".to_string(),
            "Lunes, 30 Diciembre 2025".to_string(),
        ]
    );

    let (date, record) = store.get_latest().unwrap();
    assert_eq!(date, "Miércoles, 1 Enero 2026");
    assert_eq!(record.usd, "37,00");
}

#[test]
fn test_recency_ignores_date_key_contents() {
    let store = memory_store();
    // Lexically and calendar-wise "older" key recorded last
    store.upsert_at("Viernes, 2 Enero 2026", "37,00", "40,00", at(0)).unwrap();
    store.upsert_at("Jueves, 1 Enero 2026", "36,00", "39,00", at(1)).unwrap();

    assert_eq!(store.get_latest().unwrap().0, "Jueves, 1 Enero 2026");
}

#[test]
fn test_equal_timestamps_keep_a_stable_order() {
    let store = memory_store();
    store.upsert_at("B", "1,00", "1,00", at(0)).unwrap();
    store.upsert_at("A", "1,00", "1,00", at(0)).unwrap();
    store.upsert_at("C", "1,00", "1,00", at(0)).unwrap();

    let first = store.list_dates_by_recency();
    assert_eq!(first, store.list_dates_by_recency());
    assert_eq!(first, vec!["A", "B", "C"]);
}

#[test]
fn test_latest_on_empty_history() {
    let store = memory_store();
    assert!(matches!(store.get_latest(), Err(RatesError::Empty)));
    assert!(store.list_dates_by_recency().is_empty());
}

#[test]
fn test_usd_change_increase() {
    let store = memory_store();
    // Inserted newest first on purpose
    store.upsert_at("B", "37,00", "40,00", at(10)).unwrap();
    store.upsert_at("A", "36,00", "39,00", at(0)).unwrap();

    let change = store.get_usd_change().unwrap();
    assert_eq!(change.percentage_change, dec("2.777"));
    assert_eq!(change.direction, Direction::Increase);
    assert_eq!(change.latest_date, "B");
    assert_eq!(change.previous_date, "A");

    let json = serde_json::to_value(&change).unwrap();
    assert_eq!(json["direction"], "increase");
    assert_json_close(&json["percentage_change"], 2.777);
}

#[test]
fn test_usd_change_decrease_truncates_toward_zero() {
    let store = memory_store();
    store.upsert_at("A", "37,00", "40,00", at(0)).unwrap();
    store.upsert_at("B", "36,00", "39,00", at(10)).unwrap();

    // -2.7027... rounds to -2.703 but truncates to -2.702
    let change = store.get_usd_change().unwrap();
    assert_eq!(change.percentage_change, dec("-2.702"));
    assert_eq!(change.direction, Direction::Decrease);
}

#[test]
fn test_usd_change_no_change() {
    let store = memory_store();
    store.upsert_at("A", "36,50", "39,00", at(0)).unwrap();
    store.upsert_at("B", "36,50", "39,90", at(10)).unwrap();

    let change = store.get_usd_change().unwrap();
    assert!(change.percentage_change.is_zero());
    assert_eq!(change.direction, Direction::NoChange);
    assert_eq!(serde_json::to_value(change.direction).unwrap(), "no-change");
}

#[test]
fn test_usd_change_uses_only_two_newest_records() {
    let store = memory_store();
    store.upsert_at("A", "10,00", "10,00", at(0)).unwrap();
    store.upsert_at("B", "50,00", "50,00", at(10)).unwrap();
    store.upsert_at("C", "55,00", "55,00", at(20)).unwrap();

    let change = store.get_usd_change().unwrap();
    assert_eq!(change.percentage_change, dec("10"));
    assert_eq!(change.previous_date, "B");
}

#[test]
fn test_usd_change_needs_two_records() {
    let store = memory_store();
    assert!(matches!(store.get_usd_change(), Err(RatesError::Empty)));

    store.upsert("A", "36,00", "39,00").unwrap();
    assert!(matches!(
        store.get_usd_change(),
        Err(RatesError::Unavailable(_))
    ));
}

#[test]
fn test_usd_change_guards_zero_baseline() {
    let store = memory_store();
    store.upsert_at("A", "0,00", "39,00", at(0)).unwrap();
    store.upsert_at("B", "36,00", "39,00", at(10)).unwrap();

    assert!(matches!(
        store.get_usd_change(),
        Err(RatesError::DivisionGuard(_))
    ));
}

#[test]
fn test_usd_change_rejects_unparsable_rate() {
    let store = memory_store();
    store.upsert_at("A", "n/d", "39,00", at(0)).unwrap();
    store.upsert_at("B", "36,00", "39,00", at(10)).unwrap();

    assert!(matches!(
        store.get_usd_change(),
        Err(RatesError::DataIntegrity(_))
    ));
}

#[test]
fn test_file_ledger_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rates_history.json");

    {
        let store = RateStore::new(
            Arc::new(FileLedger::new(&path)),
            Arc::new(RecordingSink::default()),
        );
        store.upsert_at("Lunes, 30 Diciembre 2025", "301,37", "353,11", at(0)).unwrap();
        store.upsert_at("Martes, 31 Diciembre 2025", "303,08", "355,02", at(10)).unwrap();
    }

    let reopened = RateStore::new(
        Arc::new(FileLedger::new(&path)),
        Arc::new(RecordingSink::default()),
    );
    assert_eq!(reopened.get_all().len(), 2);
    assert_eq!(
        reopened.get_latest().unwrap().0,
        "Martes, 31 Diciembre 2025"
    );
    assert!(!dir.path().join("rates_history.json.tmp").exists());
}

#[test]
fn test_file_ledger_document_shape() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history").join("rates.json");
    let store = RateStore::new(
        Arc::new(FileLedger::new(&path)),
        Arc::new(RecordingSink::default()),
    );
    store.upsert_at("Lunes, 30 Diciembre 2025", "36,50", "39,75", at(0)).unwrap();

    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let entry = &document["Lunes, 30 Diciembre 2025"];
    assert_eq!(entry["USD"], "36,50");
    assert_eq!(entry["EUR"], "39,75");
    let stamp = entry["timestamp"].as_str().unwrap();
    assert_eq!(
        DateTime::parse_from_rfc3339(stamp).unwrap().with_timezone(&Utc),
        at(0)
    );
}

#[test]
fn test_corrupt_document_reads_as_empty_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rates_history.json");
    fs::write(&path, "{ not json").unwrap();

    let sink = Arc::new(RecordingSink::default());
    let store = RateStore::new(Arc::new(FileLedger::new(&path)), sink.clone());

    assert!(store.get_all().is_empty());
    assert!(matches!(store.get_latest(), Err(RatesError::Empty)));
    assert!(sink.count() >= 1);
    assert!(sink.operations().iter().all(|op| op == "load ledger"));

    // The next write starts a fresh ledger
    store.upsert("D1", "36,50", "39,75").unwrap();
    assert_eq!(store.get_all().len(), 1);
}

#[test]
fn test_reads_naive_timestamps_from_older_documents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rates_history.json");
    fs::write(
        &path,
        r#"{
  "Lunes, 29 Diciembre 2025": {"USD": "36,00", "EUR": "39,00", "timestamp": "2025-12-29T08:15:02.123456"},
  "Martes, 30 Diciembre 2025": {"USD": "37,00", "EUR": "40,00", "timestamp": "2025-12-30T08:15:02.654321"}
}"#,
    )
    .unwrap();

    let store = RateStore::new(
        Arc::new(FileLedger::new(&path)),
        Arc::new(RecordingSink::default()),
    );
    let change = store.get_usd_change().unwrap();
    assert_eq!(change.latest_date, "Martes, 30 Diciembre 2025");
    assert_eq!(change.percentage_change, dec("2.777"));
}

#[test]
fn test_official_rates_recorded_only_when_complete() {
    let store = memory_store();

    let partial = OfficialRates {
        usd: Some("36,50".to_string()),
        eur: None,
        date: Some("Lunes, 30 Diciembre 2025".to_string()),
    };
    assert!(matches!(
        partial.record_into(&store),
        Err(RatesError::DataIntegrity(_))
    ));
    assert!(store.get_all().is_empty());

    let scraped = OfficialRates {
        usd: Some("  36,50780000 ".to_string()),
        eur: Some("39,75120000".to_string()),
        date: Some(" Fecha Valor:\n   Lunes,  30 Diciembre  2025 ".to_string()),
    }
    .normalized();
    assert!(scraped.is_complete());
    scraped.record_into(&store).unwrap();

    let record = store.get_by_date("Fecha Valor: Lunes, 30 Diciembre 2025").unwrap();
    assert_eq!(record.usd, "36,50780000");
    assert_eq!(record.eur, "39,75120000");
}

#[test]
fn test_unreadable_timestamp_keeps_the_rest_of_the_ledger() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rates_history.json");
    fs::write(
        &path,
        r#"{
  "D1": {"USD": "36,00", "EUR": "39,00", "timestamp": "2025-12-29T08:15:02.123456"},
  "D2": {"USD": "37,00", "EUR": "40,00", "timestamp": "2025-12-30T08:15:02+00:00"},
  "D3": {"USD": "35,00", "EUR": "38,00", "timestamp": null},
  "D4": {"USD": "35,50", "EUR": "38,50", "timestamp": "ayer"}
}"#,
    )
    .unwrap();

    let sink = Arc::new(RecordingSink::default());
    let store = RateStore::new(Arc::new(FileLedger::new(&path)), sink.clone());

    assert_eq!(store.get_all().len(), 4);
    assert_eq!(store.list_dates_by_recency(), vec!["D2", "D1", "D3", "D4"]);
    assert!(sink.operations().iter().all(|op| op == "load ledger"));
    assert!(sink.count() >= 1);

    store.upsert_at("D5", "38,00", "41,00", at(0)).unwrap();

    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let keys: Vec<&String> = document.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["D1", "D2", "D3", "D4", "D5"]);
    assert_eq!(store.get_latest().unwrap().0, "D5");
}
