//! History merge behaviour against real files in a temp dir

use pretty_assertions::assert_eq;
use std::fs;
use test_log::test;

use crate::common::logging::{init_test_logging, log_test_step};
use crate::common::test_data::{create_test_quote, date, keys};
use nifty_history::history::HistoryStore;
use nifty_history::models::QuoteRecord;

fn store_in(dir: &tempfile::TempDir) -> HistoryStore {
    HistoryStore::new(
        dir.path().join("nifty50_history.csv"),
        dir.path().join("nifty50.json"),
    )
}

#[test]
fn test_fresh_start_writes_todays_table_as_is() {
    init_test_logging();
    log_test_step("Merging into an empty directory");

    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let today = vec![
        create_test_quote("2024-01-02", "NIFTY 50", 21700.0),
        create_test_quote("2024-01-02", "TCS", 3800.0),
        create_test_quote("2024-01-02", "INFY", 1500.0),
    ];

    let history = store.merge_and_save(today.clone()).unwrap();

    assert_eq!(history, today);
    assert_eq!(store.load().unwrap(), Some(today));
}

#[test]
fn test_dedup_keeps_latest_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store
        .merge_and_save(vec![create_test_quote("2024-01-01", "TCS", 100.0)])
        .unwrap();
    let history = store
        .merge_and_save(vec![create_test_quote("2024-01-01", "TCS", 105.0)])
        .unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].last_price, Some(105.0));

    let reloaded = store.load().unwrap().unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].last_price, Some(105.0));
}

#[test]
fn test_rerun_on_same_day_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store
        .merge_and_save(vec![
            create_test_quote("2024-01-01", "TCS", 100.0),
            create_test_quote("2024-01-01", "INFY", 200.0),
        ])
        .unwrap();

    let today = vec![
        create_test_quote("2024-01-02", "TCS", 101.0),
        create_test_quote("2024-01-02", "INFY", 201.0),
    ];

    store.merge_and_save(today.clone()).unwrap();
    let csv_after_first = fs::read_to_string(store.csv_path()).unwrap();
    let json_after_first = fs::read_to_string(store.json_path()).unwrap();

    store.merge_and_save(today).unwrap();
    let csv_after_second = fs::read_to_string(store.csv_path()).unwrap();
    let json_after_second = fs::read_to_string(store.json_path()).unwrap();

    assert_eq!(csv_after_first, csv_after_second);
    assert_eq!(json_after_first, json_after_second);
    assert_eq!(store.load().unwrap().unwrap().len(), 4);
}

#[test]
fn test_non_colliding_rows_keep_their_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store
        .merge_and_save(vec![
            create_test_quote("2024-01-01", "TCS", 1.0),
            create_test_quote("2024-01-01", "INFY", 2.0),
            create_test_quote("2024-01-02", "TCS", 3.0),
        ])
        .unwrap();

    let history = store
        .merge_and_save(vec![
            create_test_quote("2024-01-02", "HDFCBANK", 4.0),
            create_test_quote("2024-01-01", "INFY", 5.0),
        ])
        .unwrap();

    assert_eq!(
        keys(&history),
        vec![
            ("2024-01-01".to_string(), "TCS".to_string()),
            ("2024-01-02".to_string(), "TCS".to_string()),
            ("2024-01-02".to_string(), "HDFCBANK".to_string()),
            ("2024-01-01".to_string(), "INFY".to_string()),
        ]
    );
    assert_eq!(history[3].last_price, Some(5.0));
}

#[test]
fn test_csv_round_trip_keeps_values_and_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let mut sparse = create_test_quote("2024-01-02", "NIFTY 50", 21700.0);
    sparse.volume = None;
    sparse.open = None;
    sparse.company = String::new();

    let written = vec![create_test_quote("2024-01-02", "TCS", 3812.45), sparse];
    store.save(&written).unwrap();

    let csv = fs::read_to_string(store.csv_path()).unwrap();
    assert!(csv.starts_with(
        "Date,Symbol,Company,Open,DayHigh,DayLow,LastPrice,PreviousClose,Change,PChange,Volume\n"
    ));

    assert_eq!(store.load().unwrap(), Some(written));
}

#[test]
fn test_loads_history_with_float_volumes() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    // Layout a dataframe export produces once the volume column has gaps
    fs::write(
        store.csv_path(),
        "Date,Symbol,Company,Open,DayHigh,DayLow,LastPrice,PreviousClose,Change,PChange,Volume\n\
         2024-01-01,NIFTY 50,NIFTY 50,21700.1,21800.0,21650.0,21750.5,21690.0,60.5,0.28,\n\
         2024-01-01,TCS,TCSEQN,3790.0,3820.0,3775.5,3812.45,3785.0,27.45,0.73,2345678.0\n",
    )
    .unwrap();

    let history = store
        .merge_and_save(vec![create_test_quote("2024-01-02", "TCS", 3820.0)])
        .unwrap();

    assert_eq!(history.len(), 3);
    assert_eq!(history[0].volume, None);
    assert_eq!(history[1].volume, Some(2_345_678));
    assert_eq!(history[1].date, date("2024-01-01"));
    assert_eq!(history[2].date, date("2024-01-02"));
}

#[test]
fn test_json_snapshot_mirrors_csv() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store
        .merge_and_save(vec![create_test_quote("2024-01-01", "TCS", 100.0)])
        .unwrap();
    let history = store
        .merge_and_save(vec![
            create_test_quote("2024-01-01", "TCS", 102.0),
            create_test_quote("2024-01-01", "INFY", 50.0),
        ])
        .unwrap();

    let snapshot: Vec<QuoteRecord> =
        serde_json::from_str(&fs::read_to_string(store.json_path()).unwrap()).unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.json_path()).unwrap()).unwrap();

    assert_eq!(snapshot, history);
    assert_eq!(store.load().unwrap(), Some(snapshot));
    assert_eq!(raw[0]["Symbol"], "TCS");
    assert_eq!(raw[0]["LastPrice"], 102.0);
}

#[test]
fn test_corrupt_history_aborts_without_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let corrupt = "Date,Symbol,Company,Open,DayHigh,DayLow,LastPrice,PreviousClose,Change,PChange,Volume\n\
                   not-a-date,TCS,TCS,1,1,1,1,1,1,1,1\n";
    fs::write(store.csv_path(), corrupt).unwrap();

    let result = store.merge_and_save(vec![create_test_quote("2024-01-02", "TCS", 1.0)]);

    assert!(result.is_err());
    assert_eq!(fs::read_to_string(store.csv_path()).unwrap(), corrupt);
    assert!(!store.json_path().exists());
}
