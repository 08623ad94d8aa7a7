use std::sync::Arc;
use std::time::Duration;

use market::testkit::{MemoryRecordStore, RecordingNotifier, ScriptedSource, quote};
use market::{FetchError, QuoteBook, ScanConfig, ScanError, Scanner, Thresholds};
use tokio::sync::watch;

fn config(profit_minimum: i64, profit_percentage: f64) -> ScanConfig {
    ScanConfig {
        interval: Duration::ZERO,
        pacing: Duration::ZERO,
        thresholds: Thresholds {
            profit_minimum,
            profit_percentage,
        },
    }
}

#[tokio::test]
async fn first_cycle_inserts_and_announces() {
    let store = Arc::new(MemoryRecordStore::new());
    let notifier = RecordingNotifier::new();
    let source = ScriptedSource::new(vec![Ok(vec![quote(1, "Rune", 100, 150)])]);
    let mut scanner = Scanner::new(
        source,
        Arc::clone(&store),
        notifier.clone(),
        QuoteBook::new(),
        config(10, 0.1),
    );
    let (_tx, mut rx) = watch::channel(false);

    let before = chrono::Utc::now().timestamp_millis();
    let report = scanner.run_cycle(&mut rx).await.unwrap();
    let after = chrono::Utc::now().timestamp_millis();

    assert_eq!(report.reconcile.inserted, 1);
    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_id, 1);
    assert_eq!(records[0].buy_average, 100);
    assert_eq!(records[0].sell_average, 150);
    assert!((before..=after).contains(&records[0].last_updated));

    let sent = notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Rune"));
    assert!(!sent[0].contains("price moved"));
}

#[tokio::test]
async fn unchanged_feed_is_quiet_until_prices_move() {
    let store = Arc::new(MemoryRecordStore::new());
    let notifier = RecordingNotifier::new();
    let source = ScriptedSource::new(vec![
        Ok(vec![quote(1, "Rune platebody", 1000, 1200)]),
        Ok(vec![quote(1, "Rune platebody", 1000, 1200)]),
        Ok(vec![quote(1, "Rune platebody", 1000, 1300)]),
    ]);
    let mut scanner = Scanner::new(
        source,
        Arc::clone(&store),
        notifier.clone(),
        QuoteBook::new(),
        config(100, 0.05),
    );
    let (_tx, mut rx) = watch::channel(false);

    let first = scanner.run_cycle(&mut rx).await.unwrap();
    let second = scanner.run_cycle(&mut rx).await.unwrap();
    let third = scanner.run_cycle(&mut rx).await.unwrap();

    assert_eq!((first.events, second.events, third.events), (1, 0, 1));
    assert_eq!(second.reconcile.writes(), 0);
    assert_eq!(third.reconcile.updated, 1);

    let sent = notifier.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("price moved"));
    assert_eq!(store.records().await[0].sell_average, 1300);
}

#[tokio::test]
async fn run_ends_with_fetch_error_after_processing_good_cycles() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = ScriptedSource::new(vec![
        Ok(vec![quote(1, "Rune", 100, 150), quote(2, "Feather", 0, 5)]),
        Ok(vec![quote(1, "Rune", 0, 170), quote(2, "Feather", 3, 5)]),
        Err(FetchError::Status { status: 502 }),
    ]);
    let mut scanner = Scanner::new(
        source,
        Arc::clone(&store),
        RecordingNotifier::new(),
        QuoteBook::new(),
        config(10, 0.1),
    );
    let (_tx, rx) = watch::channel(false);

    let result = scanner.run(rx).await;

    assert!(matches!(
        result,
        Err(ScanError::Fetch(FetchError::Status { status: 502 }))
    ));

    let records = store.records().await;
    assert_eq!(records.len(), 2);
    let rune = records.iter().find(|r| r.item_id == 1).unwrap();
    assert_eq!((rune.buy_average, rune.sell_average), (100, 170));
    let feather = records.iter().find(|r| r.item_id == 2).unwrap();
    assert_eq!((feather.buy_average, feather.sell_average), (3, 5));
}

#[tokio::test]
async fn cache_survives_across_cycles_not_store() {
    let store = Arc::new(MemoryRecordStore::new());
    let notifier = RecordingNotifier::new();
    let source = ScriptedSource::new(vec![
        Ok(vec![quote(1, "Rune", 100, 150)]),
        Ok(vec![quote(1, "Rune", 100, 150)]),
    ]);
    let mut scanner = Scanner::new(
        source,
        Arc::clone(&store),
        notifier.clone(),
        QuoteBook::new(),
        config(10, 0.1),
    );
    let (_tx, mut rx) = watch::channel(false);

    scanner.run_cycle(&mut rx).await.unwrap();
    store.fail_reads_for(1).await;
    let report = scanner.run_cycle(&mut rx).await.unwrap();

    assert_eq!(report.reconcile.failed, 1);
    assert_eq!(report.events, 0);
    assert_eq!(scanner.detector().cache().len(), 1);
    assert_eq!(notifier.sent().await.len(), 1);
}
