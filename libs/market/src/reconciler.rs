use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::lookup::matching_record;
use crate::model::{PriceRecord, Quote};
use crate::store::RecordStore;

/// Counts of what one reconciliation pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl ReconcileReport {
    /// Writes that reached the store.
    pub fn writes(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Merges fetched quotes into the record store.
///
/// The reconciler is the only writer of the store. Per-record failures are
/// logged and counted, never propagated: a failed update is picked up again
/// on the next pass because the stored value is still stale.
pub struct Reconciler<S> {
    store: Arc<S>,
}

impl<S: RecordStore> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, quotes: &[Quote]) -> ReconcileReport {
        self.reconcile_at(quotes, Utc::now().timestamp_millis()).await
    }

    #[instrument(name = "reconcile", skip(self, quotes), fields(quotes = quotes.len()))]
    pub async fn reconcile_at(&self, quotes: &[Quote], now_ms: i64) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for quote in quotes {
            if let Err(e) = quote.validate() {
                warn!(item_id = quote.item_id, error = %e, "skipping invalid quote");
                report.invalid += 1;
                continue;
            }

            match self.merge(quote, now_ms).await {
                Ok(Outcome::Inserted) => report.inserted += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    warn!(item_id = quote.item_id, name = %quote.name, error = %e, "record skipped");
                    report.failed += 1;
                }
            }
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            invalid = report.invalid,
            failed = report.failed,
            "store reconciled"
        );

        report
    }

    async fn merge(&self, quote: &Quote, now_ms: i64) -> Result<Outcome, StoreError> {
        let existing = self.store.find_by_item_id(quote.item_id).await?;

        let Some(current) = select_record(&existing, quote) else {
            let record = PriceRecord::from_quote(quote, now_ms);
            let key = self.store.insert(&record).await?;
            debug!(item_id = quote.item_id, name = %quote.name, %key, "record added");
            return Ok(Outcome::Inserted);
        };

        let mut record = current.clone();
        if !record.apply_quote(quote, now_ms) {
            return Ok(Outcome::Unchanged);
        }

        self.store.update(&record).await?;
        debug!(
            item_id = quote.item_id,
            buy = record.buy_average,
            sell = record.sell_average,
            "record updated"
        );
        Ok(Outcome::Updated)
    }
}

enum Outcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Pick the stored record a quote merges into. With legacy duplicates the
/// same-named record wins, otherwise the first one the store returned.
fn select_record<'a>(existing: &'a [PriceRecord], quote: &Quote) -> Option<&'a PriceRecord> {
    let count = existing.iter().filter(|r| r.item_id == quote.item_id).count();
    if count > 1 {
        warn!(item_id = quote.item_id, count, "duplicate records stored for item");
    }

    matching_record(existing, quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordKey;
    use crate::testkit::{MemoryRecordStore, quote};

    fn reconciler() -> (Reconciler<MemoryRecordStore>, Arc<MemoryRecordStore>) {
        let store = Arc::new(MemoryRecordStore::new());
        (Reconciler::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn new_quote_is_inserted_with_timestamp() {
        let (reconciler, store) = reconciler();

        let report = reconciler
            .reconcile_at(&[quote(1, "Rune", 100, 150)], 1_000)
            .await;

        assert_eq!(report.inserted, 1);
        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].buy_average, 100);
        assert_eq!(records[0].sell_average, 150);
        assert_eq!(records[0].last_updated, 1_000);
        assert!(records[0].record_key.is_some());
    }

    #[tokio::test]
    async fn second_pass_without_changes_writes_nothing() {
        let (reconciler, store) = reconciler();
        let batch = vec![quote(1, "Rune", 100, 150), quote(2, "Cannonball", 0, 180)];

        reconciler.reconcile_at(&batch, 1).await;
        let writes = store.write_count().await;

        let report = reconciler.reconcile_at(&batch, 2).await;

        assert_eq!(report.writes(), 0);
        assert_eq!(report.unchanged, 2);
        assert_eq!(store.write_count().await, writes);
    }

    #[tokio::test]
    async fn zero_buy_average_preserves_stored_value() {
        let (reconciler, store) = reconciler();
        reconciler
            .reconcile_at(&[quote(7, "Lobster", 500, 520)], 1)
            .await;

        let report = reconciler
            .reconcile_at(&[quote(7, "Lobster", 0, 520)], 2)
            .await;

        assert_eq!(report.unchanged, 1);
        let records = store.records().await;
        assert_eq!(records[0].buy_average, 500);
        assert_eq!(records[0].last_updated, 1);
    }

    #[tokio::test]
    async fn sell_change_is_written_and_stamped() {
        let (reconciler, store) = reconciler();
        reconciler
            .reconcile_at(&[quote(7, "Lobster", 900, 1000)], 1)
            .await;

        let report = reconciler
            .reconcile_at(&[quote(7, "Lobster", 900, 1200)], 50)
            .await;

        assert_eq!(report.updated, 1);
        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sell_average, 1200);
        assert_eq!(records[0].last_updated, 50);
    }

    #[tokio::test]
    async fn repeated_cycles_keep_one_record_per_item() {
        let (reconciler, store) = reconciler();

        for (i, sell) in [150, 160, 160, 170].into_iter().enumerate() {
            let batch = vec![quote(1, "Rune", 100, sell), quote(1, "Rune", 100, sell)];
            reconciler.reconcile_at(&batch, i as i64).await;
        }

        let records = store.records().await;
        assert_eq!(records.iter().filter(|r| r.item_id == 1).count(), 1);
        assert_eq!(records[0].sell_average, 170);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_batch() {
        let (reconciler, store) = reconciler();
        store.fail_reads_for(1).await;
        store.fail_writes_for(2).await;

        let report = reconciler
            .reconcile_at(
                &[
                    quote(1, "Rune", 100, 150),
                    quote(2, "Cannonball", 180, 181),
                    quote(3, "Bones", 90, 100),
                ],
                1,
            )
            .await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.inserted, 1);
        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_id, 3);
    }

    #[tokio::test]
    async fn failed_update_is_retried_next_pass() {
        let (reconciler, store) = reconciler();
        reconciler.reconcile_at(&[quote(2, "Cannonball", 180, 181)], 1).await;

        store.fail_writes_for(2).await;
        let report = reconciler.reconcile_at(&[quote(2, "Cannonball", 180, 190)], 2).await;
        assert_eq!(report.failed, 1);

        store.clear_failures().await;
        let report = reconciler.reconcile_at(&[quote(2, "Cannonball", 180, 190)], 3).await;
        assert_eq!(report.updated, 1);
        assert_eq!(store.records().await[0].sell_average, 190);
    }

    #[tokio::test]
    async fn orphaned_claim_does_not_block_insert() {
        let (reconciler, store) = reconciler();
        store.orphan_claim(11).await;

        let report = reconciler.reconcile_at(&[quote(11, "Coal", 150, 170)], 1).await;

        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed, 0);
        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_id, 11);
    }

    #[tokio::test]
    async fn invalid_quotes_never_reach_the_store() {
        let (reconciler, store) = reconciler();

        let report = reconciler.reconcile_at(&[quote(-4, "Ghost", 1, 2)], 1).await;

        assert_eq!(report.invalid, 1);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn duplicates_merge_into_name_match() {
        let (reconciler, store) = reconciler();
        let mut stale = PriceRecord::from_quote(&quote(9, "Old name", 10, 20), 1);
        stale.record_key = Some(RecordKey(1));
        let mut current = PriceRecord::from_quote(&quote(9, "Iron ore", 10, 20), 1);
        current.record_key = Some(RecordKey(2));
        store.seed(stale).await;
        store.seed(current).await;

        reconciler.reconcile_at(&[quote(9, "Iron ore", 10, 25)], 2).await;

        let records = store.records().await;
        assert_eq!(records.len(), 2);
        let updated = records.iter().find(|r| r.record_key == Some(RecordKey(2)));
        assert_eq!(updated.map(|r| r.sell_average), Some(25));
        let untouched = records.iter().find(|r| r.record_key == Some(RecordKey(1)));
        assert_eq!(untouched.map(|r| r.sell_average), Some(20));
    }
}
