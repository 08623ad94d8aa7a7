//! In-memory doubles for the store, the price feed and the notifier.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{FetchError, NotifyError, StoreError};
use crate::model::{PriceRecord, Quote, RecordKey};
use crate::scanner::{Notifier, QuoteSource};
use crate::store::RecordStore;

/// Quote with the given averages and zeroed volumes.
pub fn quote(item_id: i64, name: &str, buy_average: i64, sell_average: i64) -> Quote {
    Quote {
        item_id,
        name: name.to_string(),
        members_only: false,
        shop_price: 0,
        buy_average,
        buy_quantity: 0,
        sell_average,
        sell_quantity: 0,
        overall_average: (buy_average + sell_average) / 2,
        overall_quantity: 0,
    }
}

#[derive(Default)]
struct MemoryInner {
    records: Vec<PriceRecord>,
    next_key: u64,
    claims: HashMap<i64, RecordKey>,
    writes: usize,
    failing_reads: HashSet<i64>,
    failing_writes: HashSet<i64>,
}

/// Record store kept in a vector, with per-item failure injection.
///
/// Inserts claim the item id the same way the Redis store does, so a claim
/// left behind without its record can be modelled.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record as-is, bypassing the uniqueness check. Used to model
    /// duplicates left behind by older writers.
    pub async fn seed(&self, record: PriceRecord) {
        let mut inner = self.inner.lock().await;
        if let Some(RecordKey(k)) = record.record_key {
            inner.next_key = inner.next_key.max(k);
        }
        inner.records.push(record);
    }

    /// Leave a claim for `item_id` whose record was never written, as after
    /// a crash between the claim and the record write.
    pub async fn orphan_claim(&self, item_id: i64) {
        let mut inner = self.inner.lock().await;
        inner.next_key += 1;
        let key = RecordKey(inner.next_key);
        inner.claims.insert(item_id, key);
    }

    pub async fn records(&self) -> Vec<PriceRecord> {
        self.inner.lock().await.records.clone()
    }

    /// Successful inserts plus updates.
    pub async fn write_count(&self) -> usize {
        self.inner.lock().await.writes
    }

    pub async fn fail_reads_for(&self, item_id: i64) {
        self.inner.lock().await.failing_reads.insert(item_id);
    }

    pub async fn fail_writes_for(&self, item_id: i64) {
        self.inner.lock().await.failing_writes.insert(item_id);
    }

    pub async fn clear_failures(&self) {
        let mut inner = self.inner.lock().await;
        inner.failing_reads.clear();
        inner.failing_writes.clear();
    }
}

impl RecordStore for MemoryRecordStore {
    async fn find_by_item_id(&self, item_id: i64) -> Result<Vec<PriceRecord>, StoreError> {
        let inner = self.inner.lock().await;
        if inner.failing_reads.contains(&item_id) {
            return Err(StoreError::Read(format!("injected read failure for {item_id}")));
        }

        Ok(inner
            .records
            .iter()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: &PriceRecord) -> Result<RecordKey, StoreError> {
        record.validate()?;

        let mut inner = self.inner.lock().await;
        if inner.failing_writes.contains(&record.item_id) {
            return Err(StoreError::Write(format!(
                "injected write failure for {}",
                record.item_id
            )));
        }
        let claimed = inner.claims.get(&record.item_id).is_some_and(|held| {
            inner.records.iter().any(|r| r.record_key == Some(*held))
        });
        if claimed || inner.records.iter().any(|r| r.item_id == record.item_id) {
            return Err(StoreError::Duplicate {
                item_id: record.item_id,
            });
        }

        inner.next_key += 1;
        let key = RecordKey(inner.next_key);
        inner.claims.insert(record.item_id, key);
        let mut stored = record.clone();
        stored.record_key = Some(key);
        inner.records.push(stored);
        inner.writes += 1;

        Ok(key)
    }

    async fn update(&self, record: &PriceRecord) -> Result<(), StoreError> {
        let key = record.record_key.ok_or(StoreError::MissingKey {
            item_id: record.item_id,
        })?;
        record.validate()?;

        let mut inner = self.inner.lock().await;
        if inner.failing_writes.contains(&record.item_id) {
            return Err(StoreError::Write(format!(
                "injected write failure for {}",
                record.item_id
            )));
        }

        let slot = inner
            .records
            .iter_mut()
            .find(|r| r.record_key == Some(key))
            .ok_or_else(|| StoreError::Write(format!("record {key} does not exist")))?;
        *slot = record.clone();
        inner.writes += 1;

        Ok(())
    }
}

/// Price feed replaying scripted results in order. Once exhausted every
/// fetch fails with status 503, which ends a running scanner.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<Quote>, FetchError>>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<Quote>, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

impl QuoteSource for ScriptedSource {
    async fn fetch_all(&self) -> Result<Vec<Quote>, FetchError> {
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(FetchError::Status { status: 503 }))
    }
}

#[derive(Default)]
struct RecordingInner {
    sent: Vec<String>,
    fail_remaining: usize,
}

/// Notifier that keeps every delivered message. Clones share the log.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<RecordingInner>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `count` sends fail.
    pub fn failing_first(count: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecordingInner {
                sent: Vec::new(),
                fail_remaining: count,
            })),
        }
    }

    pub async fn sent(&self) -> Vec<String> {
        self.inner.lock().await.sent.clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn send_plain(&self, text: &str) -> Result<(), NotifyError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_remaining > 0 {
            inner.fail_remaining -= 1;
            return Err(NotifyError::Delivery("injected failure".to_string()));
        }

        inner.sent.push(text.to_string());
        Ok(())
    }
}
