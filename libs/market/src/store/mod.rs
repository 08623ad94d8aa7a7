//! Persistence for price records, keyed by item id.

mod redis;

use std::future::Future;

use crate::error::StoreError;
use crate::model::{PriceRecord, RecordKey};

pub use redis::RedisRecordStore;

/// Single-record operations over the backing store.
///
/// There is no transaction across records: every call is atomic on its own
/// and a failure only concerns the record it was issued for. Implementations
/// must be safe to share between the scanner and lookup commands.
pub trait RecordStore: Send + Sync {
    /// Records stored for `item_id`. May hold more than one entry when the
    /// store contains legacy duplicates, callers pick the one they want.
    fn find_by_item_id(
        &self,
        item_id: i64,
    ) -> impl Future<Output = Result<Vec<PriceRecord>, StoreError>> + Send;

    /// Persist a new record and return its freshly issued key.
    /// Fails with [`StoreError::Duplicate`] if the item already has a record.
    fn insert(
        &self,
        record: &PriceRecord,
    ) -> impl Future<Output = Result<RecordKey, StoreError>> + Send;

    /// Overwrite an existing record. `record.record_key` must be set.
    fn update(&self, record: &PriceRecord) -> impl Future<Output = Result<(), StoreError>> + Send;
}
