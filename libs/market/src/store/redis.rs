use std::time::Duration;

use anyhow::Error;
use fred::prelude::*;
use fred::types::SetOptions;
use tracing::{debug, error, warn};

use super::RecordStore;
use crate::error::StoreError;
use crate::model::{PriceRecord, RecordKey};

/// Price records kept in Redis as JSON documents.
///
/// Layout under `key_prefix`:
/// - `record_seq` counter issuing record keys
/// - `record:{key}` the JSON encoded record
/// - `item:{item_id}` set of record keys for the item
/// - `claim:{item_id}` written with NX on insert, one per item. A claim
///   whose record body is missing is taken over by the next insert.
#[derive(Clone)]
pub struct RedisRecordStore {
    client: Client,
    key_prefix: String,
}

impl RedisRecordStore {
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, Error> {
        let config = Config::from_url(redis_url)?;

        let client = Builder::from_config(config)
            .with_connection_config(|config| {
                config.connection_timeout = Duration::from_secs(5);
                config.tcp = TcpConfig {
                    nodelay: Some(true),
                    ..Default::default()
                };
            })
            .build()?;

        client.on_error(|(error, server)| async move {
            error!(?server, ?error, "redis connection error");
            Ok(())
        });

        client.connect();
        client.wait_for_connect().await?;

        Ok(Self {
            client,
            key_prefix: key.into(),
        })
    }

    /// Quit the connection. Pending commands are flushed first.
    pub async fn close(&self) -> Result<(), Error> {
        self.client.quit().await?;
        Ok(())
    }

    fn seq_key(&self) -> String {
        format!("{}:record_seq", self.key_prefix)
    }

    fn record_key(&self, key: RecordKey) -> String {
        format!("{}:record:{}", self.key_prefix, key)
    }

    fn item_key(&self, item_id: i64) -> String {
        format!("{}:item:{}", self.key_prefix, item_id)
    }

    fn claim_key(&self, item_id: i64) -> String {
        format!("{}:claim:{}", self.key_prefix, item_id)
    }

    /// Re-point an existing claim at `key` when the record it names was never
    /// written. A claim backed by a stored record means the item exists.
    async fn take_over_claim(&self, item_id: i64, key: RecordKey) -> Result<(), StoreError> {
        let holder: Option<String> = self
            .client
            .get(self.claim_key(item_id))
            .await
            .map_err(StoreError::read)?;

        if let Some(held) = holder.and_then(|h| h.parse().ok().map(RecordKey)) {
            let live: i64 = self
                .client
                .exists(self.record_key(held))
                .await
                .map_err(StoreError::read)?;
            if live > 0 {
                return Err(StoreError::Duplicate { item_id });
            }
            warn!(item_id, claim = %held, %key, "taking over orphaned insert claim");
        }

        let _: () = self
            .client
            .set(self.claim_key(item_id), key.to_string(), None, None, false)
            .await
            .map_err(StoreError::write)?;

        Ok(())
    }
}

impl RecordStore for RedisRecordStore {
    async fn find_by_item_id(&self, item_id: i64) -> Result<Vec<PriceRecord>, StoreError> {
        let members: Vec<String> = self
            .client
            .smembers(self.item_key(item_id))
            .await
            .map_err(StoreError::read)?;

        let mut keys: Vec<RecordKey> = members
            .iter()
            .filter_map(|m| m.parse().ok().map(RecordKey))
            .collect();
        keys.sort();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = self
                .client
                .get(self.record_key(key))
                .await
                .map_err(StoreError::read)?;

            match raw {
                Some(raw) => records.push(serde_json::from_str(&raw)?),
                None => debug!(item_id, %key, "dangling record key in item index"),
            }
        }

        Ok(records)
    }

    async fn insert(&self, record: &PriceRecord) -> Result<RecordKey, StoreError> {
        record.validate()?;

        let seq: i64 = self
            .client
            .incr(self.seq_key())
            .await
            .map_err(StoreError::write)?;
        let key = RecordKey(seq as u64);

        let claimed: Option<String> = self
            .client
            .set(
                self.claim_key(record.item_id),
                key.to_string(),
                None,
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(StoreError::write)?;

        if claimed.is_none() {
            self.take_over_claim(record.item_id, key).await?;
        }

        let mut stored = record.clone();
        stored.record_key = Some(key);
        let body = serde_json::to_string(&stored)?;

        let written: Result<(), fred::error::Error> = async {
            let _: () = self
                .client
                .set(self.record_key(key), body, None, None, false)
                .await?;
            let _: i64 = self
                .client
                .sadd(self.item_key(record.item_id), key.to_string())
                .await?;
            Ok(())
        }
        .await;

        if let Err(e) = written {
            // release the claim so the next cycle can retry the insert
            let released: Result<i64, _> = self.client.del(self.claim_key(record.item_id)).await;
            if let Err(del_err) = released {
                warn!(item_id = record.item_id, error = %del_err, "insert claim not released");
            }
            return Err(StoreError::write(e));
        }

        Ok(key)
    }

    async fn update(&self, record: &PriceRecord) -> Result<(), StoreError> {
        let key = record.record_key.ok_or(StoreError::MissingKey {
            item_id: record.item_id,
        })?;
        record.validate()?;
        let body = serde_json::to_string(record)?;

        let replaced: Option<String> = self
            .client
            .set(self.record_key(key), body, None, Some(SetOptions::XX), false)
            .await
            .map_err(StoreError::write)?;

        match replaced {
            Some(_) => Ok(()),
            None => Err(StoreError::Write(format!(
                "record {} for item {} does not exist",
                key, record.item_id
            ))),
        }
    }
}
