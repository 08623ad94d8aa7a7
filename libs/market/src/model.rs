use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

//
// Match the exchange summary JSON
// {"2": {"id": 2, "name": "Cannonball", "members": true, "sp": 5, ...}, ...}
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(rename = "id")]
    pub item_id: i64,

    pub name: String,

    #[serde(rename = "members", default)]
    pub members_only: bool,

    #[serde(rename = "sp", default)]
    pub shop_price: i64,

    #[serde(default)]
    pub buy_average: i64,

    #[serde(default)]
    pub buy_quantity: i64,

    #[serde(default)]
    pub sell_average: i64,

    #[serde(default)]
    pub sell_quantity: i64,

    #[serde(default)]
    pub overall_average: i64,

    #[serde(default)]
    pub overall_quantity: i64,
}

impl Quote {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            self.item_id,
            &self.name,
            [
                ("shop_price", self.shop_price),
                ("buy_average", self.buy_average),
                ("buy_quantity", self.buy_quantity),
                ("sell_average", self.sell_average),
                ("sell_quantity", self.sell_quantity),
                ("overall_average", self.overall_average),
                ("overall_quantity", self.overall_quantity),
            ],
        )
    }

    /// True when both averages match `other`.
    pub fn same_averages(&self, other: &Quote) -> bool {
        self.buy_average == other.buy_average && self.sell_average == other.sell_average
    }
}

/// Store-assigned identifier, immutable once issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub u64);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub record_key: Option<RecordKey>,
    pub item_id: i64,
    pub name: String,
    pub members_only: bool,
    pub shop_price: i64,
    pub buy_average: i64,
    pub buy_quantity: i64,
    pub sell_average: i64,
    pub sell_quantity: i64,
    pub overall_average: i64,
    pub overall_quantity: i64,

    /// Milliseconds since epoch, 0 when never updated.
    #[serde(default)]
    pub last_updated: i64,
}

impl PriceRecord {
    /// New, not yet persisted record built from a fetched quote.
    pub fn from_quote(quote: &Quote, now_ms: i64) -> Self {
        Self {
            record_key: None,
            item_id: quote.item_id,
            name: quote.name.clone(),
            members_only: quote.members_only,
            shop_price: quote.shop_price,
            buy_average: quote.buy_average,
            buy_quantity: quote.buy_quantity,
            sell_average: quote.sell_average,
            sell_quantity: quote.sell_quantity,
            overall_average: quote.overall_average,
            overall_quantity: quote.overall_quantity,
            last_updated: now_ms,
        }
    }

    /// Merge the averages of `quote` into this record.
    ///
    /// An average is only overwritten by a strictly positive value that
    /// differs from the stored one, so a zero from the feed never erases a
    /// known price. Returns whether anything changed; `last_updated` is
    /// bumped exactly when it did.
    pub fn apply_quote(&mut self, quote: &Quote, now_ms: i64) -> bool {
        let mut changed = false;

        if quote.buy_average > 0 && quote.buy_average != self.buy_average {
            self.buy_average = quote.buy_average;
            changed = true;
        }

        if quote.sell_average > 0 && quote.sell_average != self.sell_average {
            self.sell_average = quote.sell_average;
            changed = true;
        }

        if changed {
            self.last_updated = now_ms;
        }

        changed
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            self.item_id,
            &self.name,
            [
                ("shop_price", self.shop_price),
                ("buy_average", self.buy_average),
                ("buy_quantity", self.buy_quantity),
                ("sell_average", self.sell_average),
                ("sell_quantity", self.sell_quantity),
                ("overall_average", self.overall_average),
                ("overall_quantity", self.overall_quantity),
                ("last_updated", self.last_updated),
            ],
        )
    }
}

fn validate_fields<const N: usize>(
    item_id: i64,
    name: &str,
    fields: [(&'static str, i64); N],
) -> Result<(), ValidationError> {
    if item_id < 0 {
        return Err(ValidationError::NegativeItemId(item_id));
    }

    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName { item_id });
    }

    for (field, value) in fields {
        if value < 0 {
            return Err(ValidationError::NegativeField {
                item_id,
                field,
                value,
            });
        }
    }

    Ok(())
}
