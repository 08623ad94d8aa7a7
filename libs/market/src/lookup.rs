//! What an ad hoc item lookup shows: live prices, with the stored record
//! filling in when the feed has no recent trades.

use crate::detector::Margin;
use crate::model::{PriceRecord, Quote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Value comes from the current feed.
    Recent,
    /// Feed reports nothing, value is the last one stored.
    LastKnown,
    /// Neither the feed nor the store has a value.
    NoData,
}

impl Freshness {
    pub fn marker(&self) -> &'static str {
        match self {
            Freshness::Recent => "✅",
            Freshness::LastKnown => "❓",
            Freshness::NoData => "❌",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceView {
    pub value: i64,
    pub freshness: Freshness,
}

impl PriceView {
    fn pick(live: i64, stored: Option<i64>) -> Self {
        if live > 0 {
            return Self {
                value: live,
                freshness: Freshness::Recent,
            };
        }

        match stored {
            Some(value) if value > 0 => Self {
                value,
                freshness: Freshness::LastKnown,
            },
            _ => Self {
                value: 0,
                freshness: Freshness::NoData,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub quote: Quote,
    pub buy: PriceView,
    pub sell: PriceView,
    pub margin: Option<Margin>,
    pub last_updated: i64,
}

impl ItemView {
    pub fn build(quote: Quote, stored: Option<&PriceRecord>) -> Self {
        let buy = PriceView::pick(quote.buy_average, stored.map(|r| r.buy_average));
        let sell = PriceView::pick(quote.sell_average, stored.map(|r| r.sell_average));

        Self {
            margin: Margin::of(buy.value, sell.value),
            last_updated: stored.map(|r| r.last_updated).unwrap_or_default(),
            quote,
            buy,
            sell,
        }
    }
}

/// The stored record matching `quote`, preferring one with the same name.
pub fn matching_record<'a>(records: &'a [PriceRecord], quote: &Quote) -> Option<&'a PriceRecord> {
    let mut candidates = records.iter().filter(|r| r.item_id == quote.item_id);
    let first = candidates.clone().next();
    candidates.find(|r| r.name == quote.name).or(first)
}
