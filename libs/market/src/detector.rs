//! Profit qualification and notification deduplication.

use std::collections::HashMap;

use tracing::debug;

use crate::format::shorten_gp;
use crate::model::Quote;

/// Profit thresholds, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum absolute profit in gp.
    pub profit_minimum: i64,
    /// Compared against the margin expressed in percent.
    pub profit_percentage: f64,
}

impl Thresholds {
    pub fn qualifies(&self, margin: &Margin) -> bool {
        margin.profit >= self.profit_minimum
            && margin.percent > self.profit_percentage
            && margin.percent != 100.0
    }
}

/// Spread between the average sell and buy price of an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub profit: i64,
    pub percent: f64,
}

impl Margin {
    /// `None` when there is no sell average to compare against, or when the
    /// spread does not fit in an `i64`.
    pub fn of(buy_average: i64, sell_average: i64) -> Option<Self> {
        if sell_average <= 0 {
            return None;
        }

        let profit = sell_average.checked_sub(buy_average)?;
        let percent = profit as f64 / sell_average as f64 * 100.0;

        Some(Self { profit, percent })
    }

    pub fn of_quote(quote: &Quote) -> Option<Self> {
        Self::of(quote.buy_average, quote.sell_average)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// First qualifying sighting since startup.
    New,
    /// Already announced, but the averages moved since.
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub quote: Quote,
    pub margin: Margin,
}

impl NotificationEvent {
    /// Plain text body handed to the messaging side.
    pub fn message(&self) -> String {
        let mut text = format!(
            "{} 💲 🡲 {:.2}% 🡰 profit margin 🤑 possible flip reward 🡲 {} 🔥",
            self.quote.name,
            self.margin.percent,
            shorten_gp(self.margin.profit)
        );

        if self.kind == EventKind::Updated {
            text.push_str(" (price moved)");
        }

        format!("```{text}```")
    }
}

/// Last announced snapshot per item id. Lives as long as the process,
/// entries are replaced but never evicted.
#[derive(Debug, Default)]
pub struct NotificationCache {
    entries: HashMap<i64, Quote>,
}

impl NotificationCache {
    /// Record a qualifying sighting and report whether it must be announced.
    pub fn observe(&mut self, quote: &Quote) -> Option<EventKind> {
        match self.entries.get(&quote.item_id) {
            Some(cached) if cached.same_averages(quote) => None,
            Some(_) => {
                self.entries.insert(quote.item_id, quote.clone());
                Some(EventKind::Updated)
            }
            None => {
                debug!(item_id = quote.item_id, name = %quote.name, "cached");
                self.entries.insert(quote.item_id, quote.clone());
                Some(EventKind::New)
            }
        }
    }

    pub fn get(&self, item_id: i64) -> Option<&Quote> {
        self.entries.get(&item_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns live quotes into notification events, announcing a sustained
/// spread once until its averages change.
#[derive(Debug)]
pub struct Detector {
    thresholds: Thresholds,
    cache: NotificationCache,
}

impl Detector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            cache: NotificationCache::default(),
        }
    }

    pub fn cache(&self) -> &NotificationCache {
        &self.cache
    }

    /// Events in the iteration order of `quotes`.
    pub fn evaluate(&mut self, quotes: &[Quote]) -> Vec<NotificationEvent> {
        let mut events = Vec::new();

        for quote in quotes {
            if let Err(e) = quote.validate() {
                debug!(item_id = quote.item_id, error = %e, "not evaluating invalid quote");
                continue;
            }

            let Some(margin) = Margin::of_quote(quote) else {
                continue;
            };

            if !self.thresholds.qualifies(&margin) {
                continue;
            }

            if let Some(kind) = self.cache.observe(quote) {
                events.push(NotificationEvent {
                    kind,
                    quote: quote.clone(),
                    margin,
                });
            }
        }

        events
    }
}
