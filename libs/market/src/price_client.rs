use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::model::Quote;
use crate::scanner::QuoteSource;

pub const DEFAULT_SUMMARY_URL: &str = "https://rsbuddy.com/exchange/summary.json";

/// Reads the exchange price summary: the full current snapshot of every
/// tracked item on each call.
#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    summary_url: String,
}

impl PriceClient {
    pub fn new(summary_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            summary_url: summary_url.into(),
        })
    }

    pub async fn fetch_summary(&self) -> Result<Vec<Quote>, FetchError> {
        debug!(url = %self.summary_url, "fetching price summary");

        let res = self.client.get(&self.summary_url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = res.text().await?;
        let quotes = parse_summary(&body)?;

        info!(items = quotes.len(), "price summary fetched");
        Ok(quotes)
    }
}

impl QuoteSource for PriceClient {
    async fn fetch_all(&self) -> Result<Vec<Quote>, FetchError> {
        self.fetch_summary().await
    }
}

/// Decode the summary object (keyed by item id) into quotes ordered by id.
pub fn parse_summary(body: &str) -> Result<Vec<Quote>, FetchError> {
    let items: HashMap<String, Quote> = serde_json::from_str(body)?;

    let mut quotes: Vec<Quote> = items.into_values().collect();
    quotes.sort_by_key(|q| q.item_id);

    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_sorted_by_item_id() {
        let body = r#"{
            "561": {"id":561,"name":"Nature rune","members":false,"sp":372,
                    "buy_average":225,"buy_quantity":41000,"sell_average":224,
                    "sell_quantity":39000,"overall_average":224,"overall_quantity":80000},
            "2":   {"id":2,"name":"Cannonball","members":true,"sp":5,
                    "buy_average":180,"buy_quantity":120000,"sell_average":181,
                    "sell_quantity":90000,"overall_average":180,"overall_quantity":210000}
        }"#;

        let quotes = parse_summary(body).unwrap();

        let ids: Vec<i64> = quotes.iter().map(|q| q.item_id).collect();
        assert_eq!(ids, vec![2, 561]);
        assert_eq!(quotes[1].name, "Nature rune");
        assert_eq!(quotes[1].shop_price, 372);
    }

    #[test]
    fn malformed_body_is_a_fetch_error() {
        assert!(matches!(
            parse_summary("<html>maintenance</html>"),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_summary(r#"{"2": {"name": "Cannonball"}}"#),
            Err(FetchError::Malformed(_))
        ));
    }
}
