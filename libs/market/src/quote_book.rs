use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{LookupError, ValidationError};
use crate::model::Quote;

/// Latest fetched snapshot, shared with ad hoc lookups.
///
/// The scanner replaces the whole snapshot after each fetch; readers get
/// copies, never references into it.
#[derive(Clone, Default)]
pub struct QuoteBook {
    quotes: Arc<RwLock<Vec<Quote>>>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, quotes: Vec<Quote>) {
        *self.quotes.write().await = quotes;
    }

    pub async fn len(&self) -> usize {
        self.quotes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.quotes.read().await.is_empty()
    }

    /// Case-insensitive exact name match, falling back to the first name
    /// containing `text`.
    pub async fn find_by_name(&self, text: &str) -> Result<Quote, LookupError> {
        let needle = validate_query(text)?;
        let quotes = self.quotes.read().await;

        if let Some(q) = quotes.iter().find(|q| q.name.to_lowercase() == needle) {
            return Ok(q.clone());
        }

        match quotes
            .iter()
            .find(|q| q.name.to_lowercase().contains(&needle))
        {
            Some(q) => {
                debug!(query = %needle, found = %q.name, "partial name match");
                Ok(q.clone())
            }
            None => Err(LookupError::NotFound(text.trim().to_string())),
        }
    }
}

/// Normalized (trimmed, lowercase) search text.
///
/// Letters, digits, spaces, apostrophes, hyphens, underscores and
/// parentheses only.
pub fn validate_query(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }

    let allowed = |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, ' ' | '\'' | '-' | '_' | '(' | ')')
    };
    if !trimmed.chars().all(allowed) {
        return Err(ValidationError::InvalidQuery(trimmed.to_string()));
    }

    Ok(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::quote;

    async fn book() -> QuoteBook {
        let book = QuoteBook::new();
        book.replace(vec![
            quote(1127, "Rune platebody", 38000, 38500),
            quote(1147, "Rune med helm", 11000, 11200),
            quote(1319, "Rune 2h sword", 37000, 37600),
        ])
        .await;
        book
    }

    #[tokio::test]
    async fn exact_match_ignores_case() {
        let found = book().await.find_by_name("RUNE MED HELM").await.unwrap();
        assert_eq!(found.item_id, 1147);
    }

    #[tokio::test]
    async fn falls_back_to_substring() {
        let found = book().await.find_by_name("2h").await.unwrap();
        assert_eq!(found.item_id, 1319);

        let first = book().await.find_by_name("rune").await.unwrap();
        assert_eq!(first.item_id, 1127);
    }

    #[tokio::test]
    async fn exact_match_beats_earlier_substring() {
        let book = QuoteBook::new();
        book.replace(vec![
            quote(1, "Shark lure", 10, 20),
            quote(385, "Shark", 900, 950),
        ])
        .await;

        assert_eq!(book.find_by_name("shark").await.unwrap().item_id, 385);
    }

    #[tokio::test]
    async fn miss_is_not_found() {
        assert_eq!(
            book().await.find_by_name("dragon").await,
            Err(LookupError::NotFound("dragon".to_string()))
        );
    }

    #[tokio::test]
    async fn rejects_bad_text_before_searching() {
        let book = book().await;

        assert_eq!(
            book.find_by_name("rune; drop").await,
            Err(LookupError::Validation(ValidationError::InvalidQuery(
                "rune; drop".to_string()
            )))
        );
        assert_eq!(
            book.find_by_name("   ").await,
            Err(LookupError::Validation(ValidationError::EmptyQuery))
        );
    }

    #[test]
    fn query_allows_item_punctuation() {
        assert_eq!(
            validate_query(" Zulrah's scales ").as_deref(),
            Ok("zulrah's scales")
        );
        assert!(validate_query("Pre-nature_amulet").is_ok());
    }

    #[tokio::test]
    async fn dose_suffix_matches_exactly() {
        let book = QuoteBook::new();
        book.replace(vec![
            quote(2434, "Prayer potion(4)", 9000, 9500),
            quote(139, "Prayer potion(3)", 7000, 7400),
        ])
        .await;

        let found = book.find_by_name("prayer potion(3)").await.unwrap();
        assert_eq!(found.item_id, 139);
    }
}
