use thiserror::Error;

/// Upstream price feed could not be read.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("price feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("price feed returned status {status}")]
    Status { status: u16 },

    #[error("price feed response is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure of a single-record store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    Read(String),

    #[error("store write failed: {0}")]
    Write(String),

    #[error("a record for item {item_id} already exists")]
    Duplicate { item_id: i64 },

    #[error("record for item {item_id} has no record key")]
    MissingKey { item_id: i64 },

    #[error("stored record could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("record rejected: {0}")]
    Invalid(#[from] ValidationError),
}

impl StoreError {
    pub(crate) fn read(err: impl std::fmt::Display) -> Self {
        Self::Read(err.to_string())
    }

    pub(crate) fn write(err: impl std::fmt::Display) -> Self {
        Self::Write(err.to_string())
    }
}

/// Malformed input, rejected before any store or network access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("item id must be non-negative, got {0}")]
    NegativeItemId(i64),

    #[error("item {item_id} has an empty name")]
    EmptyName { item_id: i64 },

    #[error("item {item_id}: {field} must be non-negative, got {value}")]
    NegativeField {
        item_id: i64,
        field: &'static str,
        value: i64,
    },

    #[error("search text is empty")]
    EmptyQuery,

    #[error("search text contains unsupported characters: {0}")]
    InvalidQuery(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no item matches '{0}'")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}

/// Fatal scan loop failure.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
