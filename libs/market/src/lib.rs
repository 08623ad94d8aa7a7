mod error;
mod model;
mod price_client;
mod quote_book;
mod reconciler;

pub mod detector;
pub mod format;
pub mod lookup;
pub mod scanner;
pub mod store;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use detector::{Detector, EventKind, Margin, NotificationEvent, Thresholds};
pub use error::{
    FetchError, LookupError, NotifyError, ScanError, StoreError, ValidationError,
};
pub use model::{PriceRecord, Quote, RecordKey};
pub use price_client::{DEFAULT_SUMMARY_URL, PriceClient, parse_summary};
pub use quote_book::{QuoteBook, validate_query};
pub use reconciler::{ReconcileReport, Reconciler};
pub use scanner::{CycleReport, Notifier, QuoteSource, ScanConfig, Scanner};
pub use store::{RecordStore, RedisRecordStore};
