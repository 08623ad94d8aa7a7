//! The periodic fetch, reconcile, evaluate and notify cycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::detector::{Detector, Thresholds};
use crate::error::{FetchError, NotifyError, ScanError};
use crate::model::Quote;
use crate::quote_book::QuoteBook;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::store::RecordStore;

/// Upstream feed. Every call returns the full snapshot, not a delta.
pub trait QuoteSource: Send + Sync {
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Quote>, FetchError>> + Send;
}

/// Outbound side for alert text. Presentation beyond plain text is up to the
/// implementation.
pub trait Notifier: Send + Sync {
    fn send_plain(&self, text: &str) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// Sleep between cycles.
    pub interval: Duration,
    /// Delay between two notifications of the same cycle.
    pub pacing: Duration,
    pub thresholds: Thresholds,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub reconcile: ReconcileReport,
    pub events: usize,
    pub notified: usize,
    /// Shutdown was observed part way; remaining events were dropped.
    pub cancelled: bool,
}

/// Owns everything one scan cycle touches: the source, the reconciler over
/// the shared store, the notification cache and the outbound notifier.
pub struct Scanner<Q, S, N> {
    source: Q,
    reconciler: Reconciler<S>,
    detector: Detector,
    notifier: N,
    book: QuoteBook,
    config: ScanConfig,
}

impl<Q, S, N> Scanner<Q, S, N>
where
    Q: QuoteSource,
    S: RecordStore,
    N: Notifier,
{
    pub fn new(source: Q, store: Arc<S>, notifier: N, book: QuoteBook, config: ScanConfig) -> Self {
        Self {
            source,
            reconciler: Reconciler::new(store),
            detector: Detector::new(config.thresholds),
            notifier,
            book,
            config,
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Loop until shutdown is signalled or a fetch fails.
    ///
    /// Shutdown is honoured at suspension points: before a fetch, between
    /// notifications and while sleeping. An in-flight fetch or store write
    /// runs to completion.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ScanError> {
        info!(
            interval = ?self.config.interval,
            pacing = ?self.config.pacing,
            "scanner started"
        );

        loop {
            let report = self.run_cycle(&mut shutdown).await?;

            if report.cancelled || pause(self.config.interval, &mut shutdown).await {
                info!("scanner stopped");
                return Ok(());
            }
        }
    }

    #[instrument(name = "scan_cycle", skip_all)]
    pub async fn run_cycle(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<CycleReport, ScanError> {
        let mut report = CycleReport::default();

        if *shutdown.borrow() {
            report.cancelled = true;
            return Ok(report);
        }

        let quotes = match self.source.fetch_all().await {
            Ok(q) => q,
            Err(e) => {
                error!(error = %e, "price fetch failed");
                return Err(e.into());
            }
        };
        report.fetched = quotes.len();

        self.book.replace(quotes.clone()).await;
        report.reconcile = self.reconciler.reconcile(&quotes).await;

        // evaluation caches every event's snapshot; an undelivered event is
        // not retried until the item's averages move again
        let events = self.detector.evaluate(&quotes);
        report.events = events.len();
        debug!(
            events = events.len(),
            cached = self.detector.cache().len(),
            "evaluated quotes"
        );

        for (i, event) in events.iter().enumerate() {
            if i > 0 && pause(self.config.pacing, shutdown).await {
                report.cancelled = true;
                break;
            }

            match self.notifier.send_plain(&event.message()).await {
                Ok(()) => report.notified += 1,
                Err(e) => warn!(
                    item_id = event.quote.item_id,
                    kind = ?event.kind,
                    error = %e,
                    "notification not delivered"
                ),
            }
        }

        info!(
            fetched = report.fetched,
            events = report.events,
            notified = report.notified,
            "cycle complete"
        );

        Ok(report)
    }
}

/// Sleep for `duration`. Returns true as soon as shutdown is signalled.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // sender gone, nobody can cancel anymore
                    (&mut sleep).await;
                    return false;
                }
                if *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}
