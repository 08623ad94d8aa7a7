use std::sync::Arc;

use market::{Notifier, PriceClient, QuoteBook, RedisRecordStore, ScanConfig, Scanner};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};
use tracing_futures::Instrument;

use crate::notifier::DiscordNotifier;

/// Run the price scanner in the background for the lifetime of the process.
///
/// A fetch failure ends the scanner; it is reported in the notification
/// channel since tracking is stalled from then on.
pub fn spawn_scanner(
    price_client: PriceClient,
    store: Arc<RedisRecordStore>,
    book: QuoteBook,
    notifier: DiscordNotifier,
    config: ScanConfig,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let span = tracing::info_span!("scanner", channel_id = %notifier.channel());
    let status = notifier.clone();

    tokio::spawn(
        async move {
            let mut scanner = Scanner::new(price_client, store, notifier, book, config);

            match scanner.run(shutdown).await {
                Ok(()) => info!("scanner finished"),
                Err(e) => {
                    error!(error = %e, "scanner stopped on fetch failure");

                    let text = format!("⚠️ Price tracking stopped: {e}");
                    if let Err(e) = status.send_plain(&text).await {
                        warn!(error = %e, "could not report scanner failure");
                    }
                }
            }
        }
        .instrument(span),
    )
}
