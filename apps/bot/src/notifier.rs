use std::sync::Arc;

use market::{Notifier, NotifyError};
use serenity::all::{ChannelId, Http};

/// Posts plain text alerts into one channel through the REST API, so it
/// keeps working while the gateway session is being rebuilt.
#[derive(Clone)]
pub struct DiscordNotifier {
    http: Arc<Http>,
    channel: ChannelId,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }
}

impl Notifier for DiscordNotifier {
    async fn send_plain(&self, text: &str) -> Result<(), NotifyError> {
        self.channel
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}
