use std::sync::Arc;

use market::{QuoteBook, RedisRecordStore};
use serenity::all::ChannelId;
use tokio::sync::mpsc;

pub mod command;
pub mod config;
pub mod notifier;
pub mod scan;

/// Requests from commands to the session supervisor in `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Shutdown { channel: ChannelId },
    Restart { channel: ChannelId },
}

pub struct Data {
    pub store: Arc<RedisRecordStore>,
    pub book: QuoteBook,
    pub control: mpsc::UnboundedSender<Control>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;
