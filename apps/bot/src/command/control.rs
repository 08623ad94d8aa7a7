use anyhow::Context as _;
use tracing::info;

use crate::{Context, Control, Error};

/// Stop the bot and the price scanner
#[poise::command(slash_command, owners_only)]
pub async fn shutdown(ctx: Context<'_>) -> Result<(), Error> {
    let channel = ctx.channel_id();
    info!(user_id = ctx.author().id.get(), %channel, "shutdown: requested");

    ctx.say("Alright, I'll go to sleep.").await?;

    ctx.data()
        .control
        .send(Control::Shutdown { channel })
        .context("supervisor is gone")?;

    Ok(())
}

/// Reconnect the Discord session; price tracking keeps running
#[poise::command(slash_command, owners_only)]
pub async fn restart(ctx: Context<'_>) -> Result<(), Error> {
    let channel = ctx.channel_id();
    info!(user_id = ctx.author().id.get(), %channel, "restart: requested");

    ctx.say("Bot restarting...").await?;

    ctx.data()
        .control
        .send(Control::Restart { channel })
        .context("supervisor is gone")?;

    Ok(())
}
