use std::{sync::Arc, time::Duration};

use anyhow::{Context as _, Result};
use bot::{
    Control, Data, command, config::Config, notifier::DiscordNotifier, scan::spawn_scanner,
};
use market::{PriceClient, QuoteBook, RedisRecordStore};
use poise::{Framework, FrameworkOptions};
use serenity::all::{ActivityData, ChannelId, Client, ClientBuilder, GatewayIntents, Http};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Why a Discord session ended.
enum SessionExit {
    Shutdown,
    Restart(ChannelId),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = Arc::new(
        RedisRecordStore::new(&config.redis_url, config.redis_key_prefix.clone())
            .await
            .context("init record store failed")?,
    );
    let price_client =
        PriceClient::new(config.summary_url.clone()).context("init price client failed")?;
    let book = QuoteBook::new();

    let http = Arc::new(Http::new(&config.discord_token));
    let channel = ChannelId::new(config.target_channel_id);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scanner = spawn_scanner(
        price_client,
        Arc::clone(&store),
        book.clone(),
        DiscordNotifier::new(Arc::clone(&http), channel),
        config.scan_config(),
        shutdown_rx,
    );

    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let mut announce: Option<ChannelId> = None;

    // The scanner outlives sessions; only the gateway connection is rebuilt.
    loop {
        let (session_tx, session_rx) = watch::channel(false);
        let data = Data {
            store: Arc::clone(&store),
            book: book.clone(),
            control: control_tx.clone(),
        };

        let mut client = build_client(&config, data, session_rx).await?;
        let shard_manager = client.shard_manager.clone();

        let session = tokio::spawn(async move {
            if let Err(why) = client.start().await {
                error!(error = ?why, "client error");
            }
        });

        if let Some(requested_in) = announce.take()
            && let Err(e) = requested_in.say(&http, "Bot restarted.").await
        {
            warn!(error = ?e, "could not announce restart");
        }

        let exit = tokio::select! {
            _ = shutdown_signal() => {
                info!("termination signal received");
                SessionExit::Shutdown
            }
            control = control_rx.recv() => match control {
                Some(Control::Restart { channel }) => SessionExit::Restart(channel),
                Some(Control::Shutdown { .. }) | None => SessionExit::Shutdown,
            },
        };

        let _ = session_tx.send(true);
        shard_manager.shutdown_all().await;
        if let Err(e) = session.await {
            warn!(error = ?e, "session task ended abnormally");
        }

        match exit {
            SessionExit::Restart(requested_in) => {
                info!("rebuilding discord session");
                announce = Some(requested_in);
            }
            SessionExit::Shutdown => break,
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = scanner.await {
        warn!(error = ?e, "scanner task ended abnormally");
    }

    store.close().await.context("closing record store failed")?;

    info!("Shutdown complete.");
    Ok(())
}

async fn build_client(
    config: &Config,
    data: Data,
    session: watch::Receiver<bool>,
) -> Result<Client> {
    let intents = GatewayIntents::non_privileged();
    let version = config.version.clone();
    let book = data.book.clone();

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: command::all(),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!(
                    user = %ready.user.name,
                    user_id = %ready.user.id,
                    "connected successfully"
                );

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                tokio::spawn(rotate_activity(ctx.clone(), version, book, session));

                Ok(data)
            })
        })
        .build();

    ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("creating discord client failed")
}

/// Alternate the activity line between the version and the tracked item
/// count until the session ends.
async fn rotate_activity(
    ctx: serenity::all::Context,
    version: String,
    book: QuoteBook,
    mut session: watch::Receiver<bool>,
) {
    let mut show_version = true;
    let mut tick = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = session.changed() => return,
        }

        let text = if show_version {
            if version.starts_with('v') {
                version.clone()
            } else {
                format!("Version - {}", version)
            }
        } else {
            format!("Tracking {} items", book.len().await)
        };

        ctx.set_activity(Some(ActivityData::custom(text)));
        show_version = !show_version;
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv()  => {},
                }
            }
            _ => {
                warn!("unix signal handlers unavailable, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
