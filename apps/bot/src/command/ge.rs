use market::format::{format_last_updated, shorten_gp};
use market::lookup::{ItemView, PriceView, matching_record};
use market::{LookupError, RecordStore};
use poise::CreateReply;
use serenity::all::{CreateEmbed, CreateEmbedFooter};
use tracing::{debug, info, warn};

use crate::{Context, Error};

const SPRITE_URL: &str = "https://secure.runescape.com/m=itemdb_oldschool/obj_sprite.gif?id=";
const BIG_SPRITE_URL: &str = "https://secure.runescape.com/m=itemdb_oldschool/obj_big.gif?id=";

/// Look up the current price of an item
#[poise::command(slash_command)]
pub async fn ge(
    ctx: Context<'_>,
    #[description = "Item name, or part of it (e.g. rune platebody)"] name: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let data = ctx.data();
    let user_id = ctx.author().id.get();
    debug!(user_id, query = %name, "ge: invoked");

    let quote = match data.book.find_by_name(&name).await {
        Ok(q) => q,
        Err(LookupError::Validation(e)) => {
            debug!(error = %e, "rejected search text");
            ctx.say(format!("Issue trying to find: {}", name.trim()))
                .await?;
            return Ok(());
        }
        Err(LookupError::NotFound(text)) => {
            debug!(query = %text, "no matching item");
            ctx.say(format!("No item found matching: {text}")).await?;
            return Ok(());
        }
    };

    info!(user_id, item_id = quote.item_id, item = %quote.name, "ge: item found");

    let records = match data.store.find_by_item_id(quote.item_id).await {
        Ok(r) => r,
        Err(e) => {
            warn!(item_id = quote.item_id, error = %e, "stored record unavailable");
            Vec::new()
        }
    };

    let view = ItemView::build(quote.clone(), matching_record(&records, &quote));

    ctx.send(CreateReply::default().embed(item_embed(&view)))
        .await?;

    Ok(())
}

fn item_embed(view: &ItemView) -> CreateEmbed {
    let item = &view.quote;

    CreateEmbed::default()
        .title(&item.name)
        .description("✅ = Recent data.\n❓ = Last known data.\n❌ = No data, needs more time.")
        .color(0x00ff00)
        .fields(item_fields(view))
        .thumbnail(format!("{BIG_SPRITE_URL}{}", item.item_id))
        .image(format!("{SPRITE_URL}{}", item.item_id))
        .footer(CreateEmbedFooter::new("Prices refresh every scan cycle."))
}

fn item_fields(view: &ItemView) -> Vec<(&'static str, String, bool)> {
    let item = &view.quote;

    let profit = match view.margin {
        Some(m) => format!("{} gp\n{:.2}%", m.profit, m.percent),
        None => "No data".to_string(),
    };

    vec![
        ("Item ID", item.item_id.to_string(), true),
        (
            "Members Only",
            if item.members_only { "Yes" } else { "No" }.to_string(),
            true,
        ),
        ("Shop Price", format!("{} gp", item.shop_price), true),
        ("Approx Avg Profit", profit, true),
        ("Buy Price Avg", price_text(&view.buy), true),
        ("Sell Price Avg", price_text(&view.sell), true),
        ("Buy Quantity", item.buy_quantity.to_string(), true),
        ("Sell Quantity", item.sell_quantity.to_string(), true),
        ("Last Updated", format_last_updated(view.last_updated), true),
    ]
}

fn price_text(price: &PriceView) -> String {
    format!(
        "{} gp {}\n{}",
        price.value,
        price.freshness.marker(),
        shorten_gp(price.value)
    )
}
