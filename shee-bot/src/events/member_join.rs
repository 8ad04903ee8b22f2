use poise::serenity_prelude as serenity;
use tracing::{error, info};

use shee_core::Data;
use shee_database::impls::guilds::get_guild_config;
use shee_utils::formatting::render_user_template;

/// Greet a new member with a pooled welcome template in the guild's
/// configured welcome channel.
pub async fn handle_member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) {
    let guild_id = member.guild_id;

    let config = match get_guild_config(&data.db, guild_id.get()).await {
        Ok(Some(config)) => config,
        Ok(None) => return,
        Err(source) => {
            error!(?source, guild_id = %guild_id, "failed to read guild config");
            return;
        }
    };

    let Some(channel_id) = config.welcome_channel_id else {
        return;
    };
    let Ok(channel_id) = u64::try_from(channel_id) else {
        return;
    };

    let pool = data.pools.welcome();
    match pool.allocate().await {
        Ok(template) => {
            let mention = format!("<@{}>", member.user.id.get());
            let greeting = render_user_template(&template.content, &mention);

            if let Err(source) = serenity::ChannelId::new(channel_id)
                .say(&ctx.http, greeting)
                .await
            {
                error!(?source, "failed to send welcome message");
            } else {
                info!(user_id = %member.user.id, guild_id = %guild_id, "welcomed new member");
            }
        }
        Err(source) => {
            error!(?source, "failed to allocate welcome template");
        }
    }

    pool.ensure_replenished().await;
}
