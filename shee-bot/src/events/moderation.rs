use poise::serenity_prelude as serenity;

use shee_core::Data;
use shee_moderation::escalation::handle_violation;

/// Run an inbound message through the violation detectors and, on a hit,
/// the escalation engine. Returns true if the message was a violation.
pub async fn handle_message_moderation(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> bool {
    // Ignore bots and webhooks.
    if message.author.bot || message.webhook_id.is_some() {
        return false;
    }

    let Some(guild_id) = message.guild_id else {
        return false;
    };

    let Some(violation) = data
        .detector
        .detect(
            &data.db,
            guild_id.get(),
            message.author.id.get(),
            &message.content,
        )
        .await
    else {
        return false;
    };

    handle_violation(&ctx.http, &data.db, &data.pools, message, violation).await;
    true
}
