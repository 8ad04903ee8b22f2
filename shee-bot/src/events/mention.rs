use poise::serenity_prelude as serenity;
use tracing::warn;

use shee_core::Data;
use shee_llm::GenerateOptions;
use shee_llm::prompt::{FALLBACK_REPLY, mention_reply_prompt};

/// Reply in persona when a member mentions the bot. Generation failures fall
/// back to a fixed apology so the mention never goes unanswered.
pub async fn handle_message_mention(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) {
    if message.author.bot || message.webhook_id.is_some() {
        return;
    }
    if message.guild_id.is_none() {
        return;
    }

    let bot_id = ctx.cache.current_user().id;
    if !message.mentions.iter().any(|user| user.id == bot_id) {
        return;
    }

    let stripped = strip_mentions(&message.content, bot_id.get());
    let prompt_text = if stripped.is_empty() {
        "halo!"
    } else {
        stripped.as_str()
    };

    let author_name = message
        .author
        .global_name
        .as_deref()
        .unwrap_or(&message.author.name);
    let prompt = mention_reply_prompt(author_name, prompt_text);

    let reply = match data.llm.generate(&prompt, &GenerateOptions::default()).await {
        Ok(text) => text,
        Err(source) => {
            warn!(%source, "mention reply generation failed; using fallback");
            FALLBACK_REPLY.to_owned()
        }
    };

    if let Err(source) = message.reply(&ctx.http, reply).await {
        warn!(?source, "failed to send mention reply");
    }
}

fn strip_mentions(content: &str, bot_id: u64) -> String {
    content
        .replace(&format!("<@{bot_id}>"), "")
        .replace(&format!("<@!{bot_id}>"), "")
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::strip_mentions;

    #[test]
    fn strips_bot_mentions() {
        assert_eq!(strip_mentions("<@42> halo shee", 42), "halo shee");
        assert_eq!(strip_mentions("<@!42> apa kabar?", 42), "apa kabar?");
        assert_eq!(strip_mentions("<@42>", 42), "");
        assert_eq!(strip_mentions("tanya <@42> dong", 42), "tanya  dong");
    }
}
