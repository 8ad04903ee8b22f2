//! Warning-escalation state machine.
//!
//! Every detected violation lands here: the offending message is removed,
//! the user's recent soft warnings are counted from the ledger, and the
//! violation becomes either a soft warning (templated reminder) or an
//! escalation (timeout). Moderation side effects are best-effort; nothing
//! in this module propagates an error into the message-handling path.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};

use shee_content::{Pools, ViolationType};
use shee_database::Database;
use shee_database::impls::warnings::{
    ISSUER_ESCALATION, ISSUER_SOFT, count_soft_warnings_in_window, record_warning,
};
use shee_utils::embed::build_notification_embed;
use shee_utils::formatting::{format_compact_duration, render_user_template};

/// Soft warnings within the window before a violation escalates.
pub const WARNING_THRESHOLD: i64 = 3;
/// Trailing window the ledger is counted over.
pub const WARNING_WINDOW_SECONDS: i64 = 7 * 86_400;
/// Timeout applied on escalation.
pub const ESCALATION_TIMEOUT: Duration = Duration::from_secs(600);

/// True when this violation, counted on top of the user's prior soft
/// warnings, reaches the escalation threshold. With a threshold of 3, two
/// prior warnings mean the third offense is the timeout.
pub fn should_escalate(prior_soft_warnings: i64) -> bool {
    prior_soft_warnings + 1 >= WARNING_THRESHOLD
}

/// Act on a detected violation: delete, then soft-warn or escalate.
pub async fn handle_violation(
    http: &serenity::Http,
    db: &Database,
    pools: &Pools,
    message: &serenity::Message,
    violation: ViolationType,
) {
    let Some(guild_id) = message.guild_id else {
        return;
    };

    // Remove the offending message first; everything else is follow-up.
    if let Err(source) = message.delete(http).await {
        if is_missing_permissions(&source) {
            warn!("missing permissions to delete violating message");
        } else {
            error!(?source, "failed to delete violating message");
        }
    }

    // Links stay on the soft path and never touch the ledger, so they can
    // never push a user over the escalation threshold.
    if violation == ViolationType::Link {
        soft_warn(http, db, pools, message, guild_id, violation, false).await;
        return;
    }

    let prior = match count_soft_warnings_in_window(
        db,
        guild_id.get(),
        message.author.id.get(),
        WARNING_WINDOW_SECONDS,
    )
    .await
    {
        Ok(count) => count,
        Err(source) => {
            error!(?source, "failed to count warnings; treating as none");
            0
        }
    };

    if should_escalate(prior) {
        escalate(http, db, message, guild_id, violation, prior).await;
    } else {
        soft_warn(http, db, pools, message, guild_id, violation, true).await;
    }
}

/// Send a templated reminder and (optionally) append a soft ledger row.
async fn soft_warn(
    http: &serenity::Http,
    db: &Database,
    pools: &Pools,
    message: &serenity::Message,
    guild_id: serenity::GuildId,
    violation: ViolationType,
    record_ledger: bool,
) {
    let pool = pools.warning(violation);

    let template = match pool.allocate().await {
        Ok(template) => template,
        Err(source) => {
            error!(?source, %violation, "failed to allocate warning template");
            return;
        }
    };

    let mention = format!("<@{}>", message.author.id.get());
    let warning_text = render_user_template(&template.content, &mention);

    if let Err(source) = message.channel_id.say(http, warning_text).await {
        error!(?source, "failed to send warning message");
    }

    // Top up the pool in the background while we're here.
    pool.ensure_replenished().await;

    if record_ledger {
        let reason = format!("{violation} violation");
        if let Err(source) = record_warning(
            db,
            guild_id.get(),
            message.author.id.get(),
            ISSUER_SOFT,
            &reason,
            template.severity,
        )
        .await
        {
            error!(?source, "failed to record soft warning");
        }
    }
}

/// Apply the timeout, announce it, and append the escalation ledger row.
async fn escalate(
    http: &serenity::Http,
    db: &Database,
    message: &serenity::Message,
    guild_id: serenity::GuildId,
    violation: ViolationType,
    prior_warnings: i64,
) {
    info!(
        user_id = %message.author.id,
        guild_id = %guild_id,
        %violation,
        prior_warnings,
        "escalation threshold reached; applying timeout"
    );

    let until_system_time = SystemTime::now()
        .checked_add(ESCALATION_TIMEOUT)
        .unwrap_or(SystemTime::now());
    let until_unix = until_system_time
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs()) as i64;

    if let Ok(until) = serenity::Timestamp::from_unix_timestamp(until_unix) {
        let edit = serenity::EditMember::new().disable_communication_until_datetime(until);
        if let Err(source) = guild_id.edit_member(http, message.author.id, edit).await {
            if is_missing_permissions(&source) {
                warn!(
                    user_id = %message.author.id,
                    "missing permissions to timeout user (check role hierarchy)"
                );
            } else {
                error!(?source, "failed to timeout user");
            }
        }
    }

    let description = format!(
        "<@{}> has been timed out for {} after repeated {} violations.",
        message.author.id.get(),
        format_compact_duration(ESCALATION_TIMEOUT.as_secs()),
        violation
    );
    let embed = build_notification_embed("Member Timed Out", description);

    if let Err(source) = message
        .channel_id
        .send_message(http, serenity::CreateMessage::new().embed(embed))
        .await
    {
        error!(?source, "failed to send escalation notification");
    }

    let reason = format!("Auto-escalation: repeated {violation} violations");
    if let Err(source) = record_warning(
        db,
        guild_id.get(),
        message.author.id.get(),
        ISSUER_ESCALATION,
        &reason,
        3,
    )
    .await
    {
        error!(?source, "failed to record escalation");
    }
}

fn is_missing_permissions(source: &serenity::Error) -> bool {
    matches!(
        source,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 403 || response.error.code == 50013
    )
}

#[cfg(test)]
mod tests {
    use super::{WARNING_THRESHOLD, should_escalate};

    #[test]
    fn escalates_at_threshold() {
        assert!(!should_escalate(0));
        assert!(!should_escalate(WARNING_THRESHOLD - 2));
        assert!(should_escalate(WARNING_THRESHOLD - 1));
        assert!(should_escalate(WARNING_THRESHOLD + 5));
    }

    // With the default threshold of 3: warnings 1 and 2 are soft, the third
    // offense (two prior ledger rows) is the timeout.
    #[test]
    fn third_violation_escalates() {
        assert!(!should_escalate(1));
        assert!(should_escalate(2));
    }
}
