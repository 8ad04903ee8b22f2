use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;

use crate::database::Database;

/// Ledger issuer for soft (reminder) warnings.
pub const ISSUER_SOFT: &str = "soft-system";
/// Ledger issuer for escalated (timeout) actions.
pub const ISSUER_ESCALATION: &str = "escalation-system";

/// Append a warning to the ledger. Rows are never updated or deleted.
pub async fn record_warning(
    db: &Database,
    guild_id: u64,
    user_id: u64,
    warned_by: &str,
    reason: &str,
    severity: i32,
) -> anyhow::Result<()> {
    let guild_id_i64 = i64::try_from(guild_id).context("guild_id out of i64 range")?;
    let user_id_i64 = i64::try_from(user_id).context("user_id out of i64 range")?;
    let created_at = now_unix_secs();

    sqlx::query(
        "INSERT INTO user_warnings (guild_id, user_id, warned_by, reason, severity, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(guild_id_i64)
    .bind(user_id_i64)
    .bind(warned_by)
    .bind(reason)
    .bind(severity)
    .bind(created_at)
    .execute(db.pool())
    .await?;

    Ok(())
}

/// Count soft-system warnings for a user within a trailing window.
///
/// The escalation decision derives this fresh from the ledger on every
/// violation rather than keeping a counter column.
pub async fn count_soft_warnings_in_window(
    db: &Database,
    guild_id: u64,
    user_id: u64,
    window_seconds: i64,
) -> anyhow::Result<i64> {
    let guild_id_i64 = i64::try_from(guild_id).context("guild_id out of i64 range")?;
    let user_id_i64 = i64::try_from(user_id).context("user_id out of i64 range")?;
    let since = now_unix_secs() - window_seconds;

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_warnings
         WHERE guild_id = $1 AND user_id = $2 AND warned_by = $3 AND created_at >= $4",
    )
    .bind(guild_id_i64)
    .bind(user_id_i64)
    .bind(ISSUER_SOFT)
    .bind(since)
    .fetch_one(db.pool())
    .await?;

    Ok(count)
}

fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs()) as i64
}
