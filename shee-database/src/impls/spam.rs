use crate::cache::spam_counter_key;
use crate::database::Database;

/// Count a message against the per-user fixed window and report whether the
/// user has gone over the spam limit.
///
/// The increment is a single atomic cache round-trip; the window TTL starts
/// with the first message and the counter resets itself on expiry.
pub async fn is_spam_burst(db: &Database, guild_id: u64, user_id: u64) -> anyhow::Result<bool> {
    let cache = db.cache();
    let key = spam_counter_key(cache, guild_id, user_id);
    let count = cache
        .increment_with_window(&key, cache.spam_window())
        .await?;

    Ok(count > cache.spam_message_limit())
}
