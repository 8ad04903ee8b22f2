use std::time::Duration;

use anyhow::Context as _;

use crate::cache::guild_config_list_key;
use crate::database::Database;
use crate::model::guild::GuildConfig;

/// The scheduler lists configs every tick; cache the listing briefly.
const GUILD_CONFIG_CACHE_TTL: Duration = Duration::from_secs(60);

const GUILD_CONFIG_COLUMNS: &str = "id, welcome_channel_id, morning_message_channel_id, \
     morning_message_time, random_chat_enabled, random_chat_channels, \
     random_chat_frequency_hours";

/// Fetch one guild's engagement config straight from the database.
pub async fn get_guild_config(
    db: &Database,
    guild_id: u64,
) -> anyhow::Result<Option<GuildConfig>> {
    let guild_id_i64 = i64::try_from(guild_id).context("guild_id out of i64 range")?;

    let row = sqlx::query_as::<_, GuildConfig>(&format!(
        "SELECT {GUILD_CONFIG_COLUMNS} FROM guilds WHERE id = $1"
    ))
    .bind(guild_id_i64)
    .fetch_optional(db.pool())
    .await?;

    Ok(row)
}

/// List every guild's engagement config, served from the cache when fresh.
pub async fn list_guild_configs(db: &Database) -> anyhow::Result<Vec<GuildConfig>> {
    let cache = db.cache();
    let key = guild_config_list_key(cache);

    cache
        .get_or_load_json(&key, GUILD_CONFIG_CACHE_TTL, || async {
            let rows = sqlx::query_as::<_, GuildConfig>(&format!(
                "SELECT {GUILD_CONFIG_COLUMNS} FROM guilds ORDER BY id"
            ))
            .fetch_all(db.pool())
            .await?;
            Ok(rows)
        })
        .await
}

/// Ensure a guilds row exists when the bot joins a guild. Existing settings
/// are left untouched.
pub async fn ensure_guild_row(db: &Database, guild_id: u64) -> anyhow::Result<()> {
    let guild_id_i64 = i64::try_from(guild_id).context("guild_id out of i64 range")?;

    sqlx::query("INSERT INTO guilds (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(guild_id_i64)
        .execute(db.pool())
        .await?;

    let key = guild_config_list_key(db.cache());
    db.cache().del(&key).await?;

    Ok(())
}
