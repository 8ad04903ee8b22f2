use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-guild engagement configuration, managed by the admin command surface
/// and read by the scheduler and event handlers.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GuildConfig {
    pub id: i64,
    pub welcome_channel_id: Option<i64>,
    pub morning_message_channel_id: Option<i64>,
    /// Wall-clock send time as `HH:MM` (UTC).
    pub morning_message_time: Option<String>,
    pub random_chat_enabled: bool,
    pub random_chat_channels: Vec<i64>,
    pub random_chat_frequency_hours: Option<i64>,
}
