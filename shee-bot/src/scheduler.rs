//! Periodic engagement work: per-guild morning messages at their configured
//! time, random-chat drops on a per-guild cadence, and a template-pool
//! replenishment sweep.
//!
//! Ticks are fire-and-forget; a tick that overlaps a slow predecessor is
//! harmless because the checks are cheap reads and replenishment guards
//! itself.

use std::collections::HashMap;
use std::time::Duration;

use poise::serenity_prelude as serenity;
use rand::Rng as _;
use tracing::{error, info, warn};

use shee_content::{PoolError, Pools, pool::MORNING_MOODS};
use shee_database::Database;
use shee_database::impls::guilds::list_guild_configs;
use shee_database::model::guild::GuildConfig;
use shee_llm::{GenerateOptions, LlmService, prompt};
use shee_utils::time::{day_number, now_unix_secs, parse_hhmm, seconds_since_midnight};

/// Tick cadence of the scheduler loop.
const TICK_INTERVAL: Duration = Duration::from_secs(60);
/// Replenishment sweep runs every this many ticks.
const REPLENISH_EVERY_TICKS: u64 = 10;
/// A morning send is considered due within this many seconds past its time.
const MORNING_GRACE_SECONDS: u64 = 120;

struct SchedulerState {
    /// Guild id -> UTC day number of the last morning send.
    morning_sent_on: HashMap<u64, u64>,
    /// Guild id -> unix seconds when the next random drop is due.
    random_due_at: HashMap<u64, u64>,
}

/// Spawn the scheduler loop for the lifetime of the process.
pub fn spawn(ctx: serenity::Context, db: Database, pools: Pools, llm: LlmService) {
    tokio::spawn(async move {
        run(ctx, db, pools, llm).await;
    });
}

async fn run(ctx: serenity::Context, db: Database, pools: Pools, llm: LlmService) {
    let mut state = SchedulerState {
        morning_sent_on: HashMap::new(),
        random_due_at: HashMap::new(),
    };
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut tick: u64 = 0;

    info!("scheduler started");

    loop {
        ticker.tick().await;
        tick += 1;

        let configs = match list_guild_configs(&db).await {
            Ok(configs) => configs,
            Err(source) => {
                error!(?source, "failed to list guild configs");
                continue;
            }
        };

        let now = now_unix_secs();

        for config in &configs {
            check_morning(&ctx, &pools, &llm, &mut state, config, now).await;
            check_random_chat(&ctx, &pools, &llm, &mut state, config, now).await;
        }

        if tick % REPLENISH_EVERY_TICKS == 0 {
            for pool in pools.all() {
                pool.ensure_replenished().await;
            }
        }
    }
}

async fn check_morning(
    ctx: &serenity::Context,
    pools: &Pools,
    llm: &LlmService,
    state: &mut SchedulerState,
    config: &GuildConfig,
    now: u64,
) {
    let Some(channel_id) = config.morning_message_channel_id else {
        return;
    };
    let Some(time_raw) = config.morning_message_time.as_deref() else {
        return;
    };
    let Some(target) = parse_hhmm(time_raw) else {
        warn!(guild_id = config.id, time = time_raw, "unparseable morning time");
        return;
    };

    let guild_id = config.id as u64;
    let last_sent = state.morning_sent_on.get(&guild_id).copied();
    if !morning_due(now, target, last_sent) {
        return;
    }

    let mood = pick_mood();
    let Ok(channel_id) = u64::try_from(channel_id) else {
        return;
    };

    if send_pooled_message(ctx, pools, llm, channel_id, mood).await {
        state.morning_sent_on.insert(guild_id, day_number(now));
        info!(guild_id, mood, "morning message sent");
    }
}

async fn check_random_chat(
    ctx: &serenity::Context,
    pools: &Pools,
    llm: &LlmService,
    state: &mut SchedulerState,
    config: &GuildConfig,
    now: u64,
) {
    if !config.random_chat_enabled || config.random_chat_channels.is_empty() {
        return;
    }
    let Some(frequency_hours) = config.random_chat_frequency_hours else {
        return;
    };
    if frequency_hours <= 0 {
        return;
    }

    let guild_id = config.id as u64;
    let interval_seconds = frequency_hours as u64 * 3_600;

    // First sighting of a guild schedules its first drop a full interval out.
    let due = *state
        .random_due_at
        .entry(guild_id)
        .or_insert(now + interval_seconds);
    if now < due {
        return;
    }

    let (channel_id, mood) = {
        let mut rng = rand::rng();
        let index = rng.random_range(0..config.random_chat_channels.len());
        (config.random_chat_channels[index], pick_mood())
    };
    let Ok(channel_id) = u64::try_from(channel_id) else {
        return;
    };

    if send_pooled_message(ctx, pools, llm, channel_id, mood).await {
        state.random_due_at.insert(guild_id, now + interval_seconds);
        info!(guild_id, mood, "random chat message sent");
    }
}

/// Send a morning-pool template to a channel, generating a one-off message
/// when the pool for that mood is empty.
async fn send_pooled_message(
    ctx: &serenity::Context,
    pools: &Pools,
    llm: &LlmService,
    channel_id: u64,
    mood: &str,
) -> bool {
    let content = match pools.morning(mood).allocate().await {
        Ok(template) => template.content,
        Err(PoolError::Empty) => {
            // Expected for a cold pool; serve this send ad hoc.
            match llm
                .generate(&prompt::morning_single_prompt(mood), &GenerateOptions::default())
                .await
            {
                Ok(text) => text,
                Err(source) => {
                    warn!(%source, "ad-hoc morning generation failed; skipping send");
                    return false;
                }
            }
        }
        Err(source) => {
            error!(?source, "failed to allocate morning template");
            return false;
        }
    };

    if let Err(source) = serenity::ChannelId::new(channel_id)
        .say(&ctx.http, content)
        .await
    {
        error!(?source, channel_id, "failed to send scheduled message");
        return false;
    }

    true
}

fn pick_mood() -> &'static str {
    let index = rand::rng().random_range(0..MORNING_MOODS.len());
    MORNING_MOODS[index]
}

/// A morning send is due when the wall clock is inside the grace window past
/// the configured time and nothing was sent today.
fn morning_due(now: u64, target_seconds: u64, last_sent_day: Option<u64>) -> bool {
    if last_sent_day == Some(day_number(now)) {
        return false;
    }

    let since_midnight = seconds_since_midnight(now);
    since_midnight >= target_seconds
        && since_midnight < target_seconds + MORNING_GRACE_SECONDS
}

#[cfg(test)]
mod tests {
    use super::{MORNING_GRACE_SECONDS, morning_due};
    use shee_utils::time::day_number;

    // Day 100, 07:30:00 UTC.
    const NOW: u64 = 100 * 86_400 + 27_000;
    const TARGET: u64 = 27_000;

    #[test]
    fn due_inside_window_when_unsent() {
        assert!(morning_due(NOW, TARGET, None));
        assert!(morning_due(NOW + MORNING_GRACE_SECONDS - 1, TARGET, None));
    }

    #[test]
    fn not_due_outside_window() {
        assert!(!morning_due(NOW - 60, TARGET, None));
        assert!(!morning_due(NOW + MORNING_GRACE_SECONDS, TARGET, None));
    }

    #[test]
    fn not_due_twice_in_one_day() {
        assert!(!morning_due(NOW + 60, TARGET, Some(day_number(NOW))));
        // Yesterday's send does not block today.
        assert!(morning_due(NOW, TARGET, Some(day_number(NOW) - 1)));
    }
}
