mod events;
mod scheduler;

use std::env;
use std::time::Duration;

use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use rustls::crypto::ring::default_provider;
use sqlx::postgres::PgPoolOptions;

use shee_content::Pools;
use shee_core::{Data, Error};
use shee_database::{
    CacheService, Database, MIGRATOR, cache::DEFAULT_SPAM_MESSAGE_LIMIT,
    cache::DEFAULT_SPAM_WINDOW,
};
use shee_database::impls::guilds::ensure_guild_row;
use shee_llm::LlmService;
use shee_moderation::ViolationDetector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter_fn(|metadata| {
        let target = metadata.target();

        let within_info_level = *metadata.level() <= tracing::Level::INFO;
        if !within_info_level {
            return false;
        }

        !(target.starts_with("serenity::gateway::bridge::shard_manager")
            || target.starts_with("serenity::gateway::bridge::shard_runner"))
    }));

    tracing_subscriber::registry().with(fmt_layer).init();

    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls ring provider"))?;

    // Load the .env file
    dotenvy::dotenv().ok();

    let token = env::var("DISCORD_TOKEN")?;
    let database_url = env::var("DATABASE_URL")?;

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    info!("PostgreSQL connection established.");

    let redis_enabled = env_bool("REDIS_ENABLED", false);
    let redis_key_prefix = env::var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "shee:prod".to_string());

    let mut cache = if redis_enabled {
        match env::var("REDIS_URL") {
            Ok(redis_url) => match CacheService::redis(&redis_url, redis_key_prefix.clone()) {
                Ok(cache) => {
                    info!(key_prefix = %redis_key_prefix, "Redis cache enabled.");
                    cache
                }
                Err(err) => {
                    warn!(?err, key_prefix = %redis_key_prefix, "Failed to initialize Redis cache; continuing with DB-only mode.");
                    CacheService::disabled(redis_key_prefix.clone())
                }
            },
            Err(_) => {
                warn!(key_prefix = %redis_key_prefix, "REDIS_ENABLED=true but REDIS_URL is missing; continuing with DB-only mode.");
                CacheService::disabled(redis_key_prefix.clone())
            }
        }
    } else {
        info!("Redis cache disabled (set REDIS_ENABLED=true to enable).");
        CacheService::disabled(redis_key_prefix.clone())
    };

    let spam_window_seconds = env_u64("SPAM_WINDOW_SECONDS", DEFAULT_SPAM_WINDOW.as_secs());
    let spam_message_limit = env_u64("SPAM_MESSAGE_LIMIT", DEFAULT_SPAM_MESSAGE_LIMIT);
    cache.configure_spam_limit(
        Duration::from_secs(spam_window_seconds),
        spam_message_limit,
    );
    info!(
        spam_window_seconds = cache.spam_window().as_secs(),
        spam_message_limit = cache.spam_message_limit(),
        "Spam limiter configured."
    );

    if cache.is_redis_enabled() {
        if let Err(err) = cache.ping().await {
            warn!(
                ?err,
                "Redis cache ping failed; cache operations will continue with fallback behavior."
            );
        } else {
            info!("Redis cache health check passed.");
        }
    }

    let db = Database::with_cache(db_pool, cache);

    let llm = LlmService::from_env()?;
    info!("Generation client ready.");

    let auto_run_migrations = env_bool("AUTO_RUN_MIGRATIONS", true);
    if auto_run_migrations {
        MIGRATOR.run(db.pool()).await?;
        info!("Database migrations applied.");
    } else {
        info!("Auto migrations disabled (set AUTO_RUN_MIGRATIONS=true to run at startup).");
    }

    let pools = Pools::new(db.clone(), llm.clone());
    let detector = ViolationDetector::new()?;

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![],
            event_handler: |ctx, event, framework, data| {
                Box::pin(handle_event(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            prefix_options: poise::PrefixFrameworkOptions {
                mention_as_prefix: false,
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, _framework| {
            let scheduler_db = db.clone();
            let scheduler_pools = pools.clone();
            let scheduler_llm = llm.clone();
            let scheduler_ctx = ctx.clone();
            Box::pin(async move {
                info!("Shee has awoken!");

                scheduler::spawn(scheduler_ctx, scheduler_db, scheduler_pools, scheduler_llm);

                Ok(Data {
                    db,
                    llm,
                    pools,
                    detector,
                })
            })
        })
        .build();

    info!("Shee is connecting...");

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    client.start().await?;
    Ok(())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::UnknownCommand { .. } => {
            debug!("unknown command invocation");
        }
        other => {
            error!(?other, "framework error");
        }
    }
}

async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            // Moderation wins: a violating message is removed, not replied to.
            let violated = events::moderation::handle_message_moderation(ctx, data, new_message).await;
            if !violated {
                events::mention::handle_message_mention(ctx, data, new_message).await;
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            events::member_join::handle_member_join(ctx, data, new_member).await;
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            if let Err(source) = ensure_guild_row(&data.db, guild.id.get()).await {
                error!(?source, guild_id = %guild.id, "failed to ensure guild row");
            }
        }
        _ => {}
    }

    Ok(())
}
