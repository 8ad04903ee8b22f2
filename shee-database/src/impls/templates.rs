use anyhow::Context as _;

use crate::database::Database;
use crate::model::template::{Template, WarningTemplate};

fn now_unix_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs()) as i64
}

// ---------------------------------------------------------------------------
// Least-used allocation
//
// Selection and the usage bump happen in one statement so two concurrent
// allocations cannot hand out the same row. Order: ascending used_count,
// then last_used_at with never-used rows first.
// ---------------------------------------------------------------------------

/// Allocate the least-used welcome template, bumping its usage stats.
pub async fn allocate_welcome_template(db: &Database) -> anyhow::Result<Option<Template>> {
    let row = sqlx::query_as::<_, Template>(
        "UPDATE welcome_templates
         SET used_count = used_count + 1, last_used_at = $1
         WHERE id = (
             SELECT id FROM welcome_templates
             ORDER BY used_count ASC, last_used_at ASC NULLS FIRST, id ASC
             LIMIT 1
         )
         RETURNING id, content, used_count, last_used_at",
    )
    .bind(now_unix_secs())
    .fetch_optional(db.pool())
    .await?;

    Ok(row)
}

/// Allocate the least-used morning template, optionally filtered by mood tag.
pub async fn allocate_morning_template(
    db: &Database,
    mood: Option<&str>,
) -> anyhow::Result<Option<Template>> {
    let row = sqlx::query_as::<_, Template>(
        "UPDATE morning_message_templates
         SET used_count = used_count + 1, last_used_at = $1
         WHERE id = (
             SELECT id FROM morning_message_templates
             WHERE $2::text IS NULL OR mood_tag = $2
             ORDER BY used_count ASC, last_used_at ASC NULLS FIRST, id ASC
             LIMIT 1
         )
         RETURNING id, content, used_count, last_used_at",
    )
    .bind(now_unix_secs())
    .bind(mood)
    .fetch_optional(db.pool())
    .await?;

    Ok(row)
}

/// Allocate the least-used warning template for a violation type.
pub async fn allocate_warning_template(
    db: &Database,
    violation_type: &str,
) -> anyhow::Result<Option<WarningTemplate>> {
    let row = sqlx::query_as::<_, WarningTemplate>(
        "UPDATE warning_templates
         SET used_count = used_count + 1, last_used_at = $1
         WHERE id = (
             SELECT id FROM warning_templates
             WHERE violation_type = $2
             ORDER BY used_count ASC, last_used_at ASC NULLS FIRST, id ASC
             LIMIT 1
         )
         RETURNING id, violation_type, content, severity, used_count, last_used_at",
    )
    .bind(now_unix_secs())
    .bind(violation_type)
    .fetch_optional(db.pool())
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// Freshness counts (replenishment checks)
// ---------------------------------------------------------------------------

/// Count welcome templates still under the usage threshold.
pub async fn count_fresh_welcome_templates(
    db: &Database,
    usage_threshold: i64,
) -> anyhow::Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM welcome_templates WHERE used_count < $1")
            .bind(usage_threshold)
            .fetch_one(db.pool())
            .await?;

    Ok(count)
}

/// Count morning templates still under the usage threshold for a mood.
pub async fn count_fresh_morning_templates(
    db: &Database,
    mood: Option<&str>,
    usage_threshold: i64,
) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM morning_message_templates
         WHERE used_count < $1 AND ($2::text IS NULL OR mood_tag = $2)",
    )
    .bind(usage_threshold)
    .bind(mood)
    .fetch_one(db.pool())
    .await?;

    Ok(count)
}

/// Count warning templates still under the usage threshold for a type.
pub async fn count_fresh_warning_templates(
    db: &Database,
    violation_type: &str,
    usage_threshold: i64,
) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM warning_templates WHERE used_count < $1 AND violation_type = $2",
    )
    .bind(usage_threshold)
    .bind(violation_type)
    .fetch_one(db.pool())
    .await?;

    Ok(count)
}

/// Total warning templates for a type, regardless of usage (seed check).
pub async fn count_warning_templates(db: &Database, violation_type: &str) -> anyhow::Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM warning_templates WHERE violation_type = $1")
            .bind(violation_type)
            .fetch_one(db.pool())
            .await?;

    Ok(count)
}

// ---------------------------------------------------------------------------
// Inserts (generated batches, seeds)
// ---------------------------------------------------------------------------

/// Insert a batch of freshly generated welcome templates with zero usage.
pub async fn insert_welcome_templates(db: &Database, contents: &[String]) -> anyhow::Result<u64> {
    let generated_at = now_unix_secs();
    let mut tx = db.pool().begin().await.context("begin insert batch")?;
    let mut inserted = 0u64;

    for content in contents {
        sqlx::query(
            "INSERT INTO welcome_templates (content, used_count, generated_at) VALUES ($1, 0, $2)",
        )
        .bind(content)
        .bind(generated_at)
        .execute(&mut *tx)
        .await?;
        inserted += 1;
    }

    tx.commit().await.context("commit insert batch")?;
    Ok(inserted)
}

/// Insert a batch of freshly generated morning templates for one mood.
pub async fn insert_morning_templates(
    db: &Database,
    mood: &str,
    contents: &[String],
) -> anyhow::Result<u64> {
    let mut tx = db.pool().begin().await.context("begin insert batch")?;
    let mut inserted = 0u64;

    for content in contents {
        sqlx::query(
            "INSERT INTO morning_message_templates (content, mood_tag, used_count) VALUES ($1, $2, 0)",
        )
        .bind(content)
        .bind(mood)
        .execute(&mut *tx)
        .await?;
        inserted += 1;
    }

    tx.commit().await.context("commit insert batch")?;
    Ok(inserted)
}

/// Insert warning templates (generated batches and the bilingual seeds).
pub async fn insert_warning_templates(
    db: &Database,
    violation_type: &str,
    entries: &[(String, i32)],
) -> anyhow::Result<u64> {
    let mut tx = db.pool().begin().await.context("begin insert batch")?;
    let mut inserted = 0u64;

    for (content, severity) in entries {
        sqlx::query(
            "INSERT INTO warning_templates (violation_type, content, severity, used_count)
             VALUES ($1, $2, $3, 0)",
        )
        .bind(violation_type)
        .bind(content)
        .bind(severity)
        .execute(&mut *tx)
        .await?;
        inserted += 1;
    }

    tx.commit().await.context("commit insert batch")?;
    Ok(inserted)
}
