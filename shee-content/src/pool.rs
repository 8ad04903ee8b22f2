use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use shee_database::Database;
use shee_database::impls::templates::{
    allocate_morning_template, allocate_warning_template, allocate_welcome_template,
    count_fresh_morning_templates, count_fresh_warning_templates, count_fresh_welcome_templates,
    count_warning_templates, insert_morning_templates, insert_warning_templates,
    insert_welcome_templates,
};
use shee_llm::{GenerateError, LlmService, prompt};

use crate::seeds::seed_warning_defaults;
use crate::violation::ViolationType;

/// A template is "fresh" while its used_count stays under this.
pub const USAGE_THRESHOLD: i64 = 5;
/// Replenish when fewer fresh templates than this remain.
pub const LOW_THRESHOLD: i64 = 10;
/// Templates requested per generation call.
pub const BATCH_SIZE: usize = 10;
/// Pause between generation batches.
pub const BATCH_DELAY: Duration = Duration::from_secs(5);
/// Total templates generated per replenishment run.
pub const REPLENISH_COUNT: usize = 20;

/// Mood tags morning pools are generated and allocated under.
pub const MORNING_MOODS: [&str; 4] = ["cheerful", "calm", "energetic", "grateful"];

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no templates available in this pool")]
    Empty,
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// What a pool hands back on allocation.
#[derive(Clone, Debug)]
pub struct AllocatedTemplate {
    pub content: String,
    pub severity: i32,
}

#[derive(Clone, Debug)]
enum PoolKind {
    Welcome,
    Morning { mood: &'static str },
    Warning { violation_type: ViolationType },
}

/// One pool of reusable content: welcome messages, one mood of morning
/// messages, or one violation type of warnings.
///
/// Allocation is least-used-first; replenishment runs in the background at
/// most once per pool at a time.
#[derive(Clone, Debug)]
pub struct TemplatePool {
    db: Database,
    llm: LlmService,
    kind: PoolKind,
    generating: Arc<AtomicBool>,
}

impl TemplatePool {
    fn new(db: Database, llm: LlmService, kind: PoolKind) -> Self {
        Self {
            db,
            llm,
            kind,
            generating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Allocate the least-used template in this pool, bumping its usage.
    ///
    /// Warning pools seed their bilingual defaults the first time they are
    /// found empty, so warnings always have something to say.
    pub async fn allocate(&self) -> Result<AllocatedTemplate, PoolError> {
        match &self.kind {
            PoolKind::Welcome => {
                let template = allocate_welcome_template(&self.db).await?;
                template
                    .map(|t| AllocatedTemplate {
                        content: t.content,
                        severity: 1,
                    })
                    .ok_or(PoolError::Empty)
            }
            PoolKind::Morning { mood } => {
                let template = allocate_morning_template(&self.db, Some(*mood)).await?;
                template
                    .map(|t| AllocatedTemplate {
                        content: t.content,
                        severity: 1,
                    })
                    .ok_or(PoolError::Empty)
            }
            PoolKind::Warning { violation_type } => {
                if let Some(t) = allocate_warning_template(&self.db, violation_type.as_str()).await?
                {
                    return Ok(AllocatedTemplate {
                        content: t.content,
                        severity: t.severity,
                    });
                }

                if count_warning_templates(&self.db, violation_type.as_str()).await? == 0 {
                    seed_warning_defaults(&self.db, *violation_type).await?;
                }

                let template = allocate_warning_template(&self.db, violation_type.as_str()).await?;
                template
                    .map(|t| AllocatedTemplate {
                        content: t.content,
                        severity: t.severity,
                    })
                    .ok_or(PoolError::Empty)
            }
        }
    }

    /// Kick off a background replenishment run if the pool is running low
    /// and none is already in flight. Never blocks the caller.
    pub async fn ensure_replenished(&self) {
        let fresh = match self.count_fresh().await {
            Ok(count) => count,
            Err(source) => {
                error!(?source, pool = %self.label(), "failed to count fresh templates");
                return;
            }
        };

        if fresh >= LOW_THRESHOLD {
            return;
        }

        let Some(guard) = ReplenishGuard::claim(&self.generating) else {
            return;
        };

        info!(pool = %self.label(), fresh, "pool running low; replenishing in background");
        let pool = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match pool.generate_batch(REPLENISH_COUNT).await {
                Ok(inserted) => info!(pool = %pool.label(), inserted, "replenishment finished"),
                Err(source) => error!(?source, pool = %pool.label(), "replenishment failed"),
            }
        });
    }

    /// Generate `count` templates in batches and insert them unused.
    ///
    /// A failure in the first batch aborts the run; later batch failures are
    /// logged and skipped so earlier inserts are kept.
    pub async fn generate_batch(&self, count: usize) -> Result<u64, PoolError> {
        let mut remaining = count;
        let mut inserted_total = 0u64;
        let mut first_batch = true;

        while remaining > 0 {
            let batch = remaining.min(BATCH_SIZE);
            match self.generate_and_insert(batch).await {
                Ok(inserted) => inserted_total += inserted,
                Err(source) if first_batch => return Err(source),
                Err(source) => {
                    warn!(?source, pool = %self.label(), "later batch failed; keeping earlier inserts");
                }
            }

            first_batch = false;
            remaining -= batch;
            if remaining > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }
        }

        Ok(inserted_total)
    }

    async fn generate_and_insert(&self, batch: usize) -> Result<u64, PoolError> {
        match &self.kind {
            PoolKind::Welcome => {
                let items: Vec<GeneratedTemplate> = self
                    .llm
                    .generate_list(&prompt::welcome_batch_prompt(batch))
                    .await?;
                let contents: Vec<String> = items.into_iter().map(|i| i.content).collect();
                Ok(insert_welcome_templates(&self.db, &contents).await?)
            }
            PoolKind::Morning { mood } => {
                let items: Vec<GeneratedTemplate> = self
                    .llm
                    .generate_list(&prompt::morning_batch_prompt(batch, mood))
                    .await?;
                let contents: Vec<String> = items.into_iter().map(|i| i.content).collect();
                Ok(insert_morning_templates(&self.db, mood, &contents).await?)
            }
            PoolKind::Warning { violation_type } => {
                let items: Vec<GeneratedTemplate> = self
                    .llm
                    .generate_list(&prompt::warning_batch_prompt(batch, violation_type.as_str()))
                    .await?;
                let entries: Vec<(String, i32)> =
                    items.into_iter().map(|i| (i.content, 1)).collect();
                Ok(insert_warning_templates(&self.db, violation_type.as_str(), &entries).await?)
            }
        }
    }

    async fn count_fresh(&self) -> anyhow::Result<i64> {
        match &self.kind {
            PoolKind::Welcome => count_fresh_welcome_templates(&self.db, USAGE_THRESHOLD).await,
            PoolKind::Morning { mood } => {
                count_fresh_morning_templates(&self.db, Some(*mood), USAGE_THRESHOLD).await
            }
            PoolKind::Warning { violation_type } => {
                count_fresh_warning_templates(&self.db, violation_type.as_str(), USAGE_THRESHOLD)
                    .await
            }
        }
    }

    fn label(&self) -> String {
        match &self.kind {
            PoolKind::Welcome => "welcome".to_owned(),
            PoolKind::Morning { mood } => format!("morning:{mood}"),
            PoolKind::Warning { violation_type } => format!("warning:{violation_type}"),
        }
    }
}

/// Holds a pool's in-progress flag for the lifetime of one replenishment
/// run. Dropping the guard releases the flag, so the pool cannot wedge even
/// if the run panics mid-batch.
#[derive(Debug)]
struct ReplenishGuard {
    flag: Arc<AtomicBool>,
}

impl ReplenishGuard {
    /// Claim the flag. Returns None if a run is already active.
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for ReplenishGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One element of a generated structured batch.
#[derive(Debug, Deserialize)]
struct GeneratedTemplate {
    content: String,
}

/// All template pools, constructed once at startup.
#[derive(Clone, Debug)]
pub struct Pools {
    welcome: TemplatePool,
    morning: Vec<TemplatePool>,
    warning: Vec<TemplatePool>,
}

impl Pools {
    pub fn new(db: Database, llm: LlmService) -> Self {
        let welcome = TemplatePool::new(db.clone(), llm.clone(), PoolKind::Welcome);

        let morning = MORNING_MOODS
            .into_iter()
            .map(|mood| TemplatePool::new(db.clone(), llm.clone(), PoolKind::Morning { mood }))
            .collect();

        let warning = ViolationType::ALL
            .iter()
            .map(|violation_type| {
                TemplatePool::new(
                    db.clone(),
                    llm.clone(),
                    PoolKind::Warning {
                        violation_type: *violation_type,
                    },
                )
            })
            .collect();

        Self {
            welcome,
            morning,
            warning,
        }
    }

    pub fn welcome(&self) -> &TemplatePool {
        &self.welcome
    }

    /// The morning pool for a mood tag; unknown tags fall back to the first
    /// configured mood.
    pub fn morning(&self, mood: &str) -> &TemplatePool {
        let index = MORNING_MOODS
            .iter()
            .position(|candidate| *candidate == mood)
            .unwrap_or(0);
        &self.morning[index]
    }

    pub fn warning(&self, violation_type: ViolationType) -> &TemplatePool {
        let index = ViolationType::ALL
            .iter()
            .position(|candidate| *candidate == violation_type)
            .unwrap_or(0);
        &self.warning[index]
    }

    /// Every pool, for the scheduler's replenishment sweep.
    pub fn all(&self) -> impl Iterator<Item = &TemplatePool> {
        std::iter::once(&self.welcome)
            .chain(self.morning.iter())
            .chain(self.warning.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The CAS guard is what makes concurrent ensure_replenished calls
    // collapse into a single run.
    #[test]
    fn generation_flag_is_exclusive() {
        let generating = Arc::new(AtomicBool::new(false));

        let first = ReplenishGuard::claim(&generating);
        assert!(first.is_some());
        assert!(ReplenishGuard::claim(&generating).is_none());

        drop(first);
        assert!(ReplenishGuard::claim(&generating).is_some());
    }

    #[test]
    fn generation_flag_clears_on_panic() {
        let generating = Arc::new(AtomicBool::new(false));
        let guard = ReplenishGuard::claim(&generating).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = guard;
            panic!("batch blew up");
        }));

        assert!(result.is_err());
        assert!(!generating.load(Ordering::Acquire));
        assert!(ReplenishGuard::claim(&generating).is_some());
    }

    #[test]
    fn batch_split_covers_count() {
        // 25 templates -> batches of 10, 10, 5.
        let mut remaining = 25usize;
        let mut batches = Vec::new();
        while remaining > 0 {
            let batch = remaining.min(BATCH_SIZE);
            batches.push(batch);
            remaining -= batch;
        }
        assert_eq!(batches, vec![10, 10, 5]);
    }

    #[test]
    fn mood_tags_are_unique() {
        // Pools::new builds one pool per mood; duplicate tags would alias.
        for (i, mood) in MORNING_MOODS.iter().enumerate() {
            assert!(!MORNING_MOODS[i + 1..].contains(mood), "duplicate mood {mood}");
        }
    }
}
