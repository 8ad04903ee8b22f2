use shee_content::Pools;
use shee_database::Database;
use shee_llm::LlmService;
use shee_moderation::ViolationDetector;

pub type Error = anyhow::Error;

/// Process-wide state, constructed once at startup and shared by reference
/// through the framework.
#[derive(Debug)]
pub struct Data {
    pub db: Database,
    pub llm: LlmService,
    pub pools: Pools,
    pub detector: ViolationDetector,
}

pub type Context<'a> = poise::Context<'a, Data, Error>;
