pub mod pool;
pub mod seeds;
pub mod violation;

pub use pool::{AllocatedTemplate, PoolError, Pools, TemplatePool};
pub use violation::ViolationType;
