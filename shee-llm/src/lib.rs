pub mod client;
pub mod keys;
pub mod prompt;

pub use client::{GenerateError, GenerateOptions, LlmService};
pub use keys::KeyRotation;
