/// Generic embed builders shared across event handlers.
pub mod embed;
/// Shared formatting helpers (template rendering, durations).
pub mod formatting;
/// Shared time helpers.
pub mod time;
