/// Badword matching with leetspeak-aware precompiled patterns.
pub mod badwords;
/// Ordered violation detection (spam, badword, link).
pub mod detector;
/// Warning/escalation state machine for detected violations.
pub mod escalation;
/// Link extraction and domain whitelisting.
pub mod links;

pub use badwords::BadwordFilter;
pub use detector::ViolationDetector;
pub use links::LinkPolicy;
