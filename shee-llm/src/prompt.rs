use std::{fs, path::Path};

const DEFAULT_PERSONA: &str = "You are Shee, a warm and slightly playful community bot for an \
Indonesian Discord server. You mix casual Indonesian and English the way the members do. \
Keep replies short, friendly, and never mean-spirited.";

/// Persona prompt for mention replies; overridable via `SYSTEM_PROMPT.md`.
pub fn system_prompt() -> String {
    let prompt_file = Path::new("SYSTEM_PROMPT.md");
    match fs::read_to_string(prompt_file) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => DEFAULT_PERSONA.to_owned(),
    }
}

/// Fixed apology sent when a mention reply cannot be generated.
pub const FALLBACK_REPLY: &str =
    "Aduh, maaf — my head is spinning a little right now. Coba tanya lagi sebentar ya!";

/// Prompt for a batch of welcome templates, returned as a JSON array of
/// objects with a `content` field containing a `{user}` placeholder.
pub fn welcome_batch_prompt(count: usize) -> String {
    format!(
        "{DEFAULT_PERSONA}\n\nWrite {count} different short welcome messages for a new member \
joining the server. Each message must contain the literal placeholder {{user}} exactly once. \
Mix Indonesian and English naturally. Respond with ONLY a JSON array of objects like \
[{{\"content\": \"...\"}}] and nothing else."
    )
}

/// Prompt for a batch of morning messages with the given mood tag.
pub fn morning_batch_prompt(count: usize, mood: &str) -> String {
    format!(
        "{DEFAULT_PERSONA}\n\nWrite {count} different short good-morning messages for the server \
with a {mood} mood. No placeholders needed. Mix Indonesian and English naturally. Respond with \
ONLY a JSON array of objects like [{{\"content\": \"...\"}}] and nothing else."
    )
}

/// Prompt for a single ad-hoc morning message (pool-empty fallback).
pub fn morning_single_prompt(mood: &str) -> String {
    format!(
        "{DEFAULT_PERSONA}\n\nWrite one short good-morning message for the server with a {mood} \
mood. Mix Indonesian and English naturally. Respond with only the message text."
    )
}

/// Prompt for a batch of warning templates for one violation type.
pub fn warning_batch_prompt(count: usize, violation_type: &str) -> String {
    format!(
        "{DEFAULT_PERSONA}\n\nWrite {count} different short, firm-but-friendly warning messages \
for a member who committed this violation: {violation_type}. Each message must contain the \
literal placeholder {{user}} exactly once. Mix Indonesian and English naturally. Respond with \
ONLY a JSON array of objects like [{{\"content\": \"...\"}}] and nothing else."
    )
}

/// Prompt for replying to a member who mentioned the bot.
pub fn mention_reply_prompt(author_display_name: &str, message: &str) -> String {
    format!(
        "{}\n\n{author_display_name} just said to you: {message}\n\nReply in character, in one \
or two sentences.",
        system_prompt()
    )
}
