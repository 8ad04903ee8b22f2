use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::keys::{AllKeysExhausted, KeyRotation};

/// Generation attempts before giving up (rate-limit rotations not counted).
const MAX_RETRIES: u32 = 3;
/// Linear backoff base between failed attempts.
const BASE_RETRY_DELAY: Duration = Duration::from_secs(2);

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    AllKeysExhausted(#[from] AllKeysExhausted),
    #[error("model returned an empty or degenerate response")]
    EmptyResponse,
    #[error("generation was blocked by the safety layer")]
    SafetyBlocked,
    #[error("structured output was malformed: {0}")]
    MalformedStructuredOutput(String),
    #[error("upstream generation call failed: {0}")]
    Upstream(String),
}

#[derive(Clone, Copy, Debug)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            max_tokens: 512,
        }
    }
}

/// Text-generation client: key-rotated calls to a Gemini-style REST API with
/// retry, backoff, and response validation.
#[derive(Clone, Debug)]
pub struct LlmService {
    http: reqwest::Client,
    keys: Arc<KeyRotation>,
    model: String,
    base_url: String,
}

impl LlmService {
    /// Build from `GEMINI_API_KEYS` (comma-separated), `GEMINI_MODEL` and
    /// `GEMINI_BASE_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        let raw_keys = env::var("GEMINI_API_KEYS").context("GEMINI_API_KEYS is not set")?;
        let secrets: Vec<String> = raw_keys.split(',').map(|s| s.trim().to_owned()).collect();
        let keys = KeyRotation::new(secrets).context("no usable generation credentials")?;

        let model = env::var("GEMINI_MODEL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_owned());
        let base_url = env::var("GEMINI_BASE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        Ok(Self {
            http: reqwest::Client::new(),
            keys: Arc::new(keys),
            model,
            base_url,
        })
    }

    /// Generate text for a prompt, rotating credentials and retrying
    /// validation failures with linear backoff.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GenerateError> {
        let mut attempt: u32 = 1;
        let mut last_error = GenerateError::EmptyResponse;

        while attempt <= MAX_RETRIES {
            let (key_id, secret) = self.keys.acquire().await?;

            match self.call_generate(&secret, prompt, options).await? {
                AttemptOutcome::Text(text) => return Ok(text),
                AttemptOutcome::RateLimited => {
                    // The quota tracking missed an upstream limit; cool the
                    // key down and move straight to the next one.
                    self.keys.mark_exhausted(key_id).await;
                    continue;
                }
                AttemptOutcome::Retryable(error) => {
                    warn!(attempt, %error, "generation attempt failed");
                    last_error = error;
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(BASE_RETRY_DELAY * attempt).await;
                    }
                    attempt += 1;
                }
            }
        }

        Err(last_error)
    }

    /// Generate a structured list: the first bracketed array in the raw
    /// response is parsed as JSON. Malformed output is not retried here.
    pub async fn generate_list<T>(&self, prompt: &str) -> Result<Vec<T>, GenerateError>
    where
        T: DeserializeOwned,
    {
        let raw = self.generate(prompt, &GenerateOptions::default()).await?;

        let Some(array) = extract_json_array(&raw) else {
            return Err(GenerateError::MalformedStructuredOutput(
                "no JSON array found in response".to_owned(),
            ));
        };

        serde_json::from_str::<Vec<T>>(array)
            .map_err(|e| GenerateError::MalformedStructuredOutput(e.to_string()))
    }

    async fn call_generate(
        &self,
        secret: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<AttemptOutcome, GenerateError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", secret)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerateError::Upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Ok(AttemptOutcome::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Upstream(format!(
                "status {status}: {body}"
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Upstream(format!("invalid response body: {e}")))?;

        if let Some(feedback) = &body.prompt_feedback {
            if feedback.block_reason.is_some() {
                return Ok(AttemptOutcome::Retryable(GenerateError::SafetyBlocked));
            }
        }

        let Some(candidate) = body.candidates.unwrap_or_default().into_iter().next() else {
            return Ok(AttemptOutcome::Retryable(GenerateError::EmptyResponse));
        };

        if let Some(reason) = &candidate.finish_reason {
            if !reason.eq_ignore_ascii_case("stop") {
                debug!(finish_reason = %reason, "non-normal finish reason");
                return Ok(AttemptOutcome::Retryable(GenerateError::SafetyBlocked));
            }
        }

        let text = candidate
            .content
            .and_then(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if is_degenerate(&text) {
            return Ok(AttemptOutcome::Retryable(GenerateError::EmptyResponse));
        }

        Ok(AttemptOutcome::Text(text.trim().to_owned()))
    }
}

enum AttemptOutcome {
    Text(String),
    RateLimited,
    Retryable(GenerateError),
}

/// A response with no letters or digits (only punctuation, braces,
/// whitespace) carries no usable content.
fn is_degenerate(text: &str) -> bool {
    text.chars().all(|c| !c.is_alphanumeric())
}

/// Slice out the first well-formed bracketed array in `raw`, skipping
/// brackets inside string literals.
fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'[' if !in_string => depth += 1,
            b']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{extract_json_array, is_degenerate};

    #[test]
    fn degenerate_responses_are_flagged() {
        assert!(is_degenerate(""));
        assert!(is_degenerate("   "));
        assert!(is_degenerate("{}[]...!?"));
        assert!(!is_degenerate("halo!"));
        assert!(!is_degenerate("{\"ok\": 1}"));
    }

    #[test]
    fn extracts_first_array() {
        assert_eq!(extract_json_array("[1, 2, 3]"), Some("[1, 2, 3]"));
        assert_eq!(
            extract_json_array("Here you go:\n```json\n[{\"content\": \"hi\"}]\n```"),
            Some("[{\"content\": \"hi\"}]")
        );
    }

    #[test]
    fn handles_nested_arrays_and_strings() {
        assert_eq!(extract_json_array("x [[1], [2]] y"), Some("[[1], [2]]"));
        assert_eq!(
            extract_json_array(r#"[{"content": "a ] b"}]"#),
            Some(r#"[{"content": "a ] b"}]"#)
        );
        assert_eq!(
            extract_json_array(r#"[{"content": "esc \" ] ok"}]"#),
            Some(r#"[{"content": "esc \" ] ok"}]"#)
        );
    }

    #[test]
    fn missing_or_unterminated_arrays() {
        assert_eq!(extract_json_array("no array here"), None);
        assert_eq!(extract_json_array("[1, 2"), None);
    }

    #[test]
    fn parses_extracted_array() {
        #[derive(serde::Deserialize)]
        struct Item {
            content: String,
        }

        let raw = "sure!\n[{\"content\": \"selamat pagi\"}, {\"content\": \"good morning\"}]";
        let array = extract_json_array(raw).unwrap();
        let items: Vec<Item> = serde_json::from_str(array).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content, "selamat pagi");
    }
}
