//! Error taxonomy for the game API boundary
//!
//! The upstream API reports its condition codes inside the JSON error body
//! (`{"error": {"code": 499, "message": "... 25.72 seconds left."}}`). Bodies
//! are parsed here, once, into [`ApiError`] so nothing downstream matches on
//! raw text.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Upstream code: character is in cooldown
pub const CODE_COOLDOWN: i64 = 499;
/// Upstream code: requested state already holds (e.g. already on the tile)
pub const CODE_ALREADY_SATISFIED: i64 = 490;

/// Error types for game API calls
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Character in cooldown: {remaining_ms}ms left")]
    CooldownActive { remaining_ms: u64 },

    #[error("Already satisfied: {0}")]
    AlreadySatisfied(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Upstream error {code}: {message}")]
    Unknown { code: i64, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl ApiError {
    /// Whether this failure counts against the bounded retry budget
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient(_) | ApiError::Unknown { .. })
    }
}

/// Result type for game API operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

fn seconds_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*seconds").expect("valid cooldown pattern")
    })
}

/// Extract the "N seconds" fragment of a cooldown message as milliseconds
pub fn parse_cooldown_ms(message: &str) -> Option<u64> {
    let caps = seconds_pattern().captures(message)?;
    let secs: f64 = caps.get(1)?.as_str().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}

/// Classify a non-2xx response from its status and body text
pub fn classify(status: u16, body: &str) -> ApiError {
    let parsed: Option<ErrorEnvelope> = serde_json::from_str(body).ok();

    match parsed {
        Some(ErrorEnvelope { error }) if error.code == CODE_COOLDOWN => {
            match parse_cooldown_ms(&error.message) {
                Some(remaining_ms) => ApiError::CooldownActive { remaining_ms },
                // cooldown without a readable duration cannot be waited out
                None => ApiError::Unknown {
                    code: error.code,
                    message: error.message,
                },
            }
        }
        Some(ErrorEnvelope { error }) if error.code == CODE_ALREADY_SATISFIED => {
            ApiError::AlreadySatisfied(error.message)
        }
        Some(ErrorEnvelope { error }) => ApiError::Unknown {
            code: error.code,
            message: error.message,
        },
        None => ApiError::Transient(format!("HTTP {}: {}", status, body.trim())),
    }
}

/// Wait owed for a cooldown response, including the clock-skew buffer
pub fn cooldown_wait(remaining_ms: u64, buffer: Duration) -> Duration {
    Duration::from_millis(remaining_ms) + buffer
}
