//! Text-generation provider abstraction.
//!
//! The analyzer only needs "send an instruction and a prompt, get text back",
//! so providers are reduced to a single call. Failures are classified so the
//! logs can tell an expired key from a throttled account.

mod openai;

pub use openai::OpenAIProvider;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Provider Trait
// ============================================================================

/// A service that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name, used in logs.
    fn name(&self) -> &str;

    /// Generate a reply for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Parameters for a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instruction
    pub system: String,
    /// User prompt
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_output_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Upper bound on the call duration
    pub timeout: Duration,
}

/// Classified provider failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Generation failed: {0}")]
    Other(String),
}

impl GenerationError {
    /// Classify an unsuccessful HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Authentication(body),
            429 => Self::RateLimited(body),
            408 | 504 => Self::Timeout,
            _ => Self::Other(format!("API error ({}): {}", status, body)),
        }
    }

    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::RateLimited(_) => "rate_limited",
            Self::Timeout => "timeout",
            Self::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::from_status(status.as_u16(), e.to_string())
        } else {
            Self::Other(format!("Request failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            GenerationError::from_status(401, "bad key"),
            GenerationError::Authentication(_)
        ));
        assert!(matches!(
            GenerationError::from_status(403, ""),
            GenerationError::Authentication(_)
        ));
        assert!(matches!(
            GenerationError::from_status(429, "slow down"),
            GenerationError::RateLimited(_)
        ));
        assert_eq!(GenerationError::from_status(504, ""), GenerationError::Timeout);
        assert!(matches!(
            GenerationError::from_status(500, "boom"),
            GenerationError::Other(ref msg) if msg.contains("500")
        ));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(GenerationError::Authentication(String::new()).kind(), "authentication");
        assert_eq!(GenerationError::RateLimited(String::new()).kind(), "rate_limited");
        assert_eq!(GenerationError::Timeout.kind(), "timeout");
        assert_eq!(GenerationError::Other(String::new()).kind(), "other");
    }
}
