//! Analysis orchestrator.
//!
//! [`MoodAnalyzer::analyze`] never fails: a missing provider, empty content,
//! a provider error, a timeout, or an invalid reply all produce
//! [`AnalysisResult::fallback`]. Each path leaves a log record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::model::AnalysisResult;
use crate::prompt::{build_prompt, SYSTEM_INSTRUCTION};
use crate::provider::{GenerationError, GenerationRequest, TextGenerator};
use crate::validator::validate_response;

/// Characters of a raw reply included in debug logs.
const PREVIEW_CHARS: usize = 100;

/// Generation parameters for analysis calls.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub max_output_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: 300,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Produces an [`AnalysisResult`] for journal entries.
pub struct MoodAnalyzer {
    generator: Option<Arc<dyn TextGenerator>>,
    settings: AnalyzerSettings,
}

impl MoodAnalyzer {
    /// Create an analyzer. Without a generator every analysis is the fallback.
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, settings: AnalyzerSettings) -> Self {
        if generator.is_none() {
            tracing::warn!("No text generator configured, mood analysis will use fallback values");
        }
        Self {
            generator,
            settings,
        }
    }

    /// Analyzer with default settings.
    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(Some(generator), AnalyzerSettings::default())
    }

    /// Analyzer that always returns the fallback.
    pub fn unconfigured() -> Self {
        Self::new(None, AnalyzerSettings::default())
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyze one entry.
    pub async fn analyze(&self, title: &str, body: &str) -> AnalysisResult {
        let Some(generator) = &self.generator else {
            tracing::warn!("Text generator unavailable, returning fallback analysis");
            return AnalysisResult::fallback();
        };

        if body.trim().is_empty() {
            tracing::warn!("Entry content is empty, returning fallback analysis");
            return AnalysisResult::fallback();
        }

        let request = GenerationRequest {
            system: SYSTEM_INSTRUCTION.to_string(),
            prompt: build_prompt(title, body),
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
            timeout: self.settings.timeout,
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.settings.timeout, generator.generate(request))
            .await
            .unwrap_or(Err(GenerationError::Timeout));
        let latency_ms = start.elapsed().as_millis() as u64;

        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(
                    provider = generator.name(),
                    kind = e.kind(),
                    error = %e,
                    latency_ms,
                    "Text generation failed, returning fallback analysis"
                );
                return AnalysisResult::fallback();
            }
        };

        tracing::debug!(
            provider = generator.name(),
            latency_ms,
            preview = %preview(&raw),
            "Received analysis reply"
        );

        match validate_response(&raw) {
            Ok(result) => {
                tracing::info!(
                    mood = result.mood(),
                    mood_score = result.mood_score(),
                    emotions = result.top_emotions().len(),
                    latency_ms,
                    "Entry analysis completed"
                );
                result
            }
            Err(rejection) => {
                tracing::warn!(
                    reason = %rejection,
                    reply = %raw,
                    "Analysis reply rejected, returning fallback analysis"
                );
                AnalysisResult::fallback()
            }
        }
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}
