//! Analysis value attached to a journal entry.

use serde::Serialize;

/// Mood assigned when analysis cannot be completed.
pub const FALLBACK_MOOD: &str = "Neutral";
/// Score assigned when analysis cannot be completed.
pub const FALLBACK_MOOD_SCORE: f64 = 5.0;
/// Emotion tag assigned when analysis cannot be completed.
pub const FALLBACK_EMOTION: &str = "neutral";
/// Summary assigned when analysis cannot be completed.
pub const FALLBACK_SUMMARY: &str = "Analysis could not be completed at this time.";

/// Normalized mood analysis of one journal entry.
///
/// Instances only come out of [`crate::validator::validate_response`] or
/// [`AnalysisResult::fallback`], so a value is always fully valid: the mood is
/// title-cased, the score lies in `[1.0, 10.0]`, emotions are lowercase and
/// non-blank, and the summary is trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    mood: String,
    mood_score: f64,
    top_emotions: Vec<String>,
    summary: String,
}

impl AnalysisResult {
    /// Fields must already be normalized.
    pub(crate) fn from_normalized(
        mood: String,
        mood_score: f64,
        top_emotions: Vec<String>,
        summary: String,
    ) -> Self {
        Self {
            mood,
            mood_score,
            top_emotions,
            summary,
        }
    }

    /// The fixed result used whenever real analysis is unavailable.
    pub fn fallback() -> Self {
        Self {
            mood: FALLBACK_MOOD.to_string(),
            mood_score: FALLBACK_MOOD_SCORE,
            top_emotions: vec![FALLBACK_EMOTION.to_string()],
            summary: FALLBACK_SUMMARY.to_string(),
        }
    }

    pub fn mood(&self) -> &str {
        &self.mood
    }

    pub fn mood_score(&self) -> f64 {
        self.mood_score
    }

    pub fn top_emotions(&self) -> &[String] {
        &self.top_emotions
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Whether this is the fallback value.
    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_values() {
        let fallback = AnalysisResult::fallback();
        assert_eq!(fallback.mood(), "Neutral");
        assert_eq!(fallback.mood_score(), 5.0);
        assert_eq!(fallback.top_emotions(), ["neutral".to_string()]);
        assert_eq!(fallback.summary(), "Analysis could not be completed at this time.");
        assert!(fallback.is_fallback());
    }

    #[test]
    fn test_serialization_uses_snake_case_keys() {
        let json = serde_json::to_value(AnalysisResult::fallback()).unwrap();
        assert_eq!(json["mood"], "Neutral");
        assert_eq!(json["mood_score"], 5.0);
        assert_eq!(json["top_emotions"][0], "neutral");
    }
}
