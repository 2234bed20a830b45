//! Journal Analysis - Mood analysis pipeline for journal entries.
//!
//! Every entry is sent to a text-generation provider together with a fixed
//! instruction, and the reply is validated and normalized into an
//! [`AnalysisResult`]. Any failure along the way yields the fallback result,
//! so callers always receive a usable value.
//!
//! ```text
//! (title, body) → build_prompt → TextGenerator → validate_response → AnalysisResult
//!                                     │ error            │ rejected
//!                                     └──────────────────┴──→ AnalysisResult::fallback()
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analyzer;
pub mod model;
pub mod prompt;
pub mod provider;
pub mod validator;

pub use analyzer::{AnalyzerSettings, MoodAnalyzer};
pub use model::AnalysisResult;
pub use prompt::{build_prompt, SYSTEM_INSTRUCTION};
pub use provider::{GenerationError, GenerationRequest, OpenAIProvider, TextGenerator};
pub use validator::{validate_response, ResponseRejection};
