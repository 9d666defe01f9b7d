//! Interview Flux - Multi-signal scoring engine for recorded interview answers
//!
//! Flux turns one recorded answer per question into a bounded score through a
//! staged pipeline: media retrieval → transcription → gaze aggregation → rubric
//! judgment and score fusion. Per-question results are then aggregated into a
//! PASSED / NEEDS_REVIEW / FAILED decision.
//!
//! ## Modules
//!
//! - **Gaze**: Reduce sampled frames into gaze summary statistics
//! - **Judge**: Rubric prompt, judgment engines and tolerant response parsing
//! - **Fusion**: Weighted late fusion with an integrity veto
//! - **Pipeline / Batch**: Failure-isolating stage machine and batch decision
//! - **Encoder / Narrative**: Machine-readable and human-readable views

pub mod batch;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod error;
pub mod fusion;
pub mod gaze;
pub mod judge;
pub mod narrative;
pub mod pipeline;
pub mod progress;
pub mod retrieval;
pub mod services;
pub mod transcript;
pub mod types;

#[cfg(test)]
mod test_support;

pub use batch::{decide, interview_percentage, BatchAggregator};
pub use config::AssessConfig;
pub use encoder::ReviewEncoder;
pub use error::AssessError;
pub use fusion::ScoreFusion;
pub use gaze::GazeAggregator;
pub use judge::{JudgmentEngine, ResponseParser};
pub use pipeline::{QuestionPipeline, StageOutcome};
pub use progress::{ProgressEvent, ProgressSink};
pub use retrieval::{LocalRetriever, MediaRetriever};
pub use services::{LazyHandle, Services};
pub use transcript::Transcriber;

/// Flux version embedded in review payloads
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for review payloads
pub const PRODUCER_NAME: &str = "interview-flux";

/// Round half away from zero to a fixed number of decimals
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
