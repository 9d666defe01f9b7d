//! Core types for the Interview Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: question inputs, gaze summaries, rubric judgments, fused results,
//! per-question results and the batch decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_true() -> bool {
    true
}

/// One interview question to score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    /// Question identifier (position id)
    #[serde(alias = "positionId")]
    pub id: i64,
    /// Question text shown to the candidate
    #[serde(default)]
    pub question: String,
    /// Where the answer video lives
    #[serde(default, alias = "recordedVideoUrl")]
    pub video_locator: String,
    /// Whether an answer video was recorded at all
    #[serde(default = "default_true", alias = "isVideoExist")]
    pub has_media: bool,
}

impl QuestionInput {
    pub fn new(id: i64, question: impl Into<String>, video_locator: impl Into<String>) -> Self {
        Self {
            id,
            question: question.into(),
            video_locator: video_locator.into(),
            has_media: true,
        }
    }

    /// Whether the batch should run the pipeline for this question
    pub fn is_scorable(&self) -> bool {
        self.has_media && !self.video_locator.trim().is_empty()
    }

    /// Question text, falling back to a generic label when empty
    pub fn question_text(&self) -> String {
        if self.question.trim().is_empty() {
            format!("Interview Question {}", self.id)
        } else {
            self.question.clone()
        }
    }
}

/// Per-frame gaze reading (only produced for frames with a detected face)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeObservation {
    /// Horizontal gaze position in [0, 1], 0.5 = camera-centered
    pub gaze_position: f64,
    /// `1 - 2 * |gaze - 0.5|`, 1.0 = perfect center gaze
    pub eye_contact_score: f64,
}

/// How a gaze summary came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Statistics measured from detected faces
    Measured,
    /// Landmark detector unavailable, fixed placeholder statistics
    Fallback,
    /// Frames were processed but none contained a face
    NoFace,
    /// Analysis failed and a zero summary was substituted
    Failed,
}

/// Summary statistics of gaze behavior over one answer video
///
/// All percentage fields lie in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeSummary {
    /// Share of processed frames with a detected face (%)
    pub face_detection_rate: f64,
    /// Share of face frames with gaze near center (%)
    pub eye_contact_percentage: f64,
    /// Spread-based stability proxy (%)
    pub gaze_stability: f64,
    /// Share of face frames with gaze away from center (%)
    pub looking_away_percentage: f64,
    /// Composite attention (%)
    pub attention_score: f64,
    /// Mean per-frame eye-contact score in [0, 1]
    pub mean_eye_contact_score: f64,
    /// Mean gaze position in [0, 1]
    pub avg_gaze_position: f64,
    /// Spread of gaze positions (population standard deviation)
    pub gaze_variance: f64,
    pub video_duration_sec: f64,
    pub frames_analyzed: u32,
    pub frames_with_face: u32,
    pub analysis_notes: String,
    pub mode: AnalysisMode,
}

impl GazeSummary {
    /// All-zero summary carrying an explanatory note
    pub fn empty(mode: AnalysisMode, note: impl Into<String>) -> Self {
        Self {
            face_detection_rate: 0.0,
            eye_contact_percentage: 0.0,
            gaze_stability: 0.0,
            looking_away_percentage: 0.0,
            attention_score: 0.0,
            mean_eye_contact_score: 0.0,
            avg_gaze_position: 0.0,
            gaze_variance: 0.0,
            video_duration_sec: 0.0,
            frames_analyzed: 0,
            frames_with_face: 0,
            analysis_notes: note.into(),
            mode,
        }
    }

    /// Whether these are placeholder values rather than measurements
    pub fn is_fallback(&self) -> bool {
        self.mode == AnalysisMode::Fallback
    }

    pub fn is_measured(&self) -> bool {
        self.mode == AnalysisMode::Measured
    }
}

/// One timed piece of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Transcription metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    pub language: Option<String>,
    pub language_probability: Option<f64>,
    pub duration_sec: Option<f64>,
    pub segments: Vec<TranscriptSegment>,
    /// Set when transcription failed and an empty transcript was substituted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscriptMetadata {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Spoken answer converted to text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub metadata: TranscriptMetadata,
}

/// Gaze-integrity verdict from the judgment engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityFlag {
    #[default]
    Clean,
    Warning,
    Suspicious,
}

impl IntegrityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityFlag::Clean => "clean",
            IntegrityFlag::Warning => "warning",
            IntegrityFlag::Suspicious => "suspicious",
        }
    }

    /// Lenient mapping from engine output; unknown values are treated as clean
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "suspicious" => IntegrityFlag::Suspicious,
            "warning" => IntegrityFlag::Warning,
            _ => IntegrityFlag::Clean,
        }
    }
}

/// Judgment engine's confidence in its own assessment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => ConfidenceLevel::Low,
            "HIGH" => ConfidenceLevel::High,
            _ => ConfidenceLevel::Medium,
        }
    }
}

/// STAR (Situation, Task, Action, Result) narrative structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarAnalysis {
    pub situation_present: bool,
    pub task_present: bool,
    pub action_present: bool,
    pub action_specificity: Option<String>,
    pub result_present: bool,
    pub result_quantified: bool,
    /// Narrative-structure score in [0, 4]
    pub score: f64,
    pub distribution_assessment: Option<String>,
}

/// Toulmin argumentation (claim, grounds, warrant, rebuttal)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToulminAnalysis {
    pub claim_present: bool,
    pub grounds_present: bool,
    pub grounds_quality: Option<String>,
    pub warrant_present: bool,
    pub rebuttal_present: bool,
    /// Argumentation score in [0, 4]
    pub score: f64,
    pub reasoning: Option<String>,
}

/// Individual-vs-team ownership in the action segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PronounAnalysis {
    pub i_ratio_in_action: Option<f64>,
    pub ownership_level: Option<String>,
    pub assessment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluencyAnalysis {
    pub disfluency_density: Option<String>,
    pub filler_words_detected: Option<String>,
    pub speech_pattern: Option<String>,
    /// Fluency score in [0, 4]
    pub score: f64,
    pub assessment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeBehaviorAnalysis {
    pub cognitive_gaze_aversion: Option<String>,
    pub reading_pattern_detected: bool,
    pub engagement_level: Option<String>,
    pub integrity_flag: IntegrityFlag,
    pub interpretation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub confidence: ConfidenceLevel,
    pub authenticity_score: Option<f64>,
}

/// Typed rubric result for one answer
///
/// Sub-scores are always resolved: an absent sub-score carries the raw rubric
/// score, and every score lies in [0, 4].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricJudgment {
    /// Raw rubric score in [0, 4]
    pub raw_score: u8,
    pub star: StarAnalysis,
    pub toulmin: ToulminAnalysis,
    pub pronoun: PronounAnalysis,
    pub fluency: FluencyAnalysis,
    pub eye_behavior: EyeBehaviorAnalysis,
    pub overall: OverallAssessment,
    /// Short justification for the score
    pub rationale: String,
    /// Detailed notes for the interviewer
    pub notes: String,
    pub improvement_suggestions: Option<String>,
    /// Parse or engine failure that produced this judgment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RubricJudgment {
    /// Score given when no usable judgment exists
    pub const NEUTRAL_SCORE: u8 = 2;

    /// Low-confidence neutral judgment substituted on parse or engine failure
    pub fn neutral(rationale: impl Into<String>, error: impl Into<String>) -> Self {
        let neutral = f64::from(Self::NEUTRAL_SCORE);
        Self {
            raw_score: Self::NEUTRAL_SCORE,
            star: StarAnalysis {
                score: neutral,
                ..StarAnalysis::default()
            },
            toulmin: ToulminAnalysis {
                score: neutral,
                ..ToulminAnalysis::default()
            },
            pronoun: PronounAnalysis::default(),
            fluency: FluencyAnalysis {
                score: neutral,
                ..FluencyAnalysis::default()
            },
            eye_behavior: EyeBehaviorAnalysis::default(),
            overall: OverallAssessment {
                confidence: ConfidenceLevel::Low,
                ..OverallAssessment::default()
            },
            rationale: rationale.into(),
            notes: String::new(),
            improvement_suggestions: None,
            error: Some(error.into()),
        }
    }

    pub fn narrative_score(&self) -> f64 {
        self.star.score
    }

    pub fn argumentation_score(&self) -> f64 {
        self.toulmin.score
    }

    pub fn fluency_score(&self) -> f64 {
        self.fluency.score
    }

    pub fn integrity_flag(&self) -> IntegrityFlag {
        self.eye_behavior.integrity_flag
    }

    pub fn confidence(&self) -> ConfidenceLevel {
        self.overall.confidence
    }

    /// Whether this judgment was synthesized instead of parsed
    pub fn is_default(&self) -> bool {
        self.error.is_some()
    }
}

/// Final fused score for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    /// Final score in [0, 4], after any integrity penalty
    pub final_score: u8,
    /// Score before the integrity penalty
    pub base_score: u8,
    /// Weighted score before rounding (2 decimals)
    pub weighted_score: f64,
    pub integrity_penalty_applied: bool,
    pub justification: String,
    pub judgment: RubricJudgment,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Retrieve,
    Transcribe,
    GazeAggregate,
    Fuse,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Retrieve => "RETRIEVE",
            Stage::Transcribe => "TRANSCRIBE",
            Stage::GazeAggregate => "GAZE_AGGREGATE",
            Stage::Fuse => "FUSE",
            Stage::Done => "DONE",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered failure recorded against a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDegradation {
    pub stage: Stage,
    pub cause: String,
}

/// Outcome of the pipeline for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub id: i64,
    pub question: String,
    /// Final score in [0, 4]; 0 for terminal failures
    pub score: u8,
    pub fused: Option<FusedResult>,
    pub transcript: String,
    pub transcript_metadata: Option<TranscriptMetadata>,
    pub gaze: Option<GazeSummary>,
    pub degradations: Vec<StageDegradation>,
    /// Terminal failure message
    pub error: Option<String>,
    /// Full diagnostic trace kept for audit (unclassified failures only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl QuestionResult {
    /// Zero-score result for a question that could not be scored
    pub fn terminal(
        input: &QuestionInput,
        error: impl Into<String>,
        diagnostic: Option<String>,
    ) -> Self {
        Self {
            id: input.id,
            question: input.question_text(),
            score: 0,
            fused: None,
            transcript: String::new(),
            transcript_metadata: None,
            gaze: None,
            degradations: Vec::new(),
            error: Some(error.into()),
            diagnostic,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.error.is_some()
    }

    pub fn judgment(&self) -> Option<&RubricJudgment> {
        self.fused.as_ref().map(|f| &f.judgment)
    }
}

/// Overall verdict for an assessment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Passed,
    NeedsReview,
    Failed,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Passed => "PASSED",
            Decision::NeedsReview => "NEEDS_REVIEW",
            Decision::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of scoring a whole set of questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDecision {
    pub run_id: Uuid,
    pub reviewed_at: DateTime<Utc>,
    /// Results in input order
    pub results: Vec<QuestionResult>,
    pub mean_score: f64,
    pub decision: Decision,
    /// `round(100 * sum / (4 * count), 1)`
    pub interview_percentage: f64,
}

impl BatchDecision {
    pub fn scores(&self) -> Vec<u8> {
        self.results.iter().map(|r| r.score).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_input_accepts_original_field_names() {
        let json = r#"{
            "positionId": 3,
            "question": "Tell me about a conflict",
            "recordedVideoUrl": "/tmp/q3.capture.ndjson",
            "isVideoExist": false
        }"#;
        let input: QuestionInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.id, 3);
        assert_eq!(input.video_locator, "/tmp/q3.capture.ndjson");
        assert!(!input.has_media);
        assert!(!input.is_scorable());
    }

    #[test]
    fn test_question_input_defaults_to_having_media() {
        let json = r#"{"id": 1, "question": "Q", "videoLocator": "a.ndjson"}"#;
        let input: QuestionInput = serde_json::from_str(json).unwrap();
        assert!(input.has_media);
        assert!(input.is_scorable());
    }

    #[test]
    fn test_question_input_requires_id() {
        let json = r#"{"question": "Q", "videoLocator": "a.ndjson"}"#;
        assert!(serde_json::from_str::<QuestionInput>(json).is_err());
    }

    #[test]
    fn test_blank_locator_is_not_scorable() {
        let input = QuestionInput::new(1, "Q", "   ");
        assert!(!input.is_scorable());
    }

    #[test]
    fn test_question_text_falls_back_to_label() {
        let input = QuestionInput::new(4, "", "a");
        assert_eq!(input.question_text(), "Interview Question 4");
    }

    #[test]
    fn test_neutral_judgment_has_resolved_sub_scores() {
        let judgment = RubricJudgment::neutral("fallback", "boom");
        assert_eq!(judgment.raw_score, 2);
        assert_eq!(judgment.narrative_score(), 2.0);
        assert_eq!(judgment.argumentation_score(), 2.0);
        assert_eq!(judgment.fluency_score(), 2.0);
        assert_eq!(judgment.confidence(), ConfidenceLevel::Low);
        assert_eq!(judgment.integrity_flag(), IntegrityFlag::Clean);
        assert!(judgment.is_default());
    }

    #[test]
    fn test_integrity_flag_lenient_parse() {
        assert_eq!(IntegrityFlag::parse("Suspicious "), IntegrityFlag::Suspicious);
        assert_eq!(IntegrityFlag::parse("WARNING"), IntegrityFlag::Warning);
        assert_eq!(IntegrityFlag::parse("whatever"), IntegrityFlag::Clean);
    }

    #[test]
    fn test_decision_serializes_as_label() {
        let json = serde_json::to_string(&Decision::NeedsReview).unwrap();
        assert_eq!(json, "\"NEEDS_REVIEW\"");
        assert_eq!(Stage::GazeAggregate.to_string(), "GAZE_AGGREGATE");
    }

    #[test]
    fn test_empty_summary_is_not_fallback() {
        let summary = GazeSummary::empty(AnalysisMode::NoFace, "No face detected in video");
        assert!(!summary.is_fallback());
        assert!(!summary.is_measured());
        assert_eq!(summary.attention_score, 0.0);
    }
}
