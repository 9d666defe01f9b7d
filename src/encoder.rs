//! Review encoding
//!
//! Encodes a batch decision into the machine-readable review payload:
//! a compact `{id, score, reason}` list plus decision metadata.

use crate::error::AssessError;
use crate::judge::parser::DEFAULT_RATIONALE;
use crate::pipeline::RETRIEVAL_FAILED;
use crate::types::{BatchDecision, Decision, QuestionResult};
use crate::{FLUX_VERSION, PRODUCER_NAME};
use serde::Serialize;
use uuid::Uuid;

/// Timestamp layout of `reviewedAt`
pub const REVIEWED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const NO_ANALYSIS: &str = "No detailed analysis available";

/// Top-level review payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewPayload {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ReviewData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewData {
    pub decision: Decision,
    pub reviewed_at: String,
    pub scores: ScoresOverview,
    pub per_question: Vec<QuestionScore>,
    pub notes: String,
    pub run_id: String,
    pub producer: ReviewProducer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoresOverview {
    pub interview_percentage: f64,
    /// Equal to the interview percentage; there is no project component
    pub total_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionScore {
    pub id: i64,
    pub score: u8,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Encoder for producing review payloads
pub struct ReviewEncoder {
    instance_id: String,
}

impl Default for ReviewEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, decision: &BatchDecision) -> ReviewPayload {
        let per_question = decision.results.iter().map(question_score).collect();

        ReviewPayload {
            success: true,
            data: Some(ReviewData {
                decision: decision.decision,
                reviewed_at: decision.reviewed_at.format(REVIEWED_AT_FORMAT).to_string(),
                scores: ScoresOverview {
                    interview_percentage: decision.interview_percentage,
                    total_percentage: decision.interview_percentage,
                },
                per_question,
                notes: overall_notes(decision),
                run_id: decision.run_id.to_string(),
                producer: ReviewProducer {
                    name: PRODUCER_NAME.to_string(),
                    version: FLUX_VERSION.to_string(),
                    instance_id: self.instance_id.clone(),
                },
            }),
            error: None,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, decision: &BatchDecision, pretty: bool) -> Result<String, AssessError> {
        to_json(&self.encode(decision), pretty)
    }

    /// Payload reporting a failure of the whole run
    pub fn failure(error: impl Into<String>) -> ReviewPayload {
        ReviewPayload {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn failure_to_json(error: impl Into<String>, pretty: bool) -> Result<String, AssessError> {
        to_json(&Self::failure(error), pretty)
    }
}

fn to_json(payload: &ReviewPayload, pretty: bool) -> Result<String, AssessError> {
    let json = if pretty {
        serde_json::to_string_pretty(payload)
    } else {
        serde_json::to_string(payload)
    };
    json.map_err(AssessError::JsonError)
}

/// Fused justification, falling back to the interviewer notes when it says nothing
///
/// Terminal results report the fixed retrieval message or nothing specific.
fn question_score(result: &QuestionResult) -> QuestionScore {
    let reason = match (&result.fused, &result.error) {
        (Some(fused), _) => {
            let justification = fused.justification.trim();
            if justification.is_empty() || justification == DEFAULT_RATIONALE {
                let notes = fused.judgment.notes.trim();
                if notes.is_empty() {
                    NO_ANALYSIS.to_string()
                } else {
                    notes.to_string()
                }
            } else {
                justification.to_string()
            }
        }
        // Crash diagnostics stay out of the machine view
        (None, Some(error)) if error.as_str() == RETRIEVAL_FAILED => error.clone(),
        (None, _) => NO_ANALYSIS.to_string(),
    };

    QuestionScore {
        id: result.id,
        score: result.score,
        reason,
    }
}

fn overall_notes(decision: &BatchDecision) -> String {
    let notes: Vec<&str> = decision
        .results
        .iter()
        .filter_map(|r| r.judgment())
        .map(|j| j.notes.trim())
        .filter(|n| !n.is_empty())
        .collect();

    if notes.is_empty() {
        format!(
            "Processed {} interviews. Average score: {:.1}/4.",
            decision.results.len(),
            decision.mean_score
        )
    } else {
        notes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchAggregator;
    use crate::fusion::ScoreFusion;
    use crate::gaze::GazeAggregator;
    use crate::pipeline::QuestionPipeline;
    use crate::progress::NoopProgress;
    use crate::test_support::services;
    use crate::types::{QuestionInput, RubricJudgment};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn scored(id: i64, score: u8, rationale: &str, notes: &str) -> QuestionResult {
        let mut judgment = RubricJudgment::neutral(rationale, "unused");
        judgment.error = None;
        judgment.raw_score = score;
        judgment.star.score = f64::from(score);
        judgment.toulmin.score = f64::from(score);
        judgment.fluency.score = f64::from(score);
        judgment.notes = notes.to_string();
        let fused = ScoreFusion::fuse(judgment);

        let mut result = QuestionResult::terminal(&QuestionInput::new(id, "Q", "a"), "unused", None);
        result.error = None;
        result.score = fused.final_score;
        result.fused = Some(fused);
        result
    }

    fn fixed(results: Vec<QuestionResult>) -> BatchDecision {
        let mut decision = BatchAggregator::assemble(results);
        decision.reviewed_at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 5, 7).unwrap();
        decision
    }

    #[test]
    fn test_machine_payload_shape() {
        let decision = fixed(vec![
            scored(1, 4, "Excellent ownership.", "Strong STAR."),
            scored(2, 3, "Good examples.", ""),
        ]);
        let encoder = ReviewEncoder::with_instance_id("test-instance".to_string());
        let value = serde_json::to_value(encoder.encode(&decision)).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["decision"], "PASSED");
        assert_eq!(value["data"]["reviewedAt"], "2026-03-14 09:05:07");
        assert_eq!(value["data"]["scores"]["interviewPercentage"], 87.5);
        assert_eq!(value["data"]["scores"]["totalPercentage"], 87.5);
        assert_eq!(value["data"]["perQuestion"][0]["id"], 1);
        assert_eq!(value["data"]["perQuestion"][0]["score"], 4);
        assert_eq!(value["data"]["perQuestion"][0]["reason"], "Excellent ownership.");
        assert_eq!(value["data"]["notes"], "Strong STAR.");
        assert_eq!(value["data"]["producer"]["instanceId"], "test-instance");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_default_rationale_falls_back_to_notes() {
        let decision = fixed(vec![
            scored(1, 2, "Assessment completed", "Detailed notes."),
            scored(2, 2, "", ""),
        ]);
        let payload = ReviewEncoder::new().encode(&decision);
        let data = payload.data.unwrap();
        assert_eq!(data.per_question[0].reason, "Detailed notes.");
        assert_eq!(data.per_question[1].reason, NO_ANALYSIS);
    }

    #[test]
    fn test_notes_summary_when_no_notes() {
        let decision = fixed(vec![scored(1, 2, "Fine.", ""), scored(2, 3, "Good.", "")]);
        let data = ReviewEncoder::new().encode(&decision).data.unwrap();
        assert_eq!(data.notes, "Processed 2 interviews. Average score: 2.5/4.");
        assert_eq!(data.decision, Decision::NeedsReview);
    }

    #[test]
    fn test_terminal_result_reports_error() {
        let failed = QuestionResult::terminal(
            &QuestionInput::new(3, "Q", "a"),
            "Failed to retrieve interview video",
            None,
        );
        let data = ReviewEncoder::new().encode(&fixed(vec![failed])).data.unwrap();
        assert_eq!(data.per_question[0].score, 0);
        assert_eq!(data.per_question[0].reason, "Failed to retrieve interview video");
        assert_eq!(data.decision, Decision::Failed);
    }

    #[test]
    fn test_crashed_question_hides_diagnostic() {
        let harness = services(&[]);
        let pipeline = QuestionPipeline::new(&harness.services, GazeAggregator::new(1, 300), &NoopProgress);
        let crashed = pipeline.run(&QuestionInput::new(6, "Q", "panic"), 0, 1);
        assert!(crashed.diagnostic.is_some());

        let data = ReviewEncoder::new().encode(&fixed(vec![crashed])).data.unwrap();
        assert_eq!(data.per_question[0].score, 0);
        assert_eq!(data.per_question[0].reason, NO_ANALYSIS);
        assert!(!data.per_question[0].reason.contains("transcriber crashed"));
    }

    #[test]
    fn test_failure_payload() {
        let json = ReviewEncoder::failure_to_json("input unreadable", false).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"input unreadable"}"#);
    }
}
