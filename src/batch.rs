//! Batch aggregation
//!
//! Runs the per-question pipeline over a whole interview, in input order, and
//! reduces the final scores to one decision.
//!
//! The decision label follows the mean score while the interview percentage
//! follows the score sum; near the thresholds the two can look inconsistent
//! (a 2.5 mean is NEEDS_REVIEW at 62.5%).

use crate::config::GazeConfig;
use crate::error::AssessError;
use crate::gaze::GazeAggregator;
use crate::pipeline::QuestionPipeline;
use crate::progress::{NoopProgress, ProgressSink};
use crate::round_to;
use crate::services::Services;
use crate::types::{BatchDecision, Decision, QuestionInput, QuestionResult};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Mean score at or above which an interview passes
pub const PASS_THRESHOLD: f64 = 3.0;
/// Mean score at or above which an interview goes to human review
pub const REVIEW_THRESHOLD: f64 = 2.0;

const MAX_SCORE: f64 = 4.0;

/// Decision label for a mean score
pub fn decide(mean: f64) -> Decision {
    if mean >= PASS_THRESHOLD {
        Decision::Passed
    } else if mean >= REVIEW_THRESHOLD {
        Decision::NeedsReview
    } else {
        Decision::Failed
    }
}

/// Arithmetic mean of the scores, 0 when there are none
pub fn mean_score(scores: &[u8]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64
}

/// `round(100 * sum / (4 * count), 1)`, 0 when there are no scores
pub fn interview_percentage(scores: &[u8]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: f64 = scores.iter().map(|s| f64::from(*s)).sum();
    round_to(total / (MAX_SCORE * scores.len() as f64) * 100.0, 1)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchRequest {
    Bare(Vec<QuestionInput>),
    Wrapped {
        interviews: Vec<QuestionInput>,
    },
    #[serde(rename_all = "camelCase")]
    Checklist {
        review_checklists: Checklist,
    },
}

#[derive(Deserialize)]
struct Checklist {
    interviews: Vec<QuestionInput>,
}

/// Parse a batch request: a bare array, `{"interviews": [...]}` or
/// `{"reviewChecklists": {"interviews": [...]}}`
pub fn parse_request(json: &str) -> Result<Vec<QuestionInput>, AssessError> {
    let request: BatchRequest = serde_json::from_str(json)?;
    Ok(match request {
        BatchRequest::Bare(interviews) | BatchRequest::Wrapped { interviews } => interviews,
        BatchRequest::Checklist { review_checklists } => review_checklists.interviews,
    })
}

/// Scores a whole interview
pub struct BatchAggregator<'a> {
    services: &'a Services,
    aggregator: GazeAggregator,
    progress: &'a dyn ProgressSink,
}

impl<'a> BatchAggregator<'a> {
    pub fn new(services: &'a Services, gaze: &GazeConfig) -> Self {
        Self {
            services,
            aggregator: GazeAggregator::from_config(gaze),
            progress: &NoopProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Score every question that has media; always completes
    pub fn run(&self, questions: &[QuestionInput]) -> BatchDecision {
        let scorable: Vec<&QuestionInput> = questions.iter().filter(|q| q.is_scorable()).collect();
        let skipped = questions.len() - scorable.len();
        if skipped > 0 {
            tracing::info!(skipped, "skipping questions without media");
        }

        let pipeline = QuestionPipeline::new(self.services, self.aggregator, self.progress);
        let count = scorable.len();
        let results = scorable
            .into_iter()
            .enumerate()
            .map(|(index, input)| pipeline.run(input, index, count))
            .collect();

        let decision = Self::assemble(results);
        tracing::info!(
            run_id = %decision.run_id,
            questions = decision.results.len(),
            mean = decision.mean_score,
            decision = %decision.decision,
            "batch complete"
        );
        decision
    }

    /// Reduce finished question results to a decision
    pub fn assemble(results: Vec<QuestionResult>) -> BatchDecision {
        let scores: Vec<u8> = results.iter().map(|r| r.score).collect();
        let mean = mean_score(&scores);

        BatchDecision {
            run_id: Uuid::new_v4(),
            reviewed_at: Utc::now(),
            mean_score: mean,
            decision: decide(mean),
            interview_percentage: interview_percentage(&scores),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RETRIEVAL_FAILED;
    use crate::test_support::{services, RecordingProgress};
    use pretty_assertions::assert_eq;

    fn scored(scores: &[u8]) -> BatchDecision {
        let results = scores
            .iter()
            .enumerate()
            .map(|(i, score)| {
                let mut result = QuestionResult::terminal(
                    &QuestionInput::new(i as i64, "Q", "a"),
                    "unused",
                    None,
                );
                result.error = None;
                result.score = *score;
                result
            })
            .collect();
        BatchAggregator::assemble(results)
    }

    #[test]
    fn test_all_fours_pass() {
        let decision = scored(&[4, 4, 4, 4]);
        assert_eq!(decision.mean_score, 4.0);
        assert_eq!(decision.decision, Decision::Passed);
        assert_eq!(decision.interview_percentage, 100.0);
    }

    #[test]
    fn test_all_ones_fail() {
        let decision = scored(&[1, 1]);
        assert_eq!(decision.mean_score, 1.0);
        assert_eq!(decision.decision, Decision::Failed);
        assert_eq!(decision.interview_percentage, 25.0);
    }

    #[test]
    fn test_mixed_needs_review() {
        let decision = scored(&[2, 3]);
        assert_eq!(decision.mean_score, 2.5);
        assert_eq!(decision.decision, Decision::NeedsReview);
        assert_eq!(decision.interview_percentage, 62.5);
    }

    #[test]
    fn test_empty_batch_fails_with_zero() {
        let decision = scored(&[]);
        assert_eq!(decision.mean_score, 0.0);
        assert_eq!(decision.decision, Decision::Failed);
        assert_eq!(decision.interview_percentage, 0.0);
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(decide(3.0), Decision::Passed);
        assert_eq!(decide(2.99), Decision::NeedsReview);
        assert_eq!(decide(2.0), Decision::NeedsReview);
        assert_eq!(decide(1.99), Decision::Failed);
    }

    #[test]
    fn test_percentage_rounds_to_one_decimal() {
        // 5 / 12 * 100 = 41.666...
        assert_eq!(interview_percentage(&[1, 2, 2]), 41.7);
    }

    #[test]
    fn test_retrieval_failure_does_not_block_batch() {
        let harness = services(&[(1, 4), (2, 4), (3, 4)]);
        let questions = vec![
            QuestionInput::new(1, "First", "answer-1"),
            QuestionInput::new(2, "Second", "missing-2"),
            QuestionInput::new(3, "Third", "answer-3"),
        ];

        let decision = BatchAggregator::new(&harness.services, &GazeConfig::default()).run(&questions);

        assert_eq!(decision.scores(), vec![4, 0, 4]);
        assert_eq!(decision.results[1].error.as_deref(), Some(RETRIEVAL_FAILED));
        assert!(decision.results[0].error.is_none());
        assert!(decision.results[2].error.is_none());
        assert_eq!(harness.cleanups.get(), 3);
        // 8 / 3 mean, label from mean, percentage from sum
        assert_eq!(decision.decision, Decision::NeedsReview);
        assert_eq!(decision.interview_percentage, 66.7);
    }

    #[test]
    fn test_questions_without_media_are_skipped() {
        let harness = services(&[(1, 3)]);
        let mut silent = QuestionInput::new(2, "Second", "answer-2");
        silent.has_media = false;
        let questions = vec![
            QuestionInput::new(1, "First", "answer-1"),
            silent,
            QuestionInput::new(3, "Third", ""),
        ];

        let progress = RecordingProgress::new();
        let decision = BatchAggregator::new(&harness.services, &GazeConfig::default())
            .with_progress(&progress)
            .run(&questions);

        assert_eq!(decision.results.len(), 1);
        assert_eq!(decision.results[0].id, 1);
        assert_eq!(decision.mean_score, 3.0);
        assert_eq!(progress.stages.borrow().len(), 5);
    }

    #[test]
    fn test_every_question_failing_still_decides() {
        let harness = services(&[]);
        let questions = vec![
            QuestionInput::new(1, "Q", "missing-1"),
            QuestionInput::new(2, "Q", "missing-2"),
        ];
        let decision = BatchAggregator::new(&harness.services, &GazeConfig::default()).run(&questions);
        assert_eq!(decision.scores(), vec![0, 0]);
        assert_eq!(decision.decision, Decision::Failed);
    }

    #[test]
    fn test_parse_request_shapes() {
        let bare = parse_request(r#"[{"id": 1, "question": "Q", "videoLocator": "a"}]"#).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = parse_request(r#"{"interviews": [{"id": 2, "videoLocator": "b"}]}"#).unwrap();
        assert_eq!(wrapped[0].id, 2);

        let checklist = parse_request(
            r#"{"reviewChecklists": {"interviews": [
                {"positionId": 3, "question": "Q", "recordedVideoUrl": "c", "isVideoExist": true}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(checklist[0].id, 3);
        assert_eq!(checklist[0].video_locator, "c");

        assert!(parse_request(r#"{"nothing": []}"#).is_err());
        assert!(parse_request(r#"[{"question": "Q", "videoLocator": "a"}]"#).is_err());
    }
}
