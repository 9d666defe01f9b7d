//! Score fusion
//!
//! Late fusion of the rubric judgment into one bounded score:
//!
//! ```text
//! verbal   = (narrative + argumentation) / 2
//! weighted = 0.75 * verbal + 0.15 * raw + 0.10 * fluency
//! final    = clamp(round_half_even(weighted), 0, 4)
//! ```
//!
//! A `suspicious` integrity flag then vetoes two points, floored at zero.

use crate::error::AssessError;
use crate::judge::{JudgmentEngine, JudgmentRequest, ResponseParser, RubricPrompt};
use crate::pipeline::StageOutcome;
use crate::round_to;
use crate::types::{FusedResult, GazeSummary, IntegrityFlag, RubricJudgment};

pub const VERBAL_WEIGHT: f64 = 0.75;
pub const RAW_WEIGHT: f64 = 0.15;
pub const FLUENCY_WEIGHT: f64 = 0.10;

/// Points removed for a suspicious integrity flag
pub const INTEGRITY_PENALTY: u8 = 2;

pub const INTEGRITY_WARNING: &str = "[INTEGRITY WARNING: Suspicious behavior detected]";

const MAX_SCORE: u8 = 4;

/// Weighted score before rounding
pub fn weighted_score(narrative: f64, argumentation: f64, raw: f64, fluency: f64) -> f64 {
    let verbal = (narrative + argumentation) / 2.0;
    VERBAL_WEIGHT * verbal + RAW_WEIGHT * raw + FLUENCY_WEIGHT * fluency
}

/// Round half to even and clamp to [0, 4]
pub fn bounded_score(weighted: f64) -> u8 {
    if !weighted.is_finite() {
        return RubricJudgment::NEUTRAL_SCORE;
    }
    weighted.round_ties_even().clamp(0.0, f64::from(MAX_SCORE)) as u8
}

/// Apply the integrity veto
pub fn apply_integrity_penalty(score: u8, flag: IntegrityFlag) -> u8 {
    match flag {
        IntegrityFlag::Suspicious => score.saturating_sub(INTEGRITY_PENALTY),
        IntegrityFlag::Clean | IntegrityFlag::Warning => score,
    }
}

fn annotate(text: &mut String) {
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(INTEGRITY_WARNING);
}

/// Drives the judgment engine and fuses its verdict
pub struct ScoreFusion<'a> {
    engine: &'a dyn JudgmentEngine,
}

impl<'a> ScoreFusion<'a> {
    pub fn new(engine: &'a dyn JudgmentEngine) -> Self {
        Self { engine }
    }

    /// Judge one answer and fuse the result
    ///
    /// Never fatal: engine and parse failures fall back to a neutral judgment,
    /// which is fused like any other and reported as a degradation.
    pub fn assess(
        &self,
        question_id: i64,
        question: &str,
        transcript: &str,
        gaze: &GazeSummary,
    ) -> StageOutcome<FusedResult> {
        let prompt = RubricPrompt::render(question_id, question, transcript, gaze);
        let request = JudgmentRequest::new(prompt, self.engine.model());

        let (judgment, degradation) = match self.engine.judge(&request) {
            Ok(text) => match ResponseParser::parse(&text) {
                Ok(judgment) => (judgment, None),
                Err(e) => (ResponseParser::parse_or_default(&text), Some(e)),
            },
            Err(e) => {
                let cause = match &e {
                    AssessError::JudgmentEngine(message) => message.clone(),
                    other => other.to_string(),
                };
                tracing::warn!(question_id, engine = self.engine.name(), %cause, "judgment engine failed");
                let judgment = RubricJudgment::neutral(
                    format!("Judgment engine error: {cause}"),
                    e.to_string(),
                );
                (judgment, Some(AssessError::JudgmentEngine(cause)))
            }
        };

        let fused = Self::fuse(judgment);
        tracing::debug!(
            question_id,
            final_score = fused.final_score,
            weighted = fused.weighted_score,
            "fused"
        );

        match degradation {
            None => StageOutcome::Ok(fused),
            Some(cause) => StageOutcome::Degraded(fused, cause),
        }
    }

    /// Fuse a parsed judgment into the final score
    pub fn fuse(mut judgment: RubricJudgment) -> FusedResult {
        let weighted = weighted_score(
            judgment.narrative_score(),
            judgment.argumentation_score(),
            f64::from(judgment.raw_score),
            judgment.fluency_score(),
        );
        let base_score = bounded_score(weighted);
        let final_score = apply_integrity_penalty(base_score, judgment.integrity_flag());
        let integrity_penalty_applied = judgment.integrity_flag() == IntegrityFlag::Suspicious;

        if integrity_penalty_applied {
            annotate(&mut judgment.rationale);
            annotate(&mut judgment.notes);
        }

        FusedResult {
            final_score,
            base_score,
            weighted_score: round_to(weighted, 2),
            integrity_penalty_applied,
            justification: judgment.rationale.clone(),
            judgment,
        }
    }
}
