//! Human-readable detail view
//!
//! Renders a batch decision as markdown: a header with the decision and one
//! section per question with the psychometric breakdown behind its score.

use crate::types::{BatchDecision, QuestionResult, RubricJudgment};
use std::fmt::Write as _;

/// Transcript characters shown per question
const TRANSCRIPT_PREVIEW_CHARS: usize = 250;

const NA: &str = "N/A";

pub struct NarrativeReport;

impl NarrativeReport {
    pub fn render(decision: &BatchDecision) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Interview Assessment\n");
        let _ = writeln!(out, "**Decision:** {}", decision.decision);
        let _ = writeln!(out, "**Average Score:** {:.2}/4", decision.mean_score);
        let _ = writeln!(out, "**Interview Score:** {:.1}%", decision.interview_percentage);
        let _ = writeln!(out, "**Questions:** {}", decision.results.len());
        let _ = writeln!(out, "**Run:** {}", decision.run_id);
        let _ = writeln!(
            out,
            "**Reviewed At:** {}",
            decision.reviewed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        for result in &decision.results {
            out.push('\n');
            out.push_str(&Self::render_question(result));
        }
        out
    }

    pub fn render_question(result: &QuestionResult) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "### Question {}", result.id);
        let _ = writeln!(out, "**Score:** {}/4 {}\n", result.score, stars(result.score));

        let Some(fused) = &result.fused else {
            let _ = writeln!(
                out,
                "**Error:** {}",
                result.error.as_deref().unwrap_or("Question could not be scored")
            );
            out.push_str("\n---\n");
            return out;
        };

        let _ = writeln!(out, "**Reason:** {}\n", fused.justification);
        out.push_str("---\n#### Psychometric Analysis\n\n");
        render_judgment(&mut out, &fused.judgment);

        if !result.degradations.is_empty() {
            out.push_str("**Degraded Stages:** ");
            let stages: Vec<String> = result
                .degradations
                .iter()
                .map(|d| format!("{} ({})", d.stage, d.cause))
                .collect();
            let _ = writeln!(out, "{}\n", stages.join("; "));
        }

        let _ = writeln!(out, "**Transcript Preview:** {}", transcript_preview(&result.transcript));
        out.push_str("\n---\n");
        out
    }
}

fn render_judgment(out: &mut String, j: &RubricJudgment) {
    let star = &j.star;
    let _ = writeln!(
        out,
        "**STAR Method:** S{} T{} A{} R{} | Action Specificity: {} | Result Quantified: {}\n",
        tick(star.situation_present),
        tick(star.task_present),
        tick(star.action_present),
        tick(star.result_present),
        or_na(&star.action_specificity),
        if star.result_quantified { "Yes" } else { "No" }
    );

    let toulmin = &j.toulmin;
    let _ = writeln!(
        out,
        "**Argumentation (Toulmin):** Claim: {} | Grounds: {} | Rebuttal: {}\n",
        tick(toulmin.claim_present),
        or_na(&toulmin.grounds_quality),
        tick(toulmin.rebuttal_present)
    );

    let ratio = j
        .pronoun
        .i_ratio_in_action
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| NA.to_string());
    let _ = writeln!(
        out,
        "**Ownership:** I-ratio: {} | Level: {}\n",
        ratio,
        or_na(&j.pronoun.ownership_level)
    );

    let _ = writeln!(
        out,
        "**Fluency:** {} | Disfluency: {} | Score: {}/4\n",
        or_na(&j.fluency.speech_pattern),
        or_na(&j.fluency.disfluency_density),
        j.fluency.score
    );

    let eye = &j.eye_behavior;
    let _ = writeln!(
        out,
        "**Eye Behavior:** Engagement: {} | Cognitive Aversion: {} | Integrity: {}\n",
        or_na(&eye.engagement_level),
        or_na(&eye.cognitive_gaze_aversion),
        eye.integrity_flag.as_str()
    );

    out.push_str("---\n#### Notes\n");
    let notes = if j.notes.trim().is_empty() { NA } else { j.notes.as_str() };
    let _ = writeln!(out, "{notes}\n");
    let _ = writeln!(out, "**Strengths:** {}", list_or_na(&j.overall.strengths));
    let _ = writeln!(out, "**Areas to Improve:** {}\n", list_or_na(&j.overall.weaknesses));
}

/// Filled and empty stars for a 0-4 score
pub fn stars(score: u8) -> String {
    let filled = usize::from(score.min(4));
    format!("{}{}", "★".repeat(filled), "☆".repeat(4 - filled))
}

/// First 250 characters, with an ellipsis when cut
pub fn transcript_preview(transcript: &str) -> String {
    if transcript.is_empty() {
        return NA.to_string();
    }
    let mut preview: String = transcript.chars().take(TRANSCRIPT_PREVIEW_CHARS).collect();
    if transcript.chars().count() > TRANSCRIPT_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn tick(present: bool) -> &'static str {
    if present {
        "✓"
    } else {
        "✗"
    }
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NA)
}

fn list_or_na(items: &[String]) -> String {
    if items.is_empty() {
        NA.to_string()
    } else {
        items.join(", ")
    }
}
