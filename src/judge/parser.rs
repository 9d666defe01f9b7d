//! Judgment response parsing
//!
//! Engine output is free-form text that usually contains one JSON object. The
//! parser runs an ordered chain of extraction strategies and keeps the first
//! one that yields an object. Field values are read leniently: numeric strings
//! count as numbers and a malformed section reads as absent.

use crate::error::AssessError;
use crate::types::{
    ConfidenceLevel, EyeBehaviorAnalysis, FluencyAnalysis, IntegrityFlag, OverallAssessment,
    PronounAnalysis, RubricJudgment, StarAnalysis, ToulminAnalysis,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::OnceLock;

/// Rationale used when the engine gave none
pub const DEFAULT_RATIONALE: &str = "Assessment completed";

/// Characters of raw output quoted in a parse-failure rationale
const PREVIEW_CHARS: usize = 200;

const MAX_SCORE: f64 = 4.0;

fn fenced_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)\s*```").expect("fenced block pattern is valid")
    })
}

/// One way of locating the JSON object in engine output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// The whole response is the object
    Direct,
    /// The object sits in a ```json or bare ``` block
    FencedBlock,
    /// The object spans the first `{` to the last `}`
    BraceSpan,
}

impl ParseStrategy {
    /// Strategies in the order they are tried
    pub const CHAIN: [ParseStrategy; 3] = [
        ParseStrategy::Direct,
        ParseStrategy::FencedBlock,
        ParseStrategy::BraceSpan,
    ];

    fn attempt(&self, text: &str) -> Option<WireJudgment> {
        match self {
            ParseStrategy::Direct => decode_object(text.trim()),
            ParseStrategy::FencedBlock => fenced_block()
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .find_map(|body| decode_object(body.as_str())),
            ParseStrategy::BraceSpan => {
                let start = text.find('{')?;
                let end = text.rfind('}')?;
                if end <= start {
                    return None;
                }
                decode_object(&text[start..=end])
            }
        }
    }
}

/// Only a JSON object counts as a judgment
fn decode_object(candidate: &str) -> Option<WireJudgment> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Turns engine output into a [`RubricJudgment`]
pub struct ResponseParser;

impl ResponseParser {
    /// Parse with the first strategy that succeeds
    pub fn parse(text: &str) -> Result<RubricJudgment, AssessError> {
        Self::parse_with_strategy(text).map(|(judgment, _)| judgment)
    }

    /// Parse and report which strategy matched
    pub fn parse_with_strategy(text: &str) -> Result<(RubricJudgment, ParseStrategy), AssessError> {
        for strategy in ParseStrategy::CHAIN {
            if let Some(wire) = strategy.attempt(text) {
                tracing::debug!(?strategy, "judgment parsed");
                return Ok((wire.into_judgment(), strategy));
            }
        }
        Err(AssessError::JudgmentParse(
            "Response parsing failed".to_string(),
        ))
    }

    /// Parse, substituting a low-confidence neutral judgment on failure
    pub fn parse_or_default(text: &str) -> RubricJudgment {
        match Self::parse(text) {
            Ok(judgment) => judgment,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable judgment, using neutral default");
                let preview: String = text.chars().take(PREVIEW_CHARS).collect();
                RubricJudgment::neutral(
                    format!("Could not parse response: {preview}..."),
                    e.to_string(),
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireJudgment {
    #[serde(deserialize_with = "lenient_number")]
    score: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    reason: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    reasoning: Option<String>,
    #[serde(deserialize_with = "lenient_section")]
    star_analysis: WireStar,
    #[serde(deserialize_with = "lenient_section")]
    toulmin_analysis: WireToulmin,
    #[serde(deserialize_with = "lenient_section")]
    pronoun_analysis: WirePronoun,
    #[serde(deserialize_with = "lenient_section")]
    fluency_analysis: WireFluency,
    #[serde(deserialize_with = "lenient_section")]
    eye_behavior_analysis: WireEyeBehavior,
    #[serde(deserialize_with = "lenient_section")]
    overall_assessment: WireOverall,
    #[serde(deserialize_with = "lenient_text")]
    confidence_level: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    notes: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    improvement_suggestions: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireStar {
    #[serde(deserialize_with = "lenient_bool")]
    situation_present: bool,
    #[serde(deserialize_with = "lenient_bool")]
    task_present: bool,
    #[serde(deserialize_with = "lenient_bool")]
    action_present: bool,
    #[serde(deserialize_with = "lenient_text")]
    action_specificity: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    result_present: bool,
    #[serde(deserialize_with = "lenient_bool")]
    result_quantified: bool,
    #[serde(deserialize_with = "lenient_number")]
    star_score: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    distribution_assessment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireToulmin {
    #[serde(deserialize_with = "lenient_bool")]
    claim_present: bool,
    #[serde(deserialize_with = "lenient_bool")]
    grounds_present: bool,
    #[serde(deserialize_with = "lenient_text")]
    grounds_quality: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    warrant_present: bool,
    #[serde(deserialize_with = "lenient_bool")]
    rebuttal_present: bool,
    #[serde(deserialize_with = "lenient_number")]
    argumentation_score: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    reasoning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePronoun {
    #[serde(deserialize_with = "lenient_number")]
    i_ratio_in_action: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    ownership_level: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    assessment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireFluency {
    #[serde(deserialize_with = "lenient_text")]
    disfluency_density: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    filler_words_detected: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    speech_pattern: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    fluency_score: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    assessment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireEyeBehavior {
    #[serde(deserialize_with = "lenient_text")]
    cognitive_gaze_aversion: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    reading_pattern_detected: bool,
    #[serde(deserialize_with = "lenient_text")]
    engagement_level: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    integrity_flag: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    interpretation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireOverall {
    #[serde(deserialize_with = "lenient_list")]
    strengths: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    weaknesses: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    confidence_level: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    authenticity_score: Option<f64>,
}

impl WireJudgment {
    fn into_judgment(self) -> RubricJudgment {
        let raw_score = self
            .score
            .filter(|s| s.is_finite())
            .map(|s| s.trunc().clamp(0.0, MAX_SCORE) as u8)
            .unwrap_or(RubricJudgment::NEUTRAL_SCORE);
        let raw = f64::from(raw_score);
        let sub_score = |value: Option<f64>| clamp_score(value).unwrap_or(raw);

        let star = self.star_analysis;
        let toulmin = self.toulmin_analysis;
        let pronoun = self.pronoun_analysis;
        let fluency = self.fluency_analysis;
        let eye = self.eye_behavior_analysis;
        let overall = self.overall_assessment;

        let confidence = overall
            .confidence_level
            .or(self.confidence_level)
            .map(|c| ConfidenceLevel::parse(&c))
            .unwrap_or_default();

        RubricJudgment {
            raw_score,
            star: StarAnalysis {
                situation_present: star.situation_present,
                task_present: star.task_present,
                action_present: star.action_present,
                action_specificity: star.action_specificity,
                result_present: star.result_present,
                result_quantified: star.result_quantified,
                score: sub_score(star.star_score),
                distribution_assessment: star.distribution_assessment,
            },
            toulmin: ToulminAnalysis {
                claim_present: toulmin.claim_present,
                grounds_present: toulmin.grounds_present,
                grounds_quality: toulmin.grounds_quality,
                warrant_present: toulmin.warrant_present,
                rebuttal_present: toulmin.rebuttal_present,
                score: sub_score(toulmin.argumentation_score),
                reasoning: toulmin.reasoning,
            },
            pronoun: PronounAnalysis {
                i_ratio_in_action: pronoun
                    .i_ratio_in_action
                    .filter(|r| r.is_finite())
                    .map(|r| r.clamp(0.0, 1.0)),
                ownership_level: pronoun.ownership_level,
                assessment: pronoun.assessment,
            },
            fluency: FluencyAnalysis {
                disfluency_density: fluency.disfluency_density,
                filler_words_detected: fluency.filler_words_detected,
                speech_pattern: fluency.speech_pattern,
                score: sub_score(fluency.fluency_score),
                assessment: fluency.assessment,
            },
            eye_behavior: EyeBehaviorAnalysis {
                cognitive_gaze_aversion: eye.cognitive_gaze_aversion,
                reading_pattern_detected: eye.reading_pattern_detected,
                engagement_level: eye.engagement_level,
                integrity_flag: eye
                    .integrity_flag
                    .map(|f| IntegrityFlag::parse(&f))
                    .unwrap_or_default(),
                interpretation: eye.interpretation,
            },
            overall: OverallAssessment {
                strengths: overall.strengths,
                weaknesses: overall.weaknesses,
                confidence,
                authenticity_score: clamp_score(overall.authenticity_score),
            },
            rationale: self
                .reason
                .or(self.reasoning)
                .unwrap_or_else(|| DEFAULT_RATIONALE.to_string()),
            notes: self.notes.unwrap_or_default(),
            improvement_suggestions: self.improvement_suggestions,
            error: self.error,
        }
    }
}

fn clamp_score(value: Option<f64>) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, MAX_SCORE))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

fn lenient_section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}
