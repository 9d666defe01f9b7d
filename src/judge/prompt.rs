//! Rubric prompt rendering
//!
//! The prompt asks the judgment engine for a single JSON object whose keys are
//! the ones [`crate::judge::parser`] reads back.

use crate::types::GazeSummary;
use std::fmt::Write as _;

/// Transcript placeholder when nothing was transcribed
pub const EMPTY_TRANSCRIPT: &str = "[No speech detected or transcription failed]";

const PREAMBLE: &str = "\
You are an Industrial/Organizational psychologist scoring a structured interview.
Apply evidence-based psychometric principles and behaviorally anchored ratings.";

const GAZE_GUIDANCE: &str = "\
**Cognitive gaze aversion:**
- Looking away WHILE THINKING is normal and a POSITIVE sign of cognitive processing, not a negative one
- Constant staring without breaks may point to a memorized or scripted answer
- Flag as suspicious only for a repetitive horizontal reading pattern or a fixed off-screen focus";

const FRAMEWORK: &str = "\
## EVALUATION FRAMEWORK

### 1. STAR structure
Expected share of a behavioral answer: Situation 10-15%, Task 10-15%,
Action 50-60% (the concrete steps the candidate took), Result 15-20% (quantified where possible).

### 2. Toulmin argumentation
Identify the Claim, the Grounds (facts, numbers, examples), the Warrant linking them,
and any Rebuttal acknowledging counter-arguments.

### 3. Pronoun ownership
In the Action segment, compare I/me/my against we/us/our. A ratio below 0.2 suggests
the candidate is describing team work without a clear personal contribution.

### 4. Fluency and authenticity
Filler words per 100 words: under 3 is natural, 3-5 is mild nervousness, over 5 is high
anxiety or lack of preparation. Natural pauses are authentic; robotic perfection is not.

### 5. Eye behavior
Gaze aversion while thinking is positive. Steady eye contact on key points shows engagement.
A horizontal scanning pattern suggests reading; a fixed off-screen focus suggests outside help.";

const RUBRIC: &str = "\
## SCORING RUBRIC

- **0 Very poor**: no relevant content, clear signs of reading or outside help, no STAR components.
- **1 Poor**: minimal relevance, Situation only with no Action or Result, over 7 fillers per 100 words.
- **2 Average**: addresses the question without depth, weak or missing Result, general statements.
- **3 Good**: complete STAR with clear Action and Result, specific examples with some metrics, natural delivery.
- **4 Excellent**: quantified Results, Claim + Grounds + Warrant present, acknowledges trade-offs,
  strong ownership in the Action segment, confident natural delivery.";

const OUTPUT_SCHEMA: &str = r#"## REQUIRED OUTPUT (JSON ONLY)

{
  "score": <0-4>,
  "reason": "<1-2 sentence justification>",
  "star_analysis": {
    "situation_present": <true|false>,
    "task_present": <true|false>,
    "action_present": <true|false>,
    "action_specificity": "<vague|moderate|specific>",
    "result_present": <true|false>,
    "result_quantified": <true|false>,
    "star_score": <0-4>,
    "distribution_assessment": "<S-T-A-R balance>"
  },
  "toulmin_analysis": {
    "claim_present": <true|false>,
    "grounds_present": <true|false>,
    "grounds_quality": "<anecdotal|factual|data-driven>",
    "warrant_present": <true|false>,
    "rebuttal_present": <true|false>,
    "argumentation_score": <0-4>,
    "reasoning": "<argument quality>"
  },
  "pronoun_analysis": {
    "i_ratio_in_action": <0.0-1.0>,
    "ownership_level": "<low|moderate|high>",
    "assessment": "<individual vs team contribution>"
  },
  "fluency_analysis": {
    "disfluency_density": "<low|moderate|high>",
    "filler_words_detected": "<none|few|many>",
    "speech_pattern": "<natural|rehearsed|nervous|robotic>",
    "fluency_score": <0-4>,
    "assessment": "<fluency and authenticity>"
  },
  "eye_behavior_analysis": {
    "cognitive_gaze_aversion": "<appropriate|excessive|absent>",
    "reading_pattern_detected": <true|false>,
    "engagement_level": "<low|moderate|high>",
    "integrity_flag": "<clean|warning|suspicious>",
    "interpretation": "<interpretation of eye behavior>"
  },
  "overall_assessment": {
    "strengths": ["<strength>"],
    "weaknesses": ["<weakness>"],
    "confidence_level": "<LOW|MEDIUM|HIGH>",
    "authenticity_score": <0-4>
  },
  "notes": "<3-5 sentences for the interviewer: content and STAR, argumentation, fluency, eye behavior, red flags>",
  "improvement_suggestions": "<specific advice for the candidate>"
}"#;

/// Renders the evaluation rubric for one answer
pub struct RubricPrompt;

impl RubricPrompt {
    pub fn render(question_id: i64, question: &str, transcript: &str, gaze: &GazeSummary) -> String {
        let transcript = if transcript.trim().is_empty() {
            EMPTY_TRANSCRIPT
        } else {
            transcript
        };

        let mut prompt = String::with_capacity(6 * 1024);
        prompt.push_str(PREAMBLE);
        prompt.push_str("\n\n## Interview Context\n");
        let _ = writeln!(prompt, "- **Question ID**: {question_id}");
        let _ = writeln!(prompt, "- **Question**: {question}");

        prompt.push_str("\n## Candidate's Response (Transcribed)\n");
        prompt.push_str(transcript);
        prompt.push_str("\n\n## Eye Movement Data\n");
        let _ = writeln!(
            prompt,
            "- **Eye Contact Percentage**: {:.1}%",
            gaze.eye_contact_percentage
        );
        let _ = writeln!(prompt, "- **Gaze Stability**: {:.1}%", gaze.gaze_stability);
        let _ = writeln!(prompt, "- **Attention Score**: {:.1}%", gaze.attention_score);
        let _ = writeln!(
            prompt,
            "- **Looking Away Percentage**: {:.1}%",
            gaze.looking_away_percentage
        );
        if !gaze.is_measured() {
            let _ = writeln!(prompt, "- **Note**: {}", gaze.analysis_notes);
        }

        prompt.push('\n');
        prompt.push_str(GAZE_GUIDANCE);
        prompt.push_str("\n\n---\n\n");
        prompt.push_str(FRAMEWORK);
        prompt.push_str("\n\n---\n\n");
        prompt.push_str(RUBRIC);
        prompt.push_str("\n\n---\n\n");
        prompt.push_str(OUTPUT_SCHEMA);
        prompt.push('\n');
        prompt
    }
}
