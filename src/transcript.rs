//! Transcription seam and segment filtering

use crate::error::AssessError;
use crate::types::{Transcript, TranscriptMetadata, TranscriptSegment};
use std::collections::HashSet;
use std::path::Path;

/// Segments shorter than this (trimmed, in characters) are dropped
const MIN_SEGMENT_CHARS: usize = 3;
/// Repetition check applies to segments with more words than this
const REPETITION_MIN_WORDS: usize = 5;
/// Unique-word ratio below which a segment is treated as a hallucinated loop
const MIN_UNIQUE_RATIO: f64 = 0.3;

/// Speech-to-text collaborator
pub trait Transcriber {
    fn transcribe(&self, path: &Path) -> Result<Transcript, AssessError>;
}

/// Whether a segment looks like real speech
pub fn keep_segment(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < MIN_SEGMENT_CHARS {
        return false;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > REPETITION_MIN_WORDS {
        let unique: HashSet<&str> = words.iter().copied().collect();
        let unique_ratio = unique.len() as f64 / words.len() as f64;
        if unique_ratio < MIN_UNIQUE_RATIO {
            return false;
        }
    }

    true
}

/// Drop short and looping segments, trimming the survivors
pub fn filter_segments(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    segments
        .into_iter()
        .filter_map(|mut segment| {
            if !keep_segment(&segment.text) {
                tracing::debug!(id = segment.id, "skipping segment");
                return None;
            }
            segment.text = segment.text.trim().to_string();
            Some(segment)
        })
        .collect()
}

/// Assemble a transcript from raw segments
pub fn build_transcript(
    segments: Vec<TranscriptSegment>,
    language: Option<String>,
    language_probability: Option<f64>,
    duration_sec: Option<f64>,
) -> Transcript {
    let segments = filter_segments(segments);
    let text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Transcript {
        text,
        metadata: TranscriptMetadata {
            language,
            language_probability,
            duration_sec,
            segments,
            error: None,
        },
    }
}
