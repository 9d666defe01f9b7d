//! Capture-file collaborators
//!
//! A capture file holds the signals extracted ahead of time from one answer
//! video, one JSON record per line:
//!
//! ```text
//! {"kind":"video","fps":30.0,"frame_count":900}
//! {"kind":"frame","index":0,"face":{"left":{...},"right":{...}}}
//! {"kind":"frame","index":15,"face":null}
//! {"kind":"speech","language":"en","language_probability":0.98,"duration":30.0}
//! {"kind":"segment","id":0,"start":0.0,"end":4.2,"text":"..."}
//! ```
//!
//! The collaborators here let the whole pipeline run offline against such files.

use crate::error::AssessError;
use crate::gaze::{
    FaceLandmarks, Frame, FramePayload, LandmarkDetector, VideoInfo, VideoSource, VideoStream,
};
use crate::transcript::{build_transcript, Transcriber};
use crate::types::{Transcript, TranscriptSegment};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CaptureRecord {
    Video {
        fps: f64,
        frame_count: u64,
    },
    Frame {
        index: u64,
        #[serde(default)]
        face: Option<FaceLandmarks>,
    },
    Speech {
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        language_probability: Option<f64>,
        #[serde(default)]
        duration: Option<f64>,
    },
    Segment {
        id: u32,
        start: f64,
        end: f64,
        text: String,
    },
}

/// Speech-track metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechInfo {
    pub language: Option<String>,
    pub language_probability: Option<f64>,
    pub duration_sec: Option<f64>,
}

/// Parsed capture file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    pub video: Option<VideoInfo>,
    /// Per-frame landmarks, `None` where no face was found
    pub frames: Vec<(u64, Option<FaceLandmarks>)>,
    pub speech: Option<SpeechInfo>,
    pub segments: Vec<TranscriptSegment>,
}

impl Capture {
    /// Parse newline-delimited capture records; blank lines are ignored
    pub fn parse(content: &str) -> Result<Self, AssessError> {
        let mut capture = Capture::default();

        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: CaptureRecord =
                serde_json::from_str(line).map_err(|e| AssessError::Capture {
                    line: i + 1,
                    message: e.to_string(),
                })?;

            match record {
                CaptureRecord::Video { fps, frame_count } => {
                    capture.video = Some(VideoInfo { fps, frame_count });
                }
                CaptureRecord::Frame { index, face } => capture.frames.push((index, face)),
                CaptureRecord::Speech {
                    language,
                    language_probability,
                    duration,
                } => {
                    capture.speech = Some(SpeechInfo {
                        language,
                        language_probability,
                        duration_sec: duration,
                    });
                }
                CaptureRecord::Segment {
                    id,
                    start,
                    end,
                    text,
                } => capture.segments.push(TranscriptSegment {
                    id,
                    start,
                    end,
                    text,
                }),
            }
        }

        capture.frames.sort_by_key(|(index, _)| *index);
        Ok(capture)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssessError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Container info, inferred from the frame records when absent
    pub fn video_info(&self) -> Option<VideoInfo> {
        self.video.or_else(|| {
            self.frames.last().map(|(index, _)| VideoInfo {
                fps: 0.0,
                frame_count: index + 1,
            })
        })
    }
}

/// Opens capture files as frame streams carrying precomputed landmarks
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureVideoSource;

impl VideoSource for CaptureVideoSource {
    fn open(&self, path: &Path) -> Result<VideoStream, AssessError> {
        let capture = Capture::from_file(path)
            .map_err(|e| AssessError::GazeAnalysis(format!("{}: {e}", path.display())))?;
        let info = capture.video_info().ok_or_else(|| {
            AssessError::GazeAnalysis(format!("Could not open video: {}", path.display()))
        })?;

        let frames = capture.frames.into_iter().map(|(index, face)| Frame {
            index,
            payload: FramePayload::Landmarks(face),
        });

        Ok(VideoStream {
            info,
            frames: Box::new(frames),
        })
    }
}

/// Reads the landmarks a capture frame already carries
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureLandmarker;

impl LandmarkDetector for CaptureLandmarker {
    fn detect(&self, frame: &Frame) -> Option<FaceLandmarks> {
        match &frame.payload {
            FramePayload::Landmarks(face) => *face,
            FramePayload::Pixels { .. } => None,
        }
    }
}

/// Builds transcripts from the speech segments of a capture file
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureTranscriber;

impl Transcriber for CaptureTranscriber {
    fn transcribe(&self, path: &Path) -> Result<Transcript, AssessError> {
        if !path.exists() {
            return Err(AssessError::Transcription(format!(
                "Video file not found: {}",
                path.display()
            )));
        }
        let capture = Capture::from_file(path)
            .map_err(|e| AssessError::Transcription(format!("{}: {e}", path.display())))?;

        let speech = capture.speech.unwrap_or_default();
        let transcript = build_transcript(
            capture.segments,
            speech.language,
            speech.language_probability,
            speech.duration_sec,
        );
        tracing::debug!(
            chars = transcript.text.len(),
            segments = transcript.metadata.segments.len(),
            "transcription complete"
        );
        Ok(transcript)
    }
}
