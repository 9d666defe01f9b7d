//! Gaze metrics computation module
//!
//! This module reduces a sampled frame stream into one [`GazeSummary`] per
//! answer video: eye contact, stability, looking-away share and a composite
//! attention score.
//!
//! Pipeline: VideoSource → frame sampling → LandmarkDetector → GazeObservation → summary
//!
//! [`GazeSummary`]: crate::types::GazeSummary

pub mod aggregator;
pub mod landmarks;

pub use aggregator::{attention_score, fallback_summary, summarize, GazeAggregator, Sweep};
pub use landmarks::{
    EyeLandmarks, FaceLandmarks, Frame, FramePayload, LandmarkDetector, VideoInfo, VideoSource,
    VideoStream,
};
