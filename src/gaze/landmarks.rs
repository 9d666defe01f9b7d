//! Frame and landmark seams
//!
//! Video decoding and face-landmark detection are external collaborators. This
//! module defines their boundary and the per-frame gaze math applied to what
//! they return.

use crate::error::AssessError;
use crate::types::GazeObservation;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Horizontal landmark positions of one eye (normalized image coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub iris_x: f64,
    pub inner_corner_x: f64,
    pub outer_corner_x: f64,
}

impl EyeLandmarks {
    /// Horizontal gaze ratio in [0, 1]
    ///
    /// Formula: `(iris_x - inner_corner_x) / (outer_corner_x - inner_corner_x)`.
    /// A degenerate (zero-width) eye reads as centered.
    pub fn gaze_ratio(&self) -> f64 {
        let eye_width = self.outer_corner_x - self.inner_corner_x;
        if eye_width == 0.0 || !eye_width.is_finite() {
            return 0.5;
        }
        let ratio = (self.iris_x - self.inner_corner_x) / eye_width;
        if ratio.is_nan() {
            return 0.5;
        }
        ratio.clamp(0.0, 1.0)
    }
}

/// Eye landmarks of the single tracked face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left: EyeLandmarks,
    pub right: EyeLandmarks,
}

impl FaceLandmarks {
    /// Average both eyes into one gaze observation
    pub fn observe(&self) -> GazeObservation {
        let gaze_position = (self.left.gaze_ratio() + self.right.gaze_ratio()) / 2.0;
        GazeObservation {
            gaze_position,
            eye_contact_score: 1.0 - (gaze_position - 0.5).abs() * 2.0,
        }
    }
}

/// What a frame carries for the detector
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    /// Decoded RGB pixels
    Pixels {
        width: u32,
        height: u32,
        rgb: Vec<u8>,
    },
    /// Landmarks extracted ahead of time (`None` = no face in this frame)
    Landmarks(Option<FaceLandmarks>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position of the frame in the video
    pub index: u64,
    pub payload: FramePayload,
}

/// Container-level video properties
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub fps: f64,
    pub frame_count: u64,
}

impl VideoInfo {
    pub fn duration_sec(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// An opened video: its properties and its frames in order
pub struct VideoStream {
    pub info: VideoInfo,
    pub frames: Box<dyn Iterator<Item = Frame>>,
}

/// Decodes answer videos into frames
pub trait VideoSource {
    fn open(&self, path: &Path) -> Result<VideoStream, AssessError>;
}

/// Finds the tracked face in a frame
pub trait LandmarkDetector {
    /// Returns `None` when no face is detected
    fn detect(&self, frame: &Frame) -> Option<FaceLandmarks>;
}
