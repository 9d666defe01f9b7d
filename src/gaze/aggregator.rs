//! Gaze metrics aggregation
//!
//! Reduces the sampled frames of one video into summary statistics. Frames
//! without a detected face contribute nothing; they are excluded rather than
//! counted as zero.

use crate::config::GazeConfig;
use crate::error::AssessError;
use crate::gaze::landmarks::{Frame, LandmarkDetector, VideoSource};
use crate::round_to;
use crate::types::{AnalysisMode, GazeObservation, GazeSummary};
use std::path::Path;

/// Gaze within this distance of center (0.5) counts as eye contact
pub const EYE_CONTACT_THRESHOLD: f64 = 0.3;

pub const NO_FACE_NOTE: &str = "No face detected in video";
pub const FALLBACK_NOTE: &str = "Landmark detector unavailable - using fallback metrics";
pub const MEASURED_NOTE: &str = "Analysis completed successfully";

// Placeholder statistics reported in fallback mode
const FALLBACK_FACE_DETECTION_RATE: f64 = 50.0;
const FALLBACK_EYE_CONTACT: f64 = 70.0;
const FALLBACK_STABILITY: f64 = 75.0;
const FALLBACK_LOOKING_AWAY: f64 = 30.0;

/// Result of sweeping the frames of one video
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sweep {
    /// One observation per processed frame with a face
    pub observations: Vec<GazeObservation>,
    pub frames_processed: u32,
}

/// Samples frames and summarizes gaze behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GazeAggregator {
    sample_stride: u32,
    max_samples: u32,
}

impl Default for GazeAggregator {
    fn default() -> Self {
        Self::from_config(&GazeConfig::default())
    }
}

impl GazeAggregator {
    /// Create an aggregator processing every `sample_stride`-th frame, at most
    /// `max_samples` frames in total
    pub fn new(sample_stride: u32, max_samples: u32) -> Self {
        Self {
            sample_stride: sample_stride.max(1),
            max_samples: max_samples.max(1),
        }
    }

    pub fn from_config(config: &GazeConfig) -> Self {
        Self::new(config.sample_stride, config.max_samples)
    }

    pub fn sample_stride(&self) -> u32 {
        self.sample_stride
    }

    pub fn max_samples(&self) -> u32 {
        self.max_samples
    }

    /// Analyze one video.
    ///
    /// With no detector available the fixed fallback summary is returned; it is
    /// marked [`AnalysisMode::Fallback`] so callers can tell it apart from
    /// measured data.
    pub fn analyze(
        &self,
        video: &dyn VideoSource,
        detector: Option<&dyn LandmarkDetector>,
        path: &Path,
    ) -> Result<GazeSummary, AssessError> {
        let stream = video.open(path)?;
        let duration = stream.info.duration_sec();

        let Some(detector) = detector else {
            tracing::warn!(path = %path.display(), "landmark detector unavailable, using fallback gaze metrics");
            return Ok(fallback_summary(duration));
        };

        let sweep = self.sweep(stream.frames, detector);
        tracing::debug!(
            frames_processed = sweep.frames_processed,
            frames_with_face = sweep.observations.len(),
            "gaze sweep complete"
        );

        Ok(summarize(&sweep.observations, sweep.frames_processed, duration))
    }

    /// Run the detector over every sampled frame
    pub fn sweep(
        &self,
        frames: impl IntoIterator<Item = Frame>,
        detector: &dyn LandmarkDetector,
    ) -> Sweep {
        let mut sweep = Sweep::default();
        let stride = u64::from(self.sample_stride);

        for frame in frames {
            if frame.index % stride != 0 {
                continue;
            }

            sweep.frames_processed += 1;
            if let Some(face) = detector.detect(&frame) {
                sweep.observations.push(face.observe());
            }

            if sweep.frames_processed >= self.max_samples {
                break;
            }
        }

        sweep
    }
}

/// Summarize gaze observations
///
/// `frames_processed` counts every sampled frame, with or without a face.
pub fn summarize(
    observations: &[GazeObservation],
    frames_processed: u32,
    video_duration_sec: f64,
) -> GazeSummary {
    if observations.is_empty() {
        let mut summary = GazeSummary::empty(AnalysisMode::NoFace, NO_FACE_NOTE);
        summary.frames_analyzed = frames_processed;
        summary.video_duration_sec = round_to(video_duration_sec, 2);
        return summary;
    }

    let n = observations.len() as f64;
    let gaze_values: Vec<f64> = observations.iter().map(|o| o.gaze_position).collect();

    let eye_contact_frames = gaze_values
        .iter()
        .filter(|g| (*g - 0.5).abs() < EYE_CONTACT_THRESHOLD)
        .count();
    // Counted on the complementary set so threshold-boundary frames land in exactly one bucket
    let looking_away_frames = gaze_values
        .iter()
        .filter(|g| (*g - 0.5).abs() >= EYE_CONTACT_THRESHOLD)
        .count();

    let eye_contact_percentage = eye_contact_frames as f64 / n * 100.0;
    let looking_away_percentage = looking_away_frames as f64 / n * 100.0;

    let mean_gaze = gaze_values.iter().sum::<f64>() / n;
    let std_dev = population_std_dev(&gaze_values, mean_gaze);
    let gaze_stability = compute_gaze_stability(std_dev);

    let mean_eye_contact_score = observations
        .iter()
        .map(|o| o.eye_contact_score)
        .sum::<f64>()
        / n;

    let attention = attention_score(
        mean_eye_contact_score * 100.0,
        gaze_stability,
        looking_away_percentage,
    );

    let face_detection_rate = if frames_processed > 0 {
        (observations.len() as f64 / f64::from(frames_processed) * 100.0).min(100.0)
    } else {
        0.0
    };

    GazeSummary {
        face_detection_rate: round_to(face_detection_rate, 2),
        eye_contact_percentage: round_to(eye_contact_percentage, 2),
        gaze_stability: round_to(gaze_stability, 2),
        looking_away_percentage: round_to(looking_away_percentage, 2),
        attention_score: round_to(attention, 2),
        mean_eye_contact_score: round_to(mean_eye_contact_score, 3),
        avg_gaze_position: round_to(mean_gaze, 3),
        gaze_variance: round_to(std_dev, 3),
        video_duration_sec: round_to(video_duration_sec, 2),
        frames_analyzed: frames_processed,
        frames_with_face: observations.len() as u32,
        analysis_notes: MEASURED_NOTE.to_string(),
        mode: AnalysisMode::Measured,
    }
}

/// Fixed placeholder summary used when no landmark detector is available
pub fn fallback_summary(video_duration_sec: f64) -> GazeSummary {
    GazeSummary {
        face_detection_rate: FALLBACK_FACE_DETECTION_RATE,
        eye_contact_percentage: FALLBACK_EYE_CONTACT,
        gaze_stability: FALLBACK_STABILITY,
        looking_away_percentage: FALLBACK_LOOKING_AWAY,
        attention_score: round_to(
            attention_score(FALLBACK_EYE_CONTACT, FALLBACK_STABILITY, FALLBACK_LOOKING_AWAY),
            2,
        ),
        mean_eye_contact_score: FALLBACK_EYE_CONTACT / 100.0,
        avg_gaze_position: 0.5,
        gaze_variance: 0.0,
        video_duration_sec: round_to(video_duration_sec, 2),
        frames_analyzed: 0,
        frames_with_face: 0,
        analysis_notes: FALLBACK_NOTE.to_string(),
        mode: AnalysisMode::Fallback,
    }
}

/// Composite attention score (%)
///
/// Formula:
/// ```text
/// Attention = 0.4 * eye_contact + 0.3 * stability + 0.3 * (100 - looking_away)
/// ```
pub fn attention_score(eye_contact: f64, stability: f64, looking_away: f64) -> f64 {
    let score = 0.4 * eye_contact + 0.3 * stability + 0.3 * (100.0 - looking_away);
    score.clamp(0.0, 100.0)
}

/// Spread-based stability proxy: `max(0, 1 - 2 * std_dev) * 100`
fn compute_gaze_stability(std_dev: f64) -> f64 {
    (1.0 - std_dev * 2.0).max(0.0) * 100.0
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaze::landmarks::{
        EyeLandmarks, FaceLandmarks, FramePayload, VideoInfo, VideoStream,
    };
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn obs(gaze: f64) -> GazeObservation {
        GazeObservation {
            gaze_position: gaze,
            eye_contact_score: 1.0 - (gaze - 0.5).abs() * 2.0,
        }
    }

    fn face_at(iris: f64) -> FaceLandmarks {
        let eye = EyeLandmarks {
            iris_x: iris,
            inner_corner_x: 0.0,
            outer_corner_x: 1.0,
        };
        FaceLandmarks { left: eye, right: eye }
    }

    /// Detector that reads precomputed landmarks and counts calls
    struct CountingDetector {
        calls: Cell<u32>,
    }

    impl LandmarkDetector for CountingDetector {
        fn detect(&self, frame: &Frame) -> Option<FaceLandmarks> {
            self.calls.set(self.calls.get() + 1);
            match &frame.payload {
                FramePayload::Landmarks(face) => *face,
                FramePayload::Pixels { .. } => None,
            }
        }
    }

    fn frames(count: u64, face_every: u64) -> Vec<Frame> {
        (0..count)
            .map(|index| Frame {
                index,
                payload: FramePayload::Landmarks(if index % face_every == 0 {
                    Some(face_at(0.5))
                } else {
                    None
                }),
            })
            .collect()
    }

    struct StaticVideo {
        fps: f64,
        frames: Vec<Frame>,
    }

    impl VideoSource for StaticVideo {
        fn open(&self, _path: &Path) -> Result<VideoStream, AssessError> {
            Ok(VideoStream {
                info: VideoInfo {
                    fps: self.fps,
                    frame_count: self.frames.len() as u64,
                },
                frames: Box::new(self.frames.clone().into_iter()),
            })
        }
    }

    struct MissingVideo;

    impl VideoSource for MissingVideo {
        fn open(&self, path: &Path) -> Result<VideoStream, AssessError> {
            Err(AssessError::GazeAnalysis(format!(
                "Video file not found: {}",
                path.display()
            )))
        }
    }

    #[test]
    fn test_empty_observations_give_no_face_summary() {
        let summary = summarize(&[], 12, 30.0);
        assert_eq!(summary.mode, AnalysisMode::NoFace);
        assert_eq!(summary.analysis_notes, NO_FACE_NOTE);
        assert_eq!(summary.frames_analyzed, 12);
        assert_eq!(summary.frames_with_face, 0);
        assert_eq!(summary.eye_contact_percentage, 0.0);
        assert_eq!(summary.gaze_stability, 0.0);
        assert_eq!(summary.looking_away_percentage, 0.0);
        assert_eq!(summary.attention_score, 0.0);
        assert_eq!(summary.face_detection_rate, 0.0);
    }

    #[test]
    fn test_empty_observations_are_deterministic() {
        assert_eq!(summarize(&[], 0, 0.0), summarize(&[], 0, 0.0));
    }

    #[test]
    fn test_perfect_center_gaze() {
        let observations = vec![obs(0.5); 10];
        let summary = summarize(&observations, 10, 10.0);
        assert_eq!(summary.mode, AnalysisMode::Measured);
        assert_eq!(summary.face_detection_rate, 100.0);
        assert_eq!(summary.eye_contact_percentage, 100.0);
        assert_eq!(summary.looking_away_percentage, 0.0);
        assert_eq!(summary.gaze_stability, 100.0);
        assert_eq!(summary.attention_score, 100.0);
        assert_eq!(summary.avg_gaze_position, 0.5);
        assert_eq!(summary.gaze_variance, 0.0);
    }

    #[test]
    fn test_eye_contact_and_looking_away_partition_frames() {
        // |g - 0.5| values: 0.0, 0.1, 0.35, 0.4
        let observations = vec![obs(0.5), obs(0.6), obs(0.85), obs(0.1)];
        let summary = summarize(&observations, 4, 4.0);
        assert_eq!(summary.eye_contact_percentage, 50.0);
        assert_eq!(summary.looking_away_percentage, 50.0);
    }

    #[test]
    fn test_stability_from_spread() {
        // gaze 0.3 and 0.7: mean 0.5, population std 0.2 → stability (1 - 0.4) * 100
        let observations = vec![obs(0.3), obs(0.7)];
        let summary = summarize(&observations, 2, 2.0);
        assert!((summary.gaze_stability - 60.0).abs() < 1e-9);
        assert!((summary.gaze_variance - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_stability_floors_at_zero() {
        let observations = vec![obs(0.0), obs(1.0)];
        let summary = summarize(&observations, 2, 2.0);
        assert_eq!(summary.gaze_stability, 0.0);
        assert_eq!(summary.looking_away_percentage, 100.0);
    }

    #[test]
    fn test_attention_is_recomputed_from_components() {
        let observations = vec![obs(0.3), obs(0.7), obs(0.5), obs(0.95)];
        let summary = summarize(&observations, 8, 8.0);
        let expected = attention_score(
            summary.mean_eye_contact_score * 100.0,
            summary.gaze_stability,
            summary.looking_away_percentage,
        );
        assert!((summary.attention_score - expected).abs() < 0.05);
        assert_eq!(summary.face_detection_rate, 50.0);
    }

    #[test]
    fn test_attention_weights() {
        assert!((attention_score(100.0, 0.0, 100.0) - 40.0).abs() < 1e-9);
        assert!((attention_score(0.0, 100.0, 100.0) - 30.0).abs() < 1e-9);
        assert!((attention_score(0.0, 0.0, 0.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_percentages_within_bounds() {
        let observations: Vec<_> = (0..=20).map(|i| obs(i as f64 / 20.0)).collect();
        let summary = summarize(&observations, 21, 7.0);
        for value in [
            summary.face_detection_rate,
            summary.eye_contact_percentage,
            summary.gaze_stability,
            summary.looking_away_percentage,
            summary.attention_score,
        ] {
            assert!((0.0..=100.0).contains(&value), "{value} out of range");
        }
    }

    #[test]
    fn test_sweep_respects_stride() {
        let detector = CountingDetector { calls: Cell::new(0) };
        let aggregator = GazeAggregator::new(3, 1000);
        let sweep = aggregator.sweep(frames(10, 1), &detector);
        // indices 0, 3, 6, 9
        assert_eq!(sweep.frames_processed, 4);
        assert_eq!(detector.calls.get(), 4);
        assert_eq!(sweep.observations.len(), 4);
    }

    #[test]
    fn test_sweep_stops_at_budget() {
        let detector = CountingDetector { calls: Cell::new(0) };
        let aggregator = GazeAggregator::new(1, 5);
        let sweep = aggregator.sweep(frames(100, 1), &detector);
        assert_eq!(sweep.frames_processed, 5);
        assert_eq!(detector.calls.get(), 5);
    }

    #[test]
    fn test_sweep_excludes_faceless_frames() {
        let detector = CountingDetector { calls: Cell::new(0) };
        let aggregator = GazeAggregator::new(1, 100);
        let sweep = aggregator.sweep(frames(10, 2), &detector);
        assert_eq!(sweep.frames_processed, 10);
        assert_eq!(sweep.observations.len(), 5);

        let summary = summarize(&sweep.observations, sweep.frames_processed, 1.0);
        assert_eq!(summary.face_detection_rate, 50.0);
        // faceless frames are excluded, not counted as looking away
        assert_eq!(summary.eye_contact_percentage, 100.0);
    }

    #[test]
    fn test_zero_stride_is_treated_as_one() {
        let aggregator = GazeAggregator::new(0, 0);
        assert_eq!(aggregator.sample_stride(), 1);
        assert_eq!(aggregator.max_samples(), 1);
    }

    #[test]
    fn test_analyze_without_detector_is_distinguishable_fallback() {
        let video = StaticVideo {
            fps: 30.0,
            frames: frames(300, 1),
        };
        let summary = GazeAggregator::default()
            .analyze(&video, None, Path::new("answer.ndjson"))
            .unwrap();

        assert!(summary.is_fallback());
        assert_eq!(summary.mode, AnalysisMode::Fallback);
        assert_eq!(summary.analysis_notes, FALLBACK_NOTE);
        assert_eq!(summary.frames_analyzed, 0);
        assert_eq!(summary.video_duration_sec, 10.0);
        assert_eq!(summary.eye_contact_percentage, 70.0);

        let measured = GazeAggregator::default()
            .analyze(
                &video,
                Some(&CountingDetector { calls: Cell::new(0) }),
                Path::new("answer.ndjson"),
            )
            .unwrap();
        assert!(!measured.is_fallback());
        assert_ne!(measured.analysis_notes, summary.analysis_notes);
    }

    #[test]
    fn test_fallback_attention_matches_formula() {
        let summary = fallback_summary(0.0);
        // 0.4 * 70 + 0.3 * 75 + 0.3 * 70
        assert!((summary.attention_score - 71.5).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_no_face_video() {
        let video = StaticVideo {
            fps: 25.0,
            frames: (0..50)
                .map(|index| Frame {
                    index,
                    payload: FramePayload::Landmarks(None),
                })
                .collect(),
        };
        let detector = CountingDetector { calls: Cell::new(0) };
        let summary = GazeAggregator::new(5, 300)
            .analyze(&video, Some(&detector), Path::new("x"))
            .unwrap();
        assert_eq!(summary.mode, AnalysisMode::NoFace);
        assert_eq!(summary.frames_analyzed, 10);
        assert_eq!(summary.video_duration_sec, 2.0);
    }

    #[test]
    fn test_analyze_missing_video_is_error() {
        let detector = CountingDetector { calls: Cell::new(0) };
        let result = GazeAggregator::default().analyze(
            &MissingVideo,
            Some(&detector),
            Path::new("gone.ndjson"),
        );
        assert!(matches!(result, Err(AssessError::GazeAnalysis(_))));
    }
}
