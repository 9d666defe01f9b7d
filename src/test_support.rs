//! Mock collaborators shared by the pipeline and batch tests
//!
//! Faults are keyed on the question locator: `missing` fails retrieval,
//! `mute` fails transcription, `corrupt` fails it with an unclassified error,
//! `blind` fails the video source and `panic` makes the transcriber panic.
//! The judge answers from a per-question script and errors for questions
//! without one.

use crate::capture::CaptureLandmarker;
use crate::error::AssessError;
use crate::gaze::{
    EyeLandmarks, FaceLandmarks, Frame, FramePayload, LandmarkDetector, VideoInfo, VideoSource,
    VideoStream,
};
use crate::judge::{JudgmentEngine, JudgmentRequest};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::retrieval::{MediaRetriever, RetrievedMedia};
use crate::services::{LazyHandle, Services};
use crate::transcript::{build_transcript, Transcriber};
use crate::types::{IntegrityFlag, Stage, Transcript, TranscriptSegment};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

pub(crate) const ANSWER_TEXT: &str = "I shipped the launch two weeks early.";

pub(crate) struct Harness {
    pub services: Services,
    pub cleanups: Rc<Cell<u32>>,
    pub replies: Rc<RefCell<HashMap<i64, String>>>,
}

/// Engine reply giving every score the same value
pub(crate) fn judge_reply(score: u8, flag: IntegrityFlag) -> String {
    format!(
        r#"{{"score": {score}, "reason": "Scored {score}",
            "star_analysis": {{"star_score": {score}, "situation_present": true}},
            "toulmin_analysis": {{"argumentation_score": {score}}},
            "fluency_analysis": {{"fluency_score": {score}}},
            "eye_behavior_analysis": {{"integrity_flag": "{flag}"}},
            "notes": "Notes for {score}."}}"#,
        flag = flag.as_str()
    )
}

/// Services scripted to answer `scores` as `(question id, score)` pairs
pub(crate) fn services(scores: &[(i64, u8)]) -> Harness {
    let cleanups = Rc::new(Cell::new(0));
    let replies = Rc::new(RefCell::new(
        scores
            .iter()
            .map(|(id, score)| (*id, judge_reply(*score, IntegrityFlag::Clean)))
            .collect::<HashMap<_, _>>(),
    ));

    let services = Services::new(
        Box::new(MockRetriever {
            cleanups: Rc::clone(&cleanups),
        }),
        Box::new(MockVideo),
        LazyHandle::ready("transcriber", Box::new(MockTranscriber) as Box<dyn Transcriber>),
        LazyHandle::ready(
            "landmarks",
            Box::new(CaptureLandmarker) as Box<dyn LandmarkDetector>,
        ),
        Box::new(ScriptedJudge {
            replies: Rc::clone(&replies),
        }),
    );

    Harness {
        services,
        cleanups,
        replies,
    }
}

struct MockRetriever {
    cleanups: Rc<Cell<u32>>,
}

impl MediaRetriever for MockRetriever {
    fn retrieve(&self, locator: &str) -> Result<RetrievedMedia, AssessError> {
        if locator.contains("missing") {
            return Err(AssessError::Retrieval(format!("404 for {locator}")));
        }
        Ok(RetrievedMedia::fetched(format!("/virtual/{locator}")))
    }

    fn cleanup(&self, _path: Option<&Path>) {
        self.cleanups.set(self.cleanups.get() + 1);
    }
}

struct MockVideo;

impl VideoSource for MockVideo {
    fn open(&self, path: &Path) -> Result<VideoStream, AssessError> {
        if path.to_string_lossy().contains("blind") {
            return Err(AssessError::GazeAnalysis("camera offline".to_string()));
        }
        let eye = EyeLandmarks {
            iris_x: 0.5,
            inner_corner_x: 0.4,
            outer_corner_x: 0.6,
        };
        let frames = (0..30).map(move |index| Frame {
            index,
            payload: FramePayload::Landmarks(Some(FaceLandmarks {
                left: eye,
                right: eye,
            })),
        });
        Ok(VideoStream {
            info: VideoInfo {
                fps: 30.0,
                frame_count: 30,
            },
            frames: Box::new(frames),
        })
    }
}

struct MockTranscriber;

impl Transcriber for MockTranscriber {
    fn transcribe(&self, path: &Path) -> Result<Transcript, AssessError> {
        let path = path.to_string_lossy();
        if path.contains("panic") {
            panic!("transcriber crashed");
        }
        if path.contains("corrupt") {
            return Err(AssessError::Unclassified("decoder state corrupted".to_string()));
        }
        if path.contains("mute") {
            return Err(AssessError::Transcription("no audio track".to_string()));
        }
        Ok(build_transcript(
            vec![TranscriptSegment {
                id: 0,
                start: 0.0,
                end: 1.0,
                text: ANSWER_TEXT.to_string(),
            }],
            Some("en".to_string()),
            Some(0.99),
            Some(1.0),
        ))
    }
}

struct ScriptedJudge {
    replies: Rc<RefCell<HashMap<i64, String>>>,
}

impl ScriptedJudge {
    fn question_id(prompt: &str) -> Option<i64> {
        let marker = "- **Question ID**: ";
        let start = prompt.find(marker)? + marker.len();
        let digits: String = prompt[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '-')
            .collect();
        digits.parse().ok()
    }
}

impl JudgmentEngine for ScriptedJudge {
    fn judge(&self, request: &JudgmentRequest) -> Result<String, AssessError> {
        Self::question_id(&request.prompt)
            .and_then(|id| self.replies.borrow().get(&id).cloned())
            .ok_or_else(|| AssessError::JudgmentEngine("engine offline".to_string()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Records stages, optionally failing every notification
pub(crate) struct RecordingProgress {
    pub stages: RefCell<Vec<Stage>>,
    fail: bool,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self {
            stages: RefCell::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn notify(&self, event: &ProgressEvent) -> Result<(), String> {
        self.stages.borrow_mut().push(event.stage);
        if self.fail {
            Err("ui disconnected".to_string())
        } else {
            Ok(())
        }
    }
}
