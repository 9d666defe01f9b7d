//! Per-question pipeline orchestration
//!
//! Runs one question through the stage machine
//! RETRIEVE → TRANSCRIBE → GAZE_AGGREGATE → FUSE → DONE.
//!
//! Every stage yields a [`StageOutcome`]. Only a `Fatal` outcome stops the
//! question; a `Degraded` one carries a substitute value and is recorded on the
//! result. Panics inside collaborators are caught at the top and turned into an
//! `Unclassified` failure. Retrieved media is cleaned up exactly once on every
//! path, panics included.

use crate::error::AssessError;
use crate::fusion::ScoreFusion;
use crate::gaze::GazeAggregator;
use crate::progress::{report, ProgressEvent, ProgressSink};
use crate::retrieval::MediaGuard;
use crate::services::Services;
use crate::types::{
    AnalysisMode, FusedResult, GazeSummary, QuestionInput, QuestionResult, RubricJudgment, Stage,
    StageDegradation, Transcript, TranscriptMetadata,
};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Once;

/// Message recorded when an answer video cannot be retrieved
pub const RETRIEVAL_FAILED: &str = "Failed to retrieve interview video";

/// Result of one stage
#[derive(Debug)]
pub enum StageOutcome<T> {
    Ok(T),
    /// Stage failed; a substitute value lets processing continue
    Degraded(T, AssessError),
    /// Stage failed and the question cannot be scored
    Fatal(AssessError),
}

impl<T> StageOutcome<T> {
    /// Degrade to `fallback` on a recoverable error; terminal errors stay fatal
    pub fn recover(result: Result<T, AssessError>, fallback: impl FnOnce(&AssessError) -> T) -> Self {
        match result {
            Ok(value) => StageOutcome::Ok(value),
            Err(e) if e.is_terminal() => StageOutcome::Fatal(e),
            Err(e) => StageOutcome::Degraded(fallback(&e), e),
        }
    }

    /// Treat any error as fatal
    pub fn require(result: Result<T, AssessError>) -> Self {
        match result {
            Ok(value) => StageOutcome::Ok(value),
            Err(e) => StageOutcome::Fatal(e),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StageOutcome::Ok(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded(..))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StageOutcome::Fatal(_))
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            StageOutcome::Ok(value) | StageOutcome::Degraded(value, _) => Some(value),
            StageOutcome::Fatal(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AssessError> {
        match self {
            StageOutcome::Ok(_) => None,
            StageOutcome::Degraded(_, e) | StageOutcome::Fatal(e) => Some(e),
        }
    }
}

thread_local! {
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Record the location and backtrace of panics on this thread
fn install_panic_capture() {
    static INSTALLED: Once = Once::new();
    INSTALLED.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture();
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(format!("{info}\n{trace}")));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Scores one question at a time against a set of services
pub struct QuestionPipeline<'a> {
    services: &'a Services,
    aggregator: GazeAggregator,
    progress: &'a dyn ProgressSink,
}

impl<'a> QuestionPipeline<'a> {
    pub fn new(
        services: &'a Services,
        aggregator: GazeAggregator,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        install_panic_capture();
        Self {
            services,
            aggregator,
            progress,
        }
    }

    /// Score one question; never panics and never fails
    ///
    /// `index` and `count` locate the question in its batch for progress reports.
    pub fn run(&self, input: &QuestionInput, index: usize, count: usize) -> QuestionResult {
        LAST_PANIC.with(|slot| slot.borrow_mut().take());

        match catch_unwind(AssertUnwindSafe(|| self.run_stages(input, index, count))) {
            Ok(result) => result,
            Err(payload) => {
                let error = AssessError::Unclassified(panic_message(payload.as_ref()));
                let diagnostic = LAST_PANIC
                    .with(|slot| slot.borrow_mut().take())
                    .unwrap_or_else(|| Backtrace::force_capture().to_string());
                tracing::error!(question_id = input.id, error = %error, "question aborted");
                self.notify(input, index, count, Stage::Done);
                QuestionResult::terminal(input, error.to_string(), Some(diagnostic))
            }
        }
    }

    fn run_stages(&self, input: &QuestionInput, index: usize, count: usize) -> QuestionResult {
        let mut degradations = Vec::new();
        let mut guard = MediaGuard::new(self.services.retriever.as_ref());

        // Stage 1: Retrieve
        self.notify(input, index, count, Stage::Retrieve);
        let path = match self.retrieve(input, &mut guard) {
            StageOutcome::Ok(path) => path,
            StageOutcome::Degraded(path, cause) => {
                record(&mut degradations, Stage::Retrieve, &cause);
                path
            }
            StageOutcome::Fatal(cause) => {
                tracing::warn!(question_id = input.id, %cause, "{RETRIEVAL_FAILED}");
                return self.abort(input, index, count, RETRIEVAL_FAILED);
            }
        };

        // Stage 2: Transcribe
        self.notify(input, index, count, Stage::Transcribe);
        let transcript = match settle(self.transcribe(&path), Stage::Transcribe, &mut degradations) {
            Ok(transcript) => transcript,
            Err(cause) => return self.abort(input, index, count, cause.to_string()),
        };

        // Stage 3: Aggregate gaze
        self.notify(input, index, count, Stage::GazeAggregate);
        let gaze = match settle(self.aggregate_gaze(&path), Stage::GazeAggregate, &mut degradations) {
            Ok(gaze) => gaze,
            Err(cause) => return self.abort(input, index, count, cause.to_string()),
        };

        // Stage 4: Judge and fuse
        self.notify(input, index, count, Stage::Fuse);
        let question = input.question_text();
        let fusion = ScoreFusion::new(self.services.judge.as_ref());
        let fused = match settle(
            fusion.assess(input.id, &question, &transcript.text, &gaze),
            Stage::Fuse,
            &mut degradations,
        ) {
            Ok(fused) => fused,
            Err(cause) => return self.abort(input, index, count, cause.to_string()),
        };

        self.notify(input, index, count, Stage::Done);
        tracing::info!(
            question_id = input.id,
            score = fused.final_score,
            degraded = degradations.len(),
            "question scored"
        );

        build_result(input, question, transcript, gaze, fused, degradations)
    }

    fn retrieve(&self, input: &QuestionInput, guard: &mut MediaGuard<'_>) -> StageOutcome<PathBuf> {
        let staged = self
            .services
            .retriever
            .retrieve(&input.video_locator)
            .and_then(|media| {
                guard.track(media.local_path.clone());
                match media.local_path {
                    Some(path) if media.success => Ok(path),
                    _ => Err(AssessError::Retrieval(format!(
                        "download of {} did not complete",
                        input.video_locator
                    ))),
                }
            });
        StageOutcome::require(staged)
    }

    /// Zero-score result for a question stopped by a terminal stage failure
    fn abort(
        &self,
        input: &QuestionInput,
        index: usize,
        count: usize,
        error: impl Into<String>,
    ) -> QuestionResult {
        self.notify(input, index, count, Stage::Done);
        QuestionResult::terminal(input, error, None)
    }

    fn transcribe(&self, path: &Path) -> StageOutcome<Transcript> {
        let result = match self.services.transcriber() {
            Some(transcriber) => transcriber.transcribe(path),
            None => Err(AssessError::Transcription(
                "Speech-to-text model unavailable".to_string(),
            )),
        };
        StageOutcome::recover(result, |e| Transcript {
            text: String::new(),
            metadata: TranscriptMetadata::failed(e.to_string()),
        })
    }

    fn aggregate_gaze(&self, path: &Path) -> StageOutcome<GazeSummary> {
        let result = self.aggregator.analyze(
            self.services.video.as_ref(),
            self.services.landmarks(),
            path,
        );
        StageOutcome::recover(result, |e| {
            GazeSummary::empty(AnalysisMode::Failed, e.to_string())
        })
    }

    fn notify(&self, input: &QuestionInput, index: usize, count: usize, stage: Stage) {
        report(
            self.progress,
            ProgressEvent {
                question_index: index,
                question_count: count,
                question_id: input.id,
                stage,
            },
        );
    }
}

fn record(degradations: &mut Vec<StageDegradation>, stage: Stage, cause: &AssessError) {
    tracing::warn!(%stage, %cause, "stage degraded");
    degradations.push(StageDegradation {
        stage,
        cause: cause.to_string(),
    });
}

/// Unwrap a non-retrieval stage, recording degradations
fn settle<T>(
    outcome: StageOutcome<T>,
    stage: Stage,
    degradations: &mut Vec<StageDegradation>,
) -> Result<T, AssessError> {
    match outcome {
        StageOutcome::Ok(value) => Ok(value),
        StageOutcome::Degraded(value, cause) => {
            record(degradations, stage, &cause);
            Ok(value)
        }
        StageOutcome::Fatal(cause) => {
            tracing::warn!(%stage, %cause, "stage failed");
            Err(cause)
        }
    }
}

fn build_result(
    input: &QuestionInput,
    question: String,
    transcript: Transcript,
    gaze: GazeSummary,
    fused: FusedResult,
    degradations: Vec<StageDegradation>,
) -> QuestionResult {
    QuestionResult {
        id: input.id,
        question,
        score: fused.final_score,
        fused: Some(fused),
        transcript: transcript.text,
        transcript_metadata: Some(transcript.metadata),
        gaze: Some(gaze),
        degradations,
        error: None,
        diagnostic: None,
    }
}
