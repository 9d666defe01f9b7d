//! One-way progress reporting
//!
//! The pipeline reports each stage transition to a [`ProgressSink`]. A sink
//! that fails is logged and otherwise ignored; progress never changes an
//! outcome.

use crate::types::Stage;
use serde::Serialize;

/// A stage transition for one question
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Position of the question in the batch (0-based)
    pub question_index: usize,
    pub question_count: usize,
    pub question_id: i64,
    pub stage: Stage,
}

impl ProgressEvent {
    /// Overall completion in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.question_count == 0 {
            return 1.0;
        }
        let within = match self.stage {
            Stage::Retrieve => 0.0,
            Stage::Transcribe => 0.25,
            Stage::GazeAggregate => 0.5,
            Stage::Fuse => 0.75,
            Stage::Done => 1.0,
        };
        ((self.question_index as f64 + within) / self.question_count as f64).min(1.0)
    }
}

pub trait ProgressSink {
    fn notify(&self, event: &ProgressEvent) -> Result<(), String>;
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn notify(&self, _event: &ProgressEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Logs every event at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn notify(&self, event: &ProgressEvent) -> Result<(), String> {
        tracing::info!(
            question = event.question_index + 1,
            of = event.question_count,
            id = event.question_id,
            stage = %event.stage,
            "{:.0}%",
            event.fraction() * 100.0
        );
        Ok(())
    }
}

/// Deliver an event, swallowing sink failures
pub(crate) fn report(sink: &dyn ProgressSink, event: ProgressEvent) {
    if let Err(e) = sink.notify(&event) {
        tracing::debug!(stage = %event.stage, error = %e, "progress sink failed");
    }
}
