//! Process-scoped collaborator handles
//!
//! The speech-to-text and face-landmark collaborators are expensive to load and
//! may be missing entirely. Each sits behind a [`LazyHandle`]: loaded on first
//! use, at most once, with an unavailable result remembered for the rest of the
//! process. All handles live in one [`Services`] value built at startup and
//! passed by reference into the pipeline.

use crate::capture::{CaptureLandmarker, CaptureTranscriber, CaptureVideoSource};
use crate::gaze::{LandmarkDetector, VideoSource};
use crate::judge::JudgmentEngine;
use crate::retrieval::{LocalRetriever, MediaRetriever};
use crate::transcript::Transcriber;
use serde::Serialize;
use std::sync::OnceLock;

type Loader<T> = Box<dyn Fn() -> Result<T, String> + Send + Sync>;

/// Lazily loaded collaborator
pub struct LazyHandle<T> {
    name: &'static str,
    cell: OnceLock<Option<T>>,
    loader: Loader<T>,
}

impl<T> LazyHandle<T> {
    /// Handle whose value is produced by `loader` on first access
    pub fn new<F>(name: &'static str, loader: F) -> Self
    where
        F: Fn() -> Result<T, String> + Send + Sync + 'static,
    {
        Self {
            name,
            cell: OnceLock::new(),
            loader: Box::new(loader),
        }
    }

    /// Handle that is already loaded
    pub fn ready(name: &'static str, value: T) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(value));
        Self {
            name,
            cell,
            loader: Box::new(move || Err(format!("{name} already initialized"))),
        }
    }

    /// Handle for a collaborator that is not installed
    pub fn unavailable(name: &'static str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(name, move || Err(reason.clone()))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Load on first call; `None` when the collaborator is unavailable
    pub fn get(&self) -> Option<&T> {
        self.cell
            .get_or_init(|| match (self.loader)() {
                Ok(value) => {
                    tracing::info!(handle = self.name, "collaborator loaded");
                    Some(value)
                }
                Err(reason) => {
                    tracing::warn!(handle = self.name, %reason, "collaborator unavailable");
                    None
                }
            })
            .as_ref()
    }

    /// Whether a load has been attempted
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> std::fmt::Debug for LazyHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.cell.get() {
            None => "pending",
            Some(Some(_)) => "available",
            Some(None) => "unavailable",
        };
        f.debug_struct("LazyHandle")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}

/// Availability of the lazily loaded collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub transcriber: bool,
    pub landmarks: bool,
}

/// Every collaborator the pipeline talks to
pub struct Services {
    pub retriever: Box<dyn MediaRetriever>,
    pub video: Box<dyn VideoSource>,
    pub transcriber: LazyHandle<Box<dyn Transcriber>>,
    pub landmarks: LazyHandle<Box<dyn LandmarkDetector>>,
    pub judge: Box<dyn JudgmentEngine>,
}

impl Services {
    pub fn new(
        retriever: Box<dyn MediaRetriever>,
        video: Box<dyn VideoSource>,
        transcriber: LazyHandle<Box<dyn Transcriber>>,
        landmarks: LazyHandle<Box<dyn LandmarkDetector>>,
        judge: Box<dyn JudgmentEngine>,
    ) -> Self {
        Self {
            retriever,
            video,
            transcriber,
            landmarks,
            judge,
        }
    }

    /// Offline services reading capture files staged by a [`LocalRetriever`]
    pub fn offline(judge: Box<dyn JudgmentEngine>) -> Self {
        Self::new(
            Box::new(LocalRetriever::default()),
            Box::new(CaptureVideoSource),
            LazyHandle::new("transcriber", || {
                Ok(Box::new(CaptureTranscriber) as Box<dyn Transcriber>)
            }),
            LazyHandle::new("landmarks", || {
                Ok(Box::new(CaptureLandmarker) as Box<dyn LandmarkDetector>)
            }),
            judge,
        )
    }

    pub fn transcriber(&self) -> Option<&dyn Transcriber> {
        self.transcriber.get().map(|t| t.as_ref())
    }

    pub fn landmarks(&self) -> Option<&dyn LandmarkDetector> {
        self.landmarks.get().map(|d| d.as_ref())
    }

    /// Load both lazy handles ahead of the first question
    pub fn warm_up(&self) -> ServiceStatus {
        let status = ServiceStatus {
            transcriber: self.transcriber.get().is_some(),
            landmarks: self.landmarks.get().is_some(),
        };
        tracing::info!(
            transcriber = status.transcriber,
            landmarks = status.landmarks,
            "services warmed up"
        );
        status
    }
}
