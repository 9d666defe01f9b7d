//! Media retrieval
//!
//! A [`MediaRetriever`] stages an answer video somewhere local and removes it
//! again once the question is scored. [`MediaGuard`] ties the removal to scope
//! exit so it happens exactly once on every path.

use crate::error::AssessError;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Prefix of the per-question scratch directories
pub const SCRATCH_PREFIX: &str = "interview-flux-";

/// Outcome of staging one answer video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedMedia {
    /// Local copy, or a partial file left by a failed attempt
    pub local_path: Option<PathBuf>,
    pub success: bool,
}

impl RetrievedMedia {
    pub fn fetched(path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: Some(path.into()),
            success: true,
        }
    }

    pub fn failed(partial: Option<PathBuf>) -> Self {
        Self {
            local_path: partial,
            success: false,
        }
    }
}

pub trait MediaRetriever {
    fn retrieve(&self, locator: &str) -> Result<RetrievedMedia, AssessError>;

    /// Remove whatever `retrieve` staged; `None` when nothing was staged
    fn cleanup(&self, path: Option<&Path>);
}

/// Stages local files (or `file://` locators) into a private scratch directory
#[derive(Debug, Clone)]
pub struct LocalRetriever {
    scratch_root: PathBuf,
}

impl Default for LocalRetriever {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl LocalRetriever {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    fn source_path(locator: &str) -> PathBuf {
        let trimmed = locator.trim();
        PathBuf::from(trimmed.strip_prefix("file://").unwrap_or(trimmed))
    }
}

impl MediaRetriever for LocalRetriever {
    fn retrieve(&self, locator: &str) -> Result<RetrievedMedia, AssessError> {
        let source = Self::source_path(locator);
        if !source.is_file() {
            return Err(AssessError::Retrieval(format!(
                "Video file not found: {}",
                source.display()
            )));
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| AssessError::Retrieval(format!("No file name in {locator}")))?;
        let scratch = self
            .scratch_root
            .join(format!("{SCRATCH_PREFIX}{}", Uuid::new_v4()));
        fs::create_dir_all(&scratch)
            .map_err(|e| AssessError::Retrieval(format!("cannot create {}: {e}", scratch.display())))?;

        let target = scratch.join(file_name);
        match fs::copy(&source, &target) {
            Ok(bytes) => {
                tracing::debug!(path = %target.display(), bytes, "media staged");
                Ok(RetrievedMedia::fetched(target))
            }
            Err(e) => {
                tracing::warn!(source = %source.display(), error = %e, "media copy failed");
                Ok(RetrievedMedia::failed(Some(target)))
            }
        }
    }

    fn cleanup(&self, path: Option<&Path>) {
        let Some(path) = path else {
            return;
        };

        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "cannot remove staged media");
            }
        }

        let Some(parent) = path.parent() else {
            return;
        };
        let is_scratch = parent
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(SCRATCH_PREFIX));
        if is_scratch {
            // Only succeeds when empty
            let _ = fs::remove_dir(parent);
        }
    }
}

/// Calls [`MediaRetriever::cleanup`] exactly once when dropped
pub struct MediaGuard<'a> {
    retriever: &'a dyn MediaRetriever,
    path: Option<PathBuf>,
}

impl<'a> MediaGuard<'a> {
    pub fn new(retriever: &'a dyn MediaRetriever) -> Self {
        Self {
            retriever,
            path: None,
        }
    }

    /// Record what needs removing
    pub fn track(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }
}

impl Drop for MediaGuard<'_> {
    fn drop(&mut self) {
        // A panicking cleanup during unwinding would abort the process
        let retriever = self.retriever;
        let path = self.path.take();
        if catch_unwind(AssertUnwindSafe(|| retriever.cleanup(path.as_deref()))).is_err() {
            tracing::error!("media cleanup panicked");
        }
    }
}
