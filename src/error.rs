//! Error types for Interview Flux

use thiserror::Error;

/// Errors that can occur while scoring an interview
///
/// Only `Retrieval` and `Unclassified` are terminal for a question; the
/// pipeline absorbs every other variant and substitutes a conservative default.
#[derive(Debug, Error)]
pub enum AssessError {
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Gaze analysis error: {0}")]
    GazeAnalysis(String),

    #[error("Judgment parse error: {0}")]
    JudgmentParse(String),

    #[error("Judgment engine error: {0}")]
    JudgmentEngine(String),

    #[error("Unclassified pipeline error: {0}")]
    Unclassified(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error at line {line}: {message}")]
    Capture { line: usize, message: String },
}

impl AssessError {
    /// Whether this error voids the question it occurred in
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssessError::Retrieval(_) | AssessError::Unclassified(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_retrieval_and_unclassified_are_terminal() {
        assert!(AssessError::Retrieval("x".into()).is_terminal());
        assert!(AssessError::Unclassified("x".into()).is_terminal());
        assert!(!AssessError::Transcription("x".into()).is_terminal());
        assert!(!AssessError::GazeAnalysis("x".into()).is_terminal());
        assert!(!AssessError::JudgmentParse("x".into()).is_terminal());
        assert!(!AssessError::JudgmentEngine("x".into()).is_terminal());
    }

    #[test]
    fn test_capture_error_names_line() {
        let err = AssessError::Capture {
            line: 7,
            message: "unknown kind".to_string(),
        };
        assert_eq!(err.to_string(), "Capture error at line 7: unknown kind");
    }
}
