//! Rubric judgment
//!
//! Builds the rubric prompt, sends it to a judgment engine under a fixed
//! generation policy and parses the free-form answer into a typed
//! [`RubricJudgment`](crate::types::RubricJudgment).
//!
//! Pipeline: GazeSummary + transcript → RubricPrompt → JudgmentEngine → ResponseParser

pub mod engine;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod parser;
pub mod prompt;

pub use engine::{CommandJudge, GenerationPolicy, JudgmentEngine, JudgmentRequest};
#[cfg(feature = "gemini")]
pub use gemini::GeminiJudge;
pub use parser::{ParseStrategy, ResponseParser};
pub use prompt::RubricPrompt;

use crate::config::{EngineKind, JudgeConfig};
use crate::error::AssessError;

/// Build the engine selected in configuration
///
/// `command_override` replaces `judge.command` for the command engine.
pub fn engine_from_config(
    config: &JudgeConfig,
    command_override: Option<&[String]>,
) -> Result<Box<dyn JudgmentEngine>, AssessError> {
    match config.engine {
        EngineKind::Command => {
            let argv = command_override.unwrap_or(&config.command);
            Ok(Box::new(CommandJudge::from_argv(argv, config.model.clone())?))
        }
        #[cfg(feature = "gemini")]
        EngineKind::Gemini => Ok(Box::new(GeminiJudge::from_config(config)?)),
        #[cfg(not(feature = "gemini"))]
        EngineKind::Gemini => Err(AssessError::Config(
            "the gemini engine requires the `gemini` feature".to_string(),
        )),
    }
}
