//! Judgment engine seam and the command-backed engine

use crate::error::AssessError;
use serde::Serialize;
use std::io::Write;
use std::process::{Command, Stdio};

/// Sampling parameters sent with every judgment request
///
/// These are fixed so that scores stay comparable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationPolicy {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationPolicy {
    pub const FIXED: GenerationPolicy = GenerationPolicy {
        temperature: 0.2,
        top_p: 0.95,
        max_output_tokens: 2048,
    };
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self::FIXED
    }
}

/// One request to a judgment engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgmentRequest {
    pub prompt: String,
    pub model: String,
    pub policy: GenerationPolicy,
}

impl JudgmentRequest {
    /// Request carrying the fixed generation policy
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            policy: GenerationPolicy::FIXED,
        }
    }
}

/// External rubric judge returning free-form text
pub trait JudgmentEngine {
    fn judge(&self, request: &JudgmentRequest) -> Result<String, AssessError>;

    /// Model requested from this engine
    fn model(&self) -> &str;

    fn name(&self) -> &str {
        "judge"
    }
}

/// Runs an external program with the prompt on stdin and reads the judgment from stdout
///
/// The model and generation policy are exported to the child as
/// `INTERVIEW_FLUX_MODEL`, `INTERVIEW_FLUX_TEMPERATURE`, `INTERVIEW_FLUX_TOP_P`
/// and `INTERVIEW_FLUX_MAX_OUTPUT_TOKENS`.
#[derive(Debug, Clone)]
pub struct CommandJudge {
    program: String,
    args: Vec<String>,
    model: String,
}

impl CommandJudge {
    pub fn new(program: impl Into<String>, args: Vec<String>, model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            model: model.into(),
        }
    }

    /// Build from `[program, args...]`
    pub fn from_argv(argv: &[String], model: impl Into<String>) -> Result<Self, AssessError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| AssessError::Config("judge command is empty".to_string()))?;
        Ok(Self::new(program.clone(), args.to_vec(), model))
    }
}

impl JudgmentEngine for CommandJudge {
    fn judge(&self, request: &JudgmentRequest) -> Result<String, AssessError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("INTERVIEW_FLUX_MODEL", &request.model)
            .env("INTERVIEW_FLUX_TEMPERATURE", request.policy.temperature.to_string())
            .env("INTERVIEW_FLUX_TOP_P", request.policy.top_p.to_string())
            .env(
                "INTERVIEW_FLUX_MAX_OUTPUT_TOKENS",
                request.policy.max_output_tokens.to_string(),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AssessError::JudgmentEngine(format!("cannot start {}: {e}", self.program)))?;

        // Written from a separate thread so a chatty child cannot deadlock on a full pipe
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = request.prompt.clone();
            std::thread::spawn(move || stdin.write_all(prompt.as_bytes()))
        });

        // Drains stdout and stderr together; reaps the child on every path
        let output = child.wait_with_output();

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // A judge may exit without draining stdin; its status decides the outcome
                Ok(Err(e)) => tracing::debug!(error = %e, "judge did not read the full prompt"),
                Err(_) => tracing::debug!("prompt writer panicked"),
            }
        }

        let output = output.map_err(|e| AssessError::JudgmentEngine(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssessError::JudgmentEngine(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "command"
    }
}
