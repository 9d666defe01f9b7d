//! Assessment configuration
//!
//! Loaded from TOML. Generation parameters of the judgment engine are fixed
//! policy (see [`crate::judge::GenerationPolicy`]) and deliberately absent here.

use crate::error::AssessError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessConfig {
    #[serde(default)]
    pub gaze: GazeConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Frame sampling for gaze aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeConfig {
    /// Process every Nth frame
    #[serde(default = "default_sample_stride")]
    pub sample_stride: u32,
    /// Maximum number of processed frames per video
    #[serde(default = "default_max_samples")]
    pub max_samples: u32,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            sample_stride: default_sample_stride(),
            max_samples: default_max_samples(),
        }
    }
}

/// Which judgment engine backs the fusion stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// External command reading the prompt on stdin
    Command,
    /// Gemini `generateContent` over HTTP
    Gemini,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_engine")]
    pub engine: EngineKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Program and arguments for the command engine
    #[serde(default)]
    pub command: Vec<String>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            command: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_sample_stride() -> u32 { 15 }
fn default_max_samples() -> u32 { 300 }
fn default_engine() -> EngineKind { EngineKind::Command }
fn default_model() -> String { "gemini-2.0-flash".to_string() }
fn default_api_key_env() -> String { "GEMINI_API_KEY".to_string() }
fn default_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_timeout_ms() -> u64 { 120_000 }

impl AssessConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssessError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AssessError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, AssessError> {
        let config: Self =
            toml::from_str(content).map_err(|e| AssessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location or fall back to defaults
    pub fn load_or_default() -> Self {
        let config_paths = ["assess.toml", "config/assess.toml"];

        for path in &config_paths {
            if !Path::new(path).exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path);
                    return config;
                }
                Err(e) => tracing::warn!("Ignoring {}: {}", path, e),
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), AssessError> {
        if self.gaze.sample_stride == 0 {
            return Err(AssessError::Config(
                "gaze.sample_stride must be at least 1".to_string(),
            ));
        }
        if self.gaze.max_samples == 0 {
            return Err(AssessError::Config(
                "gaze.max_samples must be at least 1".to_string(),
            ));
        }
        if self.judge.engine == EngineKind::Command && self.judge.command.is_empty() {
            tracing::debug!("judge.command is empty; a command must be supplied at run time");
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, AssessError> {
        toml::to_string_pretty(self).map_err(|e| AssessError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AssessConfig::default();
        assert_eq!(config.gaze.sample_stride, 15);
        assert_eq!(config.gaze.max_samples, 300);
        assert_eq!(config.judge.engine, EngineKind::Command);
        assert_eq!(config.judge.model, "gemini-2.0-flash");
        assert!(config.output.pretty);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
[gaze]
sample_stride = 3

[judge]
engine = "gemini"
timeout_ms = 5000
"#;
        let config = AssessConfig::from_toml(toml).unwrap();
        assert_eq!(config.gaze.sample_stride, 3);
        assert_eq!(config.gaze.max_samples, 300);
        assert_eq!(config.judge.engine, EngineKind::Gemini);
        assert_eq!(config.judge.timeout_ms, 5000);
        assert_eq!(config.judge.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn test_zero_stride_rejected() {
        let err = AssessConfig::from_toml("[gaze]\nsample_stride = 0\n").unwrap_err();
        assert!(matches!(err, AssessError::Config(_)));
    }

    #[test]
    fn test_toml_roundtrip_preserves_command() {
        let mut config = AssessConfig::default();
        config.judge.command = vec!["judge.sh".to_string(), "--fast".to_string()];
        let text = config.to_toml().unwrap();
        let parsed = AssessConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
