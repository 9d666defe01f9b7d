//! Assess CLI - Command-line interface for Interview Flux
//!
//! Commands:
//! - run: Score a batch of interview questions and emit the review payload
//! - gaze: Summarize gaze behavior of one capture file
//! - prompt: Render the rubric prompt for one capture file
//! - doctor: Diagnose configuration and collaborator health

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use interview_flux::batch::{parse_request, BatchAggregator};
use interview_flux::capture::{CaptureLandmarker, CaptureTranscriber, CaptureVideoSource};
use interview_flux::config::{AssessConfig, EngineKind};
use interview_flux::gaze::LandmarkDetector;
use interview_flux::judge::{engine_from_config, RubricPrompt};
use interview_flux::narrative::NarrativeReport;
use interview_flux::progress::TracingProgress;
use interview_flux::{
    AssessError, GazeAggregator, ReviewEncoder, Services, Transcriber, FLUX_VERSION, PRODUCER_NAME,
};

/// Assess - Multi-signal scoring of recorded interview answers
#[derive(Parser)]
#[command(name = "assess")]
#[command(version = FLUX_VERSION)]
#[command(about = "Score recorded interview answers from transcript, gaze and rubric signals", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a batch of questions and emit the review payload
    Run {
        /// Batch request file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (defaults to ./assess.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Also write the markdown detail view to this file
        #[arg(long)]
        detail: Option<PathBuf>,

        /// Judge command and arguments, overriding judge.command
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        judge_cmd: Vec<String>,
    },

    /// Summarize gaze behavior of one capture file
    Gaze {
        /// Capture file path
        #[arg(long)]
        capture: PathBuf,

        /// Process every Nth frame
        #[arg(long)]
        stride: Option<u32>,

        /// Maximum number of frames to process
        #[arg(long)]
        max_samples: Option<u32>,

        /// Skip landmark detection and report fallback metrics
        #[arg(long)]
        fallback: bool,
    },

    /// Render the rubric prompt for one capture file
    Prompt {
        /// Capture file path
        #[arg(long)]
        capture: PathBuf,

        /// Question identifier
        #[arg(long, default_value = "1")]
        id: i64,

        /// Question text
        #[arg(long, default_value = "")]
        question: String,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Diagnose configuration and collaborator health
    Doctor {
        /// Configuration file to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let emits_payload = matches!(cli.command, Commands::Run { .. });
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            if emits_payload {
                let payload = ReviewEncoder::failure_to_json(e.to_string(), false)
                    .unwrap_or_else(|_| r#"{"success":false}"#.to_string());
                println!("{payload}");
            }
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "interview_flux=debug,assess=debug"
    } else {
        "interview_flux=info,assess=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), AssessCliError> {
    match cli.command {
        Commands::Run {
            input,
            config,
            output,
            detail,
            judge_cmd,
        } => cmd_run(&input, config.as_deref(), &output, detail.as_deref(), &judge_cmd),

        Commands::Gaze {
            capture,
            stride,
            max_samples,
            fallback,
        } => cmd_gaze(&capture, stride, max_samples, fallback),

        Commands::Prompt {
            capture,
            id,
            question,
            config,
        } => cmd_prompt(&capture, id, &question, config.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<AssessConfig, AssessCliError> {
    match path {
        Some(path) => Ok(AssessConfig::from_file(path)?),
        None => Ok(AssessConfig::load_or_default()),
    }
}

fn cmd_run(
    input: &Path,
    config: Option<&Path>,
    output: &Path,
    detail: Option<&Path>,
    judge_cmd: &[String],
) -> Result<(), AssessCliError> {
    let config = load_config(config)?;

    let request = if is_stdio(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };
    let questions = parse_request(&request)?;
    tracing::info!(questions = questions.len(), "batch request loaded");

    let override_cmd = (!judge_cmd.is_empty()).then_some(judge_cmd);
    let engine = engine_from_config(&config.judge, override_cmd)?;
    let services = Services::offline(engine);
    services.warm_up();

    let progress = TracingProgress;
    let decision = BatchAggregator::new(&services, &config.gaze)
        .with_progress(&progress)
        .run(&questions);

    let to_terminal = is_stdio(output) && atty::is(atty::Stream::Stdout);
    let pretty = config.output.pretty && (to_terminal || !is_stdio(output));
    let json = ReviewEncoder::new().encode_to_json(&decision, pretty)?;
    write_output(output, &json)?;

    if let Some(detail) = detail {
        fs::write(detail, NarrativeReport::render(&decision))?;
        tracing::info!(path = %detail.display(), "detail view written");
    }

    Ok(())
}

fn cmd_gaze(
    capture: &Path,
    stride: Option<u32>,
    max_samples: Option<u32>,
    fallback: bool,
) -> Result<(), AssessCliError> {
    let defaults = GazeAggregator::default();
    let aggregator = GazeAggregator::new(
        stride.unwrap_or(defaults.sample_stride()),
        max_samples.unwrap_or(defaults.max_samples()),
    );

    let detector = CaptureLandmarker;
    let detector = (!fallback).then_some(&detector as &dyn LandmarkDetector);
    let summary = aggregator.analyze(&CaptureVideoSource, detector, capture)?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_prompt(
    capture: &Path,
    id: i64,
    question: &str,
    config: Option<&Path>,
) -> Result<(), AssessCliError> {
    let config = load_config(config)?;
    let aggregator = GazeAggregator::from_config(&config.gaze);

    let transcript = CaptureTranscriber.transcribe(capture)?;
    let gaze = aggregator.analyze(&CaptureVideoSource, Some(&CaptureLandmarker), capture)?;

    let question = if question.trim().is_empty() {
        format!("Interview Question {id}")
    } else {
        question.to_string()
    };
    println!("{}", RubricPrompt::render(id, &question, &transcript.text, &gaze));
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), AssessCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck::ok("flux_version", format!("Flux version {FLUX_VERSION}")));

    let config = match config {
        Some(path) => match AssessConfig::from_file(path) {
            Ok(config) => {
                checks.push(DoctorCheck::ok(
                    "config",
                    format!("Configuration valid ({})", path.display()),
                ));
                Some(config)
            }
            Err(e) => {
                checks.push(DoctorCheck::error("config", e.to_string()));
                None
            }
        },
        None => {
            checks.push(DoctorCheck::ok("config", "Using default configuration search"));
            Some(AssessConfig::load_or_default())
        }
    };

    if let Some(config) = &config {
        let judge_check = match config.judge.engine {
            EngineKind::Command if config.judge.command.is_empty() => DoctorCheck::warning(
                "judge",
                "judge.command is empty; pass --judge-cmd when running",
            ),
            EngineKind::Command => DoctorCheck::ok(
                "judge",
                format!("Command judge: {}", config.judge.command.join(" ")),
            ),
            EngineKind::Gemini => match std::env::var(&config.judge.api_key_env) {
                Ok(key) if !key.trim().is_empty() => DoctorCheck::ok(
                    "judge",
                    format!("Gemini judge ({}), key from {}", config.judge.model, config.judge.api_key_env),
                ),
                _ => DoctorCheck::error(
                    "judge",
                    format!("{} is not set", config.judge.api_key_env),
                ),
            },
        };
        checks.push(judge_check);

        if config.judge.engine == EngineKind::Gemini && !cfg!(feature = "gemini") {
            checks.push(DoctorCheck::error(
                "gemini_feature",
                "Binary was built without the `gemini` feature",
            ));
        }

        checks.push(DoctorCheck::ok(
            "gaze",
            format!(
                "Sampling every {} frames, at most {}",
                config.gaze.sample_stride, config.gaze.max_samples
            ),
        ));
    }

    let stdout_check = if atty::is(atty::Stream::Stdout) {
        DoctorCheck::ok("stdout", "stdout is a TTY (pretty output)")
    } else {
        DoctorCheck::ok("stdout", "stdout is a pipe (compact output)")
    };
    checks.push(stdout_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Assess Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(AssessCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn write_output(output: &Path, content: &str) -> Result<(), AssessCliError> {
    if is_stdio(output) {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{content}")?;
        stdout.flush()?;
    } else {
        fs::write(output, format!("{content}\n"))?;
        tracing::info!(path = %output.display(), "review payload written");
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum AssessCliError {
    Io(io::Error),
    Assess(AssessError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl std::fmt::Display for AssessCliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssessCliError::Io(e) => write!(f, "{e}"),
            AssessCliError::Assess(e) => write!(f, "{e}"),
            AssessCliError::Json(e) => write!(f, "{e}"),
            AssessCliError::DoctorFailed => f.write_str("One or more health checks failed"),
        }
    }
}

impl From<io::Error> for AssessCliError {
    fn from(e: io::Error) -> Self {
        AssessCliError::Io(e)
    }
}

impl From<AssessError> for AssessCliError {
    fn from(e: AssessError) -> Self {
        AssessCliError::Assess(e)
    }
}

impl From<serde_json::Error> for AssessCliError {
    fn from(e: serde_json::Error) -> Self {
        AssessCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AssessCliError> for CliError {
    fn from(e: AssessCliError) -> Self {
        let message = e.to_string();
        match e {
            AssessCliError::Io(_) => CliError {
                code: "IO_ERROR".to_string(),
                message,
                hint: Some("Check file paths and permissions".to_string()),
            },
            AssessCliError::Assess(AssessError::Config(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message,
                hint: Some("Run 'assess doctor --config <file>' for details".to_string()),
            },
            AssessCliError::Assess(AssessError::Capture { .. }) => CliError {
                code: "CAPTURE_ERROR".to_string(),
                message,
                hint: Some("Capture files hold one JSON record per line".to_string()),
            },
            AssessCliError::Assess(AssessError::JsonError(_)) | AssessCliError::Json(_) => CliError {
                code: "JSON_ERROR".to_string(),
                message,
                hint: Some("Input must be an array of questions or {\"interviews\": [...]}".to_string()),
            },
            AssessCliError::Assess(_) => CliError {
                code: "ASSESS_ERROR".to_string(),
                message,
                hint: None,
            },
            AssessCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message,
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Ok, message)
    }

    fn warning(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Warning, message)
    }

    fn error(name: &str, message: impl Into<String>) -> Self {
        Self::with_status(name, CheckStatus::Error, message)
    }

    fn with_status(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
