//! Stride CLI - Command-line interface for Stridekit
//!
//! Commands:
//! - detect: Run the step detection engine over a sample stream
//! - validate: Validate sample records against the input schema
//! - doctor: Diagnose engine configuration and session state files

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stridekit::{DetectorConfig, SampleRecord, StepDetector, StepEvent};
use stridekit::{PRODUCER_NAME, STRIDEKIT_VERSION};

/// Stride - On-device step detection engine for accelerometer streams
#[derive(Parser)]
#[command(name = "stride")]
#[command(version = STRIDEKIT_VERSION)]
#[command(about = "Detect steps in triaxial accelerometer streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the step detection engine over a sample stream
    Detect {
        /// Input file path with NDJSON sample records (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Detector configuration file (JSON); canonical tuning if omitted.
        /// A snapshot embeds its configuration, so this conflicts with
        /// --load-state.
        #[arg(long, conflicts_with = "load_state")]
        config: Option<PathBuf>,

        /// Load a detector snapshot before processing
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save the detector snapshot after processing
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Validate sample records against the input schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose engine configuration and session state files
    Doctor {
        /// Check a detector configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a detector snapshot file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one step event per line)
    Ndjson,
    /// JSON array of step events
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Session summary report only
    Summary,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StrideCliError> {
    match cli.command {
        Commands::Detect {
            input,
            output,
            output_format,
            config,
            load_state,
            save_state,
        } => cmd_detect(
            &input,
            &output,
            output_format,
            config.as_deref(),
            load_state.as_deref(),
            save_state.as_deref(),
        ),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor {
            config,
            state,
            json,
        } => cmd_doctor(config.as_deref(), state.as_deref(), json),
    }
}

fn cmd_detect(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
    config: Option<&Path>,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
) -> Result<(), StrideCliError> {
    let mut detector = if let Some(state_path) = load_state {
        let state_json = fs::read_to_string(state_path)?;
        StepDetector::from_json(&state_json)?
    } else if let Some(path) = config {
        let config_json = fs::read_to_string(path)?;
        let config: DetectorConfig = serde_json::from_str(&config_json)?;
        StepDetector::new(config)
    } else {
        StepDetector::default()
    };

    let mut events: Vec<StepEvent> = Vec::new();
    let mut samples_processed = 0usize;
    let mut samples_rejected = 0usize;

    for_each_line(input, |line| {
        let record: SampleRecord = serde_json::from_str(line)
            .map_err(|e| StrideCliError::ParseError(format!("Invalid sample record: {}", e)))?;

        match detector.ingest(&record.accel, record.timestamp_ms) {
            Ok(Some(event)) => {
                samples_processed += 1;
                events.push(event);
            }
            Ok(None) => samples_processed += 1,
            // Malformed samples are a normal stream hazard: drop and continue.
            Err(stridekit::DetectError::InvalidInput(_)) => samples_rejected += 1,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    })?;

    if let Some(state_path) = save_state {
        fs::write(state_path, detector.to_json()?)?;
    }

    let output_data = match output_format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for event in &events {
                lines.push(serde_json::to_string(event)?);
            }
            lines.join("\n") + "\n"
        }
        OutputFormat::Json => serde_json::to_string(&events)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&events)?,
        OutputFormat::Summary => serde_json::to_string_pretty(&SessionReport::new(
            &detector,
            samples_processed,
            samples_rejected,
            &events,
        ))?,
    };

    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        write!(stdout, "{}", output_data)?;
        stdout.flush()?;
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), StrideCliError> {
    let mut report = ValidationReport {
        total_records: 0,
        valid_records: 0,
        invalid_records: 0,
        errors: Vec::new(),
    };

    for_each_line(input, |line| {
        let index = report.total_records;
        report.total_records += 1;

        match serde_json::from_str::<SampleRecord>(line) {
            Ok(record) if record.accel.len() >= 3 => report.valid_records += 1,
            Ok(record) => {
                report.invalid_records += 1;
                report.errors.push(ValidationErrorDetail {
                    index,
                    error: format!(
                        "expected 3 acceleration components, got {}",
                        record.accel.len()
                    ),
                });
            }
            Err(e) => {
                report.invalid_records += 1;
                report.errors.push(ValidationErrorDetail {
                    index,
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Record {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(StrideCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    state: Option<&Path>,
    json: bool,
) -> Result<(), StrideCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "stridekit_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Stridekit version {}", STRIDEKIT_VERSION),
    });

    if let Some(config_path) = config {
        checks.push(check_json_file::<DetectorConfig>(
            "config",
            config_path,
            "Configuration file valid",
        ));
    }

    if let Some(state_path) = state {
        checks.push(check_json_file::<StepDetector>(
            "state",
            state_path,
            "Snapshot file valid",
        ));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STRIDEKIT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stride Doctor Report");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StrideCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn for_each_line<F>(input: &Path, mut f: F) -> Result<(), StrideCliError>
where
    F: FnMut(&str) -> Result<(), StrideCliError>,
{
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    for line in input_data.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        f(trimmed)?;
    }
    Ok(())
}

fn check_json_file<T: serde::de::DeserializeOwned>(
    name: &str,
    path: &Path,
    ok_message: &str,
) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} file does not exist", name),
        };
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(_) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message: ok_message.to_string(),
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid {} JSON: {}", name, e),
            },
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {} file: {}", name, e),
        },
    }
}

// Report types

#[derive(serde::Serialize)]
struct SessionReport {
    producer: ProducerInfo,
    computed_at_utc: String,
    samples_processed: usize,
    samples_rejected: usize,
    steps: u32,
    final_threshold: f64,
    still_at_end: bool,
    first_step_ms: Option<u64>,
    last_step_ms: Option<u64>,
}

#[derive(serde::Serialize)]
struct ProducerInfo {
    name: String,
    version: String,
    session_id: String,
}

impl SessionReport {
    fn new(
        detector: &StepDetector,
        samples_processed: usize,
        samples_rejected: usize,
        events: &[StepEvent],
    ) -> Self {
        Self {
            producer: ProducerInfo {
                name: PRODUCER_NAME.to_string(),
                version: STRIDEKIT_VERSION.to_string(),
                session_id: uuid::Uuid::new_v4().to_string(),
            },
            computed_at_utc: chrono::Utc::now().to_rfc3339(),
            samples_processed,
            samples_rejected,
            steps: detector.step_count(),
            final_threshold: detector.current_threshold(),
            still_at_end: detector.is_still(),
            first_step_ms: events.first().map(|e| e.timestamp_ms),
            last_step_ms: events.last().map(|e| e.timestamp_ms),
        }
    }
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

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

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

// Error types

#[derive(Debug)]
enum StrideCliError {
    Io(io::Error),
    Detect(stridekit::DetectError),
    Json(serde_json::Error),
    ParseError(String),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for StrideCliError {
    fn from(e: io::Error) -> Self {
        StrideCliError::Io(e)
    }
}

impl From<stridekit::DetectError> for StrideCliError {
    fn from(e: stridekit::DetectError) -> Self {
        StrideCliError::Detect(e)
    }
}

impl From<serde_json::Error> for StrideCliError {
    fn from(e: serde_json::Error) -> Self {
        StrideCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StrideCliError> for CliError {
    fn from(e: StrideCliError) -> Self {
        match e {
            StrideCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StrideCliError::Detect(e) => CliError {
                code: "DETECT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check sample records and snapshot files".to_string()),
            },
            StrideCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StrideCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Expected NDJSON sample records".to_string()),
            },
            StrideCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            StrideCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_rejects_config_together_with_snapshot() {
        // A snapshot embeds its configuration, so combining the two would
        // silently discard one of them.
        let result = Cli::try_parse_from([
            "stride",
            "detect",
            "--input",
            "samples.ndjson",
            "--config",
            "tuning.json",
            "--load-state",
            "session.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn detect_accepts_config_or_snapshot_alone() {
        let with_config = Cli::try_parse_from([
            "stride",
            "detect",
            "--input",
            "samples.ndjson",
            "--config",
            "tuning.json",
        ]);
        assert!(with_config.is_ok());

        let with_snapshot = Cli::try_parse_from([
            "stride",
            "detect",
            "--input",
            "samples.ndjson",
            "--load-state",
            "session.json",
        ]);
        assert!(with_snapshot.is_ok());
    }
}
