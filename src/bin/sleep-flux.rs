//! Sleep Flux CLI - Command-line interface for Sleep Flux
//!
//! Commands:
//! - summary: Summarize one window (defaults to the 24 hours before --now)
//! - debt: Trailing per-day sleep debt series
//! - score: Full report with last night's debt-adjusted score
//! - doctor: Diagnose configuration and fixture health

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sleep_flux::config::EngineConfig;
use sleep_flux::pipeline::SleepPipeline;
use sleep_flux::provider::FixtureProvider;
use sleep_flux::stages::MarkerPolicy;
use sleep_flux::types::TimeWindow;
use sleep_flux::{ComputeError, FLUX_VERSION, PRODUCER_NAME};

/// Sleep Flux - On-device sleep metrics and debt-adjusted scoring
#[derive(Parser)]
#[command(name = "sleep-flux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Turn recorded sleep samples into nightly summaries and scores", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize one window of samples
    Summary {
        #[command(flatten)]
        engine: EngineArgs,

        /// Window start (RFC 3339); requires --end
        #[arg(long)]
        start: Option<String>,

        /// Window end (RFC 3339); requires --start
        #[arg(long)]
        end: Option<String>,
    },

    /// Compute the trailing sleep debt series
    Debt {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Score last night against the debt-adjusted need
    Score {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Diagnose configuration and fixture health
    Doctor {
        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fixture file to check
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Fixture file path (use - for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target sleep per night in hours
    #[arg(long)]
    target: Option<f64>,

    /// Trailing debt window in days
    #[arg(long)]
    window_days: Option<u32>,

    /// Day queries allowed in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-day provider timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Which sample is treated as the pre-sleep marker
    #[arg(long, value_enum)]
    marker: Option<MarkerArg>,

    /// Evaluation instant (RFC 3339); defaults to the current time
    #[arg(long)]
    now: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum MarkerArg {
    /// The first sample returned by the provider
    FirstReturned,
    /// The sample with the earliest start time
    EarliestStart,
}

impl From<MarkerArg> for MarkerPolicy {
    fn from(arg: MarkerArg) -> Self {
        match arg {
            MarkerArg::FirstReturned => MarkerPolicy::FirstReturned,
            MarkerArg::EarliestStart => MarkerPolicy::EarliestStart,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

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

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run(cli: Cli) -> Result<(), SleepCliError> {
    match cli.command {
        Commands::Summary { engine, start, end } => cmd_summary(&engine, start, end),
        Commands::Debt { engine } => cmd_debt(&engine),
        Commands::Score { engine } => cmd_score(&engine),
        Commands::Doctor {
            config,
            input,
            json,
        } => cmd_doctor(config.as_deref(), input.as_deref(), json),
    }
}

fn cmd_summary(
    engine: &EngineArgs,
    start: Option<String>,
    end: Option<String>,
) -> Result<(), SleepCliError> {
    let (pipeline, provider) = engine.load()?;

    let window = match (start, end) {
        (Some(start), Some(end)) => TimeWindow::new(parse_instant(&start)?, parse_instant(&end)?)?,
        (None, None) => TimeWindow::last_24_hours(engine.now()?),
        _ => {
            return Err(SleepCliError::Usage(
                "--start and --end must be given together".to_string(),
            ))
        }
    };

    let summary = pipeline.summarize_blocking(&provider, window)?;
    print_json(&summary, engine.pretty)
}

fn cmd_debt(engine: &EngineArgs) -> Result<(), SleepCliError> {
    let (pipeline, provider) = engine.load()?;
    let report = pipeline.debt_blocking(&provider, engine.now()?)?;
    print_json(&report, engine.pretty)
}

fn cmd_score(engine: &EngineArgs) -> Result<(), SleepCliError> {
    let (pipeline, provider) = engine.load()?;
    let report = pipeline.run_blocking(&provider, engine.now()?)?;
    print_json(&report, engine.pretty)
}

fn cmd_doctor(
    config: Option<&Path>,
    input: Option<&Path>,
    json: bool,
) -> Result<(), SleepCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    // Check Flux version
    checks.push(DoctorCheck::new(
        "flux_version",
        CheckStatus::Ok,
        format!("Sleep Flux version {}", FLUX_VERSION),
    ));

    // Check configuration file if provided
    if let Some(path) = config {
        let check = match fs::read_to_string(path) {
            Ok(content) => match EngineConfig::from_json(&content) {
                Ok(config) => DoctorCheck::new(
                    "config",
                    CheckStatus::Ok,
                    format!(
                        "Config valid (target {}h, {} day window, marker {})",
                        config.target_sleep_hours,
                        config.debt_window_days,
                        config.marker_policy.as_str()
                    ),
                ),
                Err(e) => DoctorCheck::new("config", CheckStatus::Error, e.to_string()),
            },
            Err(e) => DoctorCheck::new(
                "config",
                CheckStatus::Error,
                format!("Cannot read config file: {}", e),
            ),
        };
        checks.push(check);
    } else {
        checks.push(DoctorCheck::new(
            "config",
            CheckStatus::Ok,
            "No config file given; defaults apply".to_string(),
        ));
    }

    // Check fixture file if provided
    if let Some(path) = input {
        let check = match fs::read_to_string(path) {
            Ok(content) => match FixtureProvider::from_json(&content) {
                Ok(provider) => {
                    let fixture = provider.fixture();
                    let status = if fixture.stage_samples.is_empty() {
                        CheckStatus::Warning
                    } else {
                        CheckStatus::Ok
                    };
                    DoctorCheck::new(
                        "fixture",
                        status,
                        format!(
                            "{} stage samples, {} heart rate points, {} failing windows",
                            fixture.stage_samples.len(),
                            fixture.heart_rate.len(),
                            fixture.failing_windows.len() + fixture.heart_rate_failing_windows.len()
                        ),
                    )
                }
                Err(e) => DoctorCheck::new("fixture", CheckStatus::Error, e.to_string()),
            },
            Err(e) => DoctorCheck::new(
                "fixture",
                CheckStatus::Error,
                format!("Cannot read fixture file: {}", e),
            ),
        };
        checks.push(check);
    }

    // Check stdin is available (for `--input -`)
    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (pass --input <file>)"
    } else {
        "stdin is a pipe (--input - ready)"
    };
    checks.push(DoctorCheck::new(
        "stdin",
        CheckStatus::Ok,
        stdin_message.to_string(),
    ));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Sleep Flux Doctor Report");
        println!("========================");
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
        Err(SleepCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

impl EngineArgs {
    /// Configuration file (if any) with flag overrides applied
    fn engine_config(&self) -> Result<EngineConfig, SleepCliError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
            None => EngineConfig::default(),
        };

        if let Some(target) = self.target {
            config.target_sleep_hours = target;
        }
        if let Some(days) = self.window_days {
            config.debt_window_days = days;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrent_days = concurrency;
        }
        if let Some(secs) = self.timeout_secs {
            config.day_timeout_secs = Some(secs);
        }
        if let Some(marker) = self.marker {
            config.marker_policy = marker.into();
        }

        Ok(config)
    }

    fn load(&self) -> Result<(SleepPipeline, FixtureProvider), SleepCliError> {
        let pipeline = SleepPipeline::new(self.engine_config()?)?;
        let provider = FixtureProvider::from_json(&read_input(&self.input)?)?;
        log::debug!(
            "loaded {} stage samples from {}",
            provider.fixture().stage_samples.len(),
            self.input.display()
        );
        Ok((pipeline, provider))
    }

    fn now(&self) -> Result<DateTime<Utc>, SleepCliError> {
        match &self.now {
            Some(value) => parse_instant(value),
            None => Ok(Utc::now()),
        }
    }
}

fn read_input(path: &Path) -> Result<String, SleepCliError> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, SleepCliError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SleepCliError::InvalidTimestamp(format!("{value}: {e}")))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), SleepCliError> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

// Error types

#[derive(Debug)]
enum SleepCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    InvalidTimestamp(String),
    Usage(String),
    DoctorFailed,
}

impl From<io::Error> for SleepCliError {
    fn from(e: io::Error) -> Self {
        SleepCliError::Io(e)
    }
}

impl From<ComputeError> for SleepCliError {
    fn from(e: ComputeError) -> Self {
        SleepCliError::Compute(e)
    }
}

impl From<serde_json::Error> for SleepCliError {
    fn from(e: serde_json::Error) -> Self {
        SleepCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SleepCliError> for CliError {
    fn from(e: SleepCliError) -> Self {
        match e {
            SleepCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SleepCliError::Compute(e) => {
                let hint = match &e {
                    ComputeError::NoData(_) => "No sleep recorded in the window; nothing to score yet",
                    ComputeError::ProviderFailure(_) | ComputeError::Timeout { .. } => {
                        "The sample source failed; retry later"
                    }
                    ComputeError::InvalidConfig(_) | ComputeError::NonPositiveSleepNeed(_) => {
                        "Run 'sleep-flux doctor --config <file>' to check the configuration"
                    }
                    _ => "Check the fixture against the documented format",
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            SleepCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SleepCliError::InvalidTimestamp(msg) => CliError {
                code: "INVALID_TIMESTAMP".to_string(),
                message: msg,
                hint: Some("Use RFC 3339, e.g. 2024-01-15T07:00:00Z".to_string()),
            },
            SleepCliError::Usage(msg) => CliError {
                code: "USAGE_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'sleep-flux help' for usage".to_string()),
            },
            SleepCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, message: String) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
        }
    }
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
