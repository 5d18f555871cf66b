//! geotrace CLI - Command-line interface for geotrace-risk
//!
//! Commands:
//! - analyze: Run the privacy risk analysis on a trace file
//! - validate: Check which points of a trace survive validation
//! - config: Print the default configuration or check a config file

use clap::{Parser, Subcommand, ValueEnum};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{debug, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geotrace_risk::adapters::{TraceAdapter, TraceFormat};
use geotrace_risk::config::AnalysisConfig;
use geotrace_risk::encoder::ReportEncoder;
use geotrace_risk::pipeline::TraceAnalyzer;
use geotrace_risk::types::{AnalysisResult, GpsPoint};
use geotrace_risk::{AnalysisError, GEOTRACE_VERSION};

/// geotrace - Location privacy risk analysis for personal GPS traces
#[derive(Parser)]
#[command(name = "geotrace")]
#[command(version = GEOTRACE_VERSION)]
#[command(about = "Estimate how much a GPS trace reveals about where you live and work", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a trace and print a privacy report
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "points")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Analysis configuration file (JSON); defaults apply to missing fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured UTC offset (minutes) used for local time
        #[arg(long, allow_hyphen_values = true)]
        utc_offset_minutes: Option<i32>,
    },

    /// Check which points of a trace are usable
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "points")]
        input_format: InputFormat,

        /// Analysis configuration file (JSON), for the minimum point count
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fail when any point is invalid, not only when too few remain
        #[arg(long)]
        strict: bool,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration, or check a configuration file
    Config {
        /// Configuration file to check
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of {lat, lon, timestamp} objects
    Points,
    /// Newline-delimited JSON (one point per line)
    Ndjson,
    /// Strava-style activity export with latlng/time streams
    Strava,
}

impl From<InputFormat> for TraceFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Points => TraceFormat::Points,
            InputFormat::Ndjson => TraceFormat::Ndjson,
            InputFormat::Strava => TraceFormat::Strava,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
    /// Human-readable summary
    Text,
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

/// Log to stderr; `-v` flags win over `RUST_LOG`
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), GeotraceCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            config,
            utc_offset_minutes,
        } => cmd_analyze(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            utc_offset_minutes,
        ),

        Commands::Validate {
            input,
            input_format,
            config,
            strict,
            json,
        } => cmd_validate(&input, input_format, config.as_deref(), strict, json),

        Commands::Config { check } => cmd_config(check.as_deref()),
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config_path: Option<&Path>,
    utc_offset_minutes: Option<i32>,
) -> Result<(), GeotraceCliError> {
    let mut config = load_config(config_path)?;
    if let Some(offset) = utc_offset_minutes {
        config.utc_offset_minutes = offset;
    }

    // Validates the (possibly overridden) configuration before reading input
    let analyzer = TraceAnalyzer::new(config)?;

    let input_data = read_input(input)?;
    let result = analyzer.analyze_json(&input_data, input_format.into())?;

    let output_data = format_output(&result, &output_format)?;

    if is_stdio(output) {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
        debug!("Report written to {}", output.display());
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    config_path: Option<&Path>,
    strict: bool,
    json: bool,
) -> Result<(), GeotraceCliError> {
    let config = load_config(config_path)?;
    let input_data = read_input(input)?;

    let format: TraceFormat = input_format.into();
    let records = format.adapter().parse(&input_data)?;

    let errors: Vec<ValidationErrorDetail> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            GpsPoint::from_record(record)
                .err()
                .map(|e| ValidationErrorDetail {
                    index,
                    error: e.to_string(),
                })
        })
        .collect();

    let report = ValidationReport {
        format: format.as_str().to_string(),
        total_points: records.len(),
        valid_points: records.len() - errors.len(),
        invalid_points: errors.len(),
        min_points_required: config.min_points_required,
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Format:          {}", report.format);
        println!("Total points:    {}", report.total_points);
        println!("Valid points:    {}", report.valid_points);
        println!("Invalid points:  {}", report.invalid_points);
        println!("Minimum needed:  {}", report.min_points_required);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Point {}: {}", err.index, err.error);
            }
        }
    }

    if report.valid_points < report.min_points_required {
        Err(GeotraceCliError::Analysis(AnalysisError::InsufficientData {
            valid: report.valid_points,
            required: report.min_points_required,
            dropped: report.invalid_points,
        }))
    } else if strict && report.invalid_points > 0 {
        Err(GeotraceCliError::ValidationFailed(report.invalid_points))
    } else {
        Ok(())
    }
}

fn cmd_config(check: Option<&Path>) -> Result<(), GeotraceCliError> {
    let config = match check {
        Some(path) => {
            let config = load_config(Some(path))?;
            eprintln!("{}: configuration is valid", path.display());
            config
        }
        None => AnalysisConfig::default(),
    };
    println!("{}", config.to_json_pretty()?);
    Ok(())
}

// Helper functions

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(input: &Path) -> Result<String, GeotraceCliError> {
    if is_stdio(input) {
        if atty::is(atty::Stream::Stdin) {
            warn!("Reading trace from an interactive terminal; finish input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, GeotraceCliError> {
    match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            let json = fs::read_to_string(path)?;
            Ok(AnalysisConfig::from_json(&json)?)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn format_output(
    result: &AnalysisResult,
    format: &OutputFormat,
) -> Result<String, GeotraceCliError> {
    let encoder = ReportEncoder::new();
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&encoder.encode(result))? + "\n"),
        OutputFormat::JsonPretty => Ok(encoder.encode_to_json(result)? + "\n"),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let m = &result.metrics;

    out.push_str("Privacy Risk Report\n");
    out.push_str("===================\n");
    out.push_str(&format!("Risk score:   {}/100\n", m.overall_score));
    out.push_str(&format!("Consistency:  {:.2}\n", m.consistency));
    out.push_str(&format!("Uniqueness:   {:.2}\n", m.uniqueness));
    out.push_str(&format!("Exposure:     {:.2}\n", m.exposure));
    out.push_str(&format!(
        "Points:       {} analyzed ({} dropped, {} in transit) over {} days\n",
        result.summary.retained_points,
        result.summary.dropped_points,
        result.summary.transit_points,
        result.summary.total_days_observed
    ));

    if !result.clusters.is_empty() {
        out.push_str("\nPlaces:\n");
        for cluster in &result.clusters {
            out.push_str(&format!(
                "  #{:<3} {:<9} ({:.5}, {:.5})  visits {:<5} days {:<3} confidence {:.2}\n",
                cluster.id,
                cluster.label.as_str(),
                cluster.centroid.lat,
                cluster.centroid.lon,
                cluster.visit_count,
                cluster.distinct_days,
                cluster.confidence
            ));
        }
    }

    if !result.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for rec in &result.recommendations {
            out.push_str(&format!("  [{}] {}\n", rec.priority, rec.text));
        }
    }

    out
}

// Error types

#[derive(Debug)]
enum GeotraceCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
    ValidationFailed(usize),
}

impl From<io::Error> for GeotraceCliError {
    fn from(e: io::Error) -> Self {
        GeotraceCliError::Io(e)
    }
}

impl From<AnalysisError> for GeotraceCliError {
    fn from(e: AnalysisError) -> Self {
        GeotraceCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for GeotraceCliError {
    fn from(e: serde_json::Error) -> Self {
        GeotraceCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GeotraceCliError> for CliError {
    fn from(e: GeotraceCliError) -> Self {
        match e {
            GeotraceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GeotraceCliError::Analysis(e) => {
                let (code, hint) = match &e {
                    AnalysisError::InsufficientData { .. } => (
                        "INSUFFICIENT_DATA",
                        "Run 'geotrace validate' to see which points were rejected",
                    ),
                    AnalysisError::InvalidConfiguration { .. } => (
                        "INVALID_CONFIG",
                        "Run 'geotrace config' to print a valid default configuration",
                    ),
                    AnalysisError::MissingField(_) | AnalysisError::DateParseError(_) => (
                        "INVALID_INPUT",
                        "Check that --input-format matches the file",
                    ),
                    AnalysisError::ParseError(_) | AnalysisError::JsonError(_) => {
                        ("PARSE_ERROR", "Check JSON syntax and --input-format")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            GeotraceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            GeotraceCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} points failed validation", count),
                hint: Some("Invalid points are dropped during analysis".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    format: String,
    total_points: usize,
    valid_points: usize,
    invalid_points: usize,
    min_points_required: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}
