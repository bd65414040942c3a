//! `oed` command-line interface.

use chrono::{SecondsFormat, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use oed_common::{Error, OutputFormat, Result};
use oed_config::{resolve_config, ConfigPaths, OrganTable};
use oed_core::evaluator::{parse_integration_method, parse_model};
use oed_core::exit_codes::ExitCode;
use oed_core::input::{load_records, parse_records};
use oed_core::render::{render_organ_table, render_report, to_json};
use oed_core::{run_report, OedReport, OrganRecord, ResponseModel, RunSettings};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "oed", version, about = "Organ equivalent dose from dose-volume histograms")]
struct Cli {
    /// Output format for results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate every organ of an input document
    Run(RunArgs),

    /// Show the resolved organ parameter table
    Organs {
        /// Organ parameter table (JSON)
        #[arg(long)]
        organ_table: Option<PathBuf>,
    },

    /// Print the JSON schema of the organ parameter table
    Schema,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Input document with per-organ DVH samples ("-" reads stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Organ parameter table (JSON); falls back to $OED_ORGAN_TABLE, the
    /// user config directory, then the built-in table
    #[arg(long)]
    organ_table: Option<PathBuf>,

    /// Base integration tolerance
    #[arg(long, env = "OED_TOLERANCE", default_value_t = 1e-3)]
    tolerance: f64,

    /// Integration method (quad, quadv, quadl, quadgk, trapz, trapz_adaptive)
    #[arg(long, env = "OED_METHOD", default_value = "quadv")]
    method: String,

    /// Response models to evaluate, comma separated
    #[arg(long, env = "OED_MODELS", value_delimiter = ',')]
    models: Vec<String>,

    /// Step halvings allowed for trapz_adaptive
    #[arg(long, default_value_t = 20)]
    max_refinements: usize,

    /// Grid size limit for trapz_adaptive
    #[arg(long, default_value_t = 1 << 24)]
    max_intervals: usize,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// JSON document written by `oed run`.
#[derive(Serialize)]
struct RunOutput<'a> {
    generated_at: String,
    organ_table: String,
    #[serde(flatten)]
    report: &'a OedReport,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    let format = cli.format;
    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            print_error(&err, format);
            ExitCode::from_error(&err)
        }
    };
    code.into()
}

fn init_logging(format: LogFormat, verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => cmd_run(args, cli.format),
        Commands::Organs { organ_table } => cmd_organs(organ_table, cli.format),
        Commands::Schema => {
            let schema = schemars::schema_for!(OrganTable);
            println!("{}", to_json(&schema)?);
            Ok(ExitCode::Clean)
        }
    }
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> Result<ExitCode> {
    let settings = RunSettings {
        tolerance: args.tolerance,
        integration_method: parse_integration_method(&args.method)?,
        models: parse_models(&args.models)?,
        max_refinements: args.max_refinements,
        max_intervals: args.max_intervals,
    };

    let resolved = resolve_config(&ConfigPaths {
        organ_table: args.organ_table,
    })?;
    let records = read_input(&args.input)?;
    info!(
        input = %args.input.display(),
        records = records.len(),
        table = %resolved.source,
        "evaluating"
    );

    let report = run_report(&records, &resolved.organ_table, &settings)?;
    let rendered = match format {
        OutputFormat::Json => to_json(&RunOutput {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            organ_table: resolved.source.to_string(),
            report: &report,
        })?,
        OutputFormat::Text => render_report(&report, format)?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }

    Ok(if report.has_skips() {
        ExitCode::Skipped
    } else {
        ExitCode::Clean
    })
}

fn cmd_organs(organ_table: Option<PathBuf>, format: OutputFormat) -> Result<ExitCode> {
    let resolved = resolve_config(&ConfigPaths { organ_table })?;
    info!(table = %resolved.source, "organ table");
    println!("{}", render_organ_table(&resolved.organ_table, format)?);
    Ok(ExitCode::Clean)
}

/// Parse model names, dropping blanks and repeats; empty means the default set.
fn parse_models(names: &[String]) -> Result<Vec<ResponseModel>> {
    let mut models = Vec::new();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let model = parse_model(name)?;
        if !models.contains(&model) {
            models.push(model);
        }
    }
    if models.is_empty() {
        models = ResponseModel::DEFAULT_RUN.to_vec();
    }
    Ok(models)
}

fn read_input(path: &Path) -> Result<Vec<OrganRecord>> {
    if path.as_os_str() == "-" {
        let content = std::io::read_to_string(std::io::stdin())?;
        return parse_records(&content);
    }
    load_records(path)
}

fn print_error(err: &Error, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                }
            });
            println!("{body}");
        }
        OutputFormat::Text => eprintln!("error[{}]: {}", err.code(), err),
    }
}
