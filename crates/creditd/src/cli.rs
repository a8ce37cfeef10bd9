use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_REPORT_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ServeArgs {
    #[arg(long, help = "Bind address, overrides [server].host")]
    pub host: Option<String>,

    #[arg(long, help = "Bind port, overrides [server].port")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct DriftArgs {
    #[arg(long, help = "Print the report as JSON instead of a summary")]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ReportsArgs {
    #[arg(
        long,
        default_value_t = DEFAULT_REPORT_LIMIT,
        help = "Number of reports to print (clamped to 1..500)"
    )]
    pub limit: u32,

    #[arg(long, help = "Print reports as JSON")]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Serve the drift, report and prediction-logging HTTP API
    Serve(ServeArgs),
    /// Run one drift computation and print a summary
    Drift(DriftArgs),
    /// Print recently persisted drift reports
    Reports(ReportsArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Credit-risk prediction drift monitor")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .credit/"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}
