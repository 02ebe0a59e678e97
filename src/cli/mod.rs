//! CLI interface using clap
//!
//! Provides the operator command line for QuoteDesk

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// QuoteDesk - quoting ledger and sales analytics
#[derive(Parser, Debug)]
#[command(name = "quotedesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the SQLite database (overrides the config file)
    #[arg(long, global = true, env = "QUOTEDESK_DB")]
    pub db: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "quotedesk.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and write a default config file
    Init(InitArgs),

    /// Fill empty tables with demo data
    Seed,

    /// Recompute customer health scores
    Health(HealthArgs),

    /// Run the alert rules
    Alerts(AlertsArgs),

    /// Import customers, products or quotes from CSV
    Import(ImportArgs),

    /// Change the status of a quote
    Status(StatusArgs),

    /// Print an analytics report
    Report(ReportArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(short, long)]
    pub force: bool,

    /// Seed demo data after creating the database
    #[arg(long)]
    pub seed: bool,
}

/// Arguments for health command
#[derive(Parser, Debug)]
pub struct HealthArgs {
    /// Only score this customer
    #[arg(long)]
    pub customer: Option<i64>,
}

/// Arguments for alerts command
#[derive(Parser, Debug)]
pub struct AlertsArgs {
    /// Show unread alerts of this user instead of running the rules
    #[arg(long)]
    pub user: Option<String>,

    /// Maximum number of alerts to show
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

/// Record kind for imports
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImportTarget {
    Customers,
    Products,
    Quotes,
}

/// Arguments for import command
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// What the CSV contains
    pub kind: ImportTarget,

    /// CSV file to import
    #[arg(required_unless_present = "template")]
    pub file: Option<PathBuf>,

    /// Print an example CSV for this kind instead of importing
    #[arg(long)]
    pub template: bool,
}

/// Arguments for status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Quote ID
    pub quote_id: i64,

    /// New status (draft, sent, accepted, rejected)
    pub status: String,

    /// Skip the status-change alerts
    #[arg(long)]
    pub quiet: bool,
}

/// Available reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportKind {
    Intelligence,
    Forecast,
    Segments,
    Anomalies,
    Churn,
    Trend,
    Deals,
}

/// Arguments for report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Report to print
    pub kind: ReportKind,

    /// Forecast horizon in days
    #[arg(long, default_value = "30")]
    pub days: i64,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
