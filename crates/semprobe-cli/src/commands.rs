//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Semprobe: drive loan-application scenarios through a semantics overlay
#[derive(Parser, Debug)]
#[command(name = "semprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit results and logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive one scenario through a real browser
    Run(RunArgs),

    /// Check scenario data against the form's validation rules
    Validate(ValidateArgs),

    /// List the named data scenarios
    Scenarios(ScenariosArgs),

    /// Show the effective configuration as YAML
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Scenario to submit
    #[arg(short, long, default_value = "valid_application")]
    pub scenario: String,

    /// Seed for generated data
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Override the configured base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Scenario to validate
    #[arg(short, long, required_unless_present = "all", conflicts_with = "all")]
    pub scenario: Option<String>,

    /// Validate every scenario
    #[arg(long)]
    pub all: bool,

    /// Seed for generated data
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

/// Arguments for the scenarios command
#[derive(Parser, Debug)]
pub struct ScenariosArgs {
    /// Only list scenarios in this category
    #[arg(long)]
    pub category: Option<CategoryArg>,

    /// Seed for generated data
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration file (YAML); defaults are shown when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Scenario category filter
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryArg {
    /// Applications the form should accept
    Valid,
    /// Applications the form should reject
    Invalid,
    /// Limits of the accepted ranges
    Boundary,
}
