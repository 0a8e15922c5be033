//! Semprobe CLI library
//!
//! Command-line front end for the Semprobe interaction layer: lists and
//! validates the named data scenarios, prints the effective configuration,
//! and drives a scenario through a real browser.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
pub mod runner;

pub use commands::{
    CategoryArg, Cli, ColorArg, Commands, ConfigArgs, RunArgs, ScenariosArgs, ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::init_logging;
pub use output::{OutputFormat, Reporter};
pub use runner::{Category, ScenarioEntry};
