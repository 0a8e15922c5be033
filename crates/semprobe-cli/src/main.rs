//! Semprobe CLI
//!
//! ## Usage
//!
//! ```bash
//! semprobe scenarios                          # List named scenarios
//! semprobe validate --all                     # Check every scenario's data
//! semprobe config -c semprobe.yaml            # Show effective configuration
//! semprobe run -c semprobe.yaml -s student_application --headed
//! ```

use clap::Parser;
use semprobe_cli::{
    init_logging,
    runner::{list_scenarios, run_scenario, show_config, validate_scenarios},
    Cli, CliConfig, CliResult, ColorArg, ColorChoice, Commands, OutputFormat, Reporter, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(&config)?;

    let format = if config.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let reporter = Reporter::new(config.use_color(), config.verbosity.is_quiet(), format);

    match cli.command {
        Commands::Run(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_scenario(&reporter, &args))
        }
        Commands::Validate(args) => validate_scenarios(&reporter, &args),
        Commands::Scenarios(args) => list_scenarios(&reporter, &args),
        Commands::Config(args) => show_config(&reporter, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color = match cli.color {
        ColorArg::Auto => ColorChoice::Auto,
        ColorArg::Always => ColorChoice::Always,
        ColorArg::Never => ColorChoice::Never,
    };
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_json(cli.json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config() {
        let cli = Cli::parse_from(["semprobe", "-vv", "--json", "--color", "never", "scenarios"]);
        let config = build_config(&cli);
        assert_eq!(config.verbosity, Verbosity::Debug);
        assert_eq!(config.color, ColorChoice::Never);
        assert!(config.json);
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        let cli = Cli::parse_from(["semprobe", "-q", "-v", "scenarios"]);
        assert_eq!(build_config(&cli).verbosity, Verbosity::Quiet);
    }
}
