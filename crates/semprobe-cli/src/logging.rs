//! Log subscriber installation
//!
//! Logs go to stderr so that `--json` results on stdout stay parseable.

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, otherwise the verbosity default
#[must_use]
pub fn env_filter(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.default_filter()))
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(config: &CliConfig) -> CliResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    let installed = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(config.verbosity.is_verbose())
                    .with_ansi(config.use_color())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    installed.map_err(|e| CliError::logging(e.to_string()))
}
