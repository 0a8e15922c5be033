//! Command handlers

use crate::commands::{CategoryArg, ConfigArgs, RunArgs, ScenariosArgs, ValidateArgs};
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use semprobe::{
    validate_application, LoanApplication, Seed, SemprobeConfig, SubmissionResult,
    TestDataProvider, ValidationResult,
};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Family a named scenario belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Should be accepted
    Valid,
    /// Should be rejected
    Invalid,
    /// Edges of the accepted ranges
    Boundary,
}

impl Category {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Boundary => "boundary",
        }
    }
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Valid => Self::Valid,
            CategoryArg::Invalid => Self::Invalid,
            CategoryArg::Boundary => Self::Boundary,
        }
    }
}

/// One named scenario with its data
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioEntry {
    /// Scenario name
    pub name: String,
    /// Family
    pub category: Category,
    /// Application data
    pub application: LoanApplication,
}

/// Every named scenario for `seed`, valid first, then invalid, then boundary.
///
/// Generation order matches [`TestDataProvider::all_scenarios`], so a name
/// resolves to the same data here and in library callers.
#[must_use]
pub fn catalog(seed: u64) -> Vec<ScenarioEntry> {
    let mut data = TestDataProvider::with_seed(Seed::from_u64(seed));
    let valid = data.test_data_sets();
    let boundary = data.boundary_test_data();
    let invalid = TestDataProvider::invalid_test_data();

    [
        (Category::Valid, valid),
        (Category::Invalid, invalid),
        (Category::Boundary, boundary),
    ]
    .into_iter()
    .flat_map(|(category, sets)| {
        sets.into_iter().map(move |(name, application)| ScenarioEntry {
            name,
            category,
            application,
        })
    })
    .collect()
}

/// Look up one scenario by name
pub fn find_scenario(seed: u64, name: &str) -> CliResult<ScenarioEntry> {
    catalog(seed)
        .into_iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| {
            CliError::invalid_argument(format!(
                "unknown scenario '{name}' (see `semprobe scenarios`)"
            ))
        })
}

/// Configuration from `path`, or the defaults
pub fn load_config(path: Option<&Path>) -> CliResult<SemprobeConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            SemprobeConfig::from_file(path).map_err(|e| {
                CliError::config(format!("{}: {e}", path.display()))
            })
        }
        None => Ok(SemprobeConfig::default()),
    }
}

#[derive(Debug, Serialize)]
struct ScenarioSummary<'a> {
    name: &'a str,
    category: Category,
    valid: bool,
}

/// `semprobe scenarios`
pub fn list_scenarios(reporter: &Reporter, args: &ScenariosArgs) -> CliResult<()> {
    let filter = args.category.map(Category::from);
    let entries: Vec<ScenarioEntry> = catalog(args.seed)
        .into_iter()
        .filter(|entry| filter.map_or(true, |c| entry.category == c))
        .collect();

    if reporter.is_json() {
        let summaries: Vec<ScenarioSummary<'_>> = entries
            .iter()
            .map(|entry| ScenarioSummary {
                name: &entry.name,
                category: entry.category,
                valid: validate_application(&entry.application).is_valid,
            })
            .collect();
        reporter.json(&summaries)?;
        return Ok(());
    }

    let mut current = None;
    for entry in &entries {
        if current != Some(entry.category) {
            reporter.header(entry.category.as_str());
            current = Some(entry.category);
        }
        let app = &entry.application;
        reporter.line(&format!(
            "  {:<28} {:>10} {}",
            entry.name, app.loan_amount, app.loan_purpose
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ValidationOutcome<'a> {
    name: &'a str,
    category: Category,
    #[serde(flatten)]
    result: ValidationResult,
}

/// `semprobe validate`; fails when any checked application is rejected
pub fn validate_scenarios(reporter: &Reporter, args: &ValidateArgs) -> CliResult<()> {
    let start = Instant::now();
    let entries = match &args.scenario {
        Some(name) => vec![find_scenario(args.seed, name)?],
        None => catalog(args.seed),
    };

    let outcomes: Vec<ValidationOutcome<'_>> = entries
        .iter()
        .map(|entry| ValidationOutcome {
            name: &entry.name,
            category: entry.category,
            result: validate_application(&entry.application),
        })
        .collect();
    let rejected = outcomes.iter().filter(|o| !o.result.is_valid).count();

    if reporter.is_json() {
        reporter.json(&outcomes)?;
    } else {
        for outcome in &outcomes {
            if outcome.result.is_valid {
                reporter.success(outcome.name);
            } else {
                reporter.failure(&format!("{} rejected", outcome.name));
            }
            for error in &outcome.result.errors {
                reporter.detail(error);
            }
            for warning in &outcome.result.warnings {
                reporter.detail(&format!("warning: {warning}"));
            }
        }
        reporter.summary(
            "applications",
            outcomes.len() - rejected,
            rejected,
            start.elapsed(),
        );
    }

    if rejected > 0 {
        return Err(CliError::ValidationFailed {
            rejected,
            total: outcomes.len(),
        });
    }
    Ok(())
}

/// `semprobe config`
pub fn show_config(reporter: &Reporter, args: &ConfigArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    if reporter.is_json() {
        reporter.json(&config)?;
    } else {
        reporter.line(config.to_yaml()?.trim_end());
    }
    Ok(())
}

/// Effective configuration for a run
pub fn run_config(args: &RunArgs) -> CliResult<SemprobeConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if args.headed {
        config.headless = false;
    }
    if let Some(url) = &args.base_url {
        config = config.with_entry_url(url.clone());
    }
    config.validate()?;
    Ok(config)
}

/// `semprobe run`; fails unless the page confirms the submission
pub async fn run_scenario(reporter: &Reporter, args: &RunArgs) -> CliResult<()> {
    let config = run_config(args)?;
    let entry = find_scenario(args.seed, &args.scenario)?;
    let validation = validate_application(&entry.application);
    if !validation.is_valid {
        warn!(
            scenario = %entry.name,
            errors = ?validation.errors,
            "submitting data the form should reject"
        );
    }

    info!(scenario = %entry.name, url = %config.base_url, "running scenario");
    let result = submit(&config, &entry.application).await?;
    report_submission(reporter, &entry.name, &result)?;

    if result.success {
        Ok(())
    } else {
        Err(CliError::scenario_failed(
            result
                .message
                .unwrap_or_else(|| format!("status {}", result.status)),
        ))
    }
}

fn report_submission(
    reporter: &Reporter,
    scenario: &str,
    result: &SubmissionResult,
) -> CliResult<()> {
    if reporter.is_json() {
        reporter.json(result)?;
        return Ok(());
    }
    let line = format!("{scenario}: {}", result.status);
    if result.success {
        reporter.success(&line);
    } else {
        reporter.failure(&line);
    }
    reporter.detail(&format!("run {}", result.run_id));
    if let Some(id) = &result.application_id {
        reporter.detail(&format!("application {id}"));
    }
    if let Some(message) = &result.message {
        reporter.detail(message);
    }
    Ok(())
}

#[cfg(feature = "browser")]
async fn submit(
    config: &SemprobeConfig,
    application: &LoanApplication,
) -> CliResult<SubmissionResult> {
    use semprobe::{CdpSession, ComponentContext, LoanApplicationAutomator, PageDriver, PageSetup};
    use std::sync::Arc;

    let session = CdpSession::launch(config).await?;
    let outcome = async {
        let driver: Arc<dyn PageDriver> = Arc::new(session.new_driver().await?);
        PageSetup::apply(driver.as_ref(), config).await?;
        let automator =
            LoanApplicationAutomator::from_context(ComponentContext::new(driver, config.clone()));
        Ok::<_, CliError>(automator.process_with_report(application).await)
    }
    .await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "browser did not shut down cleanly");
    }
    outcome
}

#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
async fn submit(
    _config: &SemprobeConfig,
    _application: &LoanApplication,
) -> CliResult<SubmissionResult> {
    Err(CliError::config(
        "semprobe was built without browser support; rebuild with --features browser",
    ))
}
