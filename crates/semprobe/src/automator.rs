//! End-to-end loan application runs.
//!
//! [`LoanApplicationAutomator`] drives one application through the page in
//! the order a person would: open the form, get the chat launcher out of
//! the way, fill every section, answer the challenge widget, submit, then
//! look for a confirmation. Data validation is independent of the page.

use crate::component::ComponentContext;
use crate::loan_page::LoanApplicationPage;
use crate::locator::Selector;
use crate::models::{
    ApplicationStatus, FinancialInfo, LoanApplication, PersonalInfo, SubmissionResult,
    ValidationResult,
};
use crate::result::{SemprobeError, SemprobeResult};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

/// Accepted email shape
pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Accepted phone shape, `NNN-NNN-NNNN`
pub const PHONE_PATTERN: &str = r"^\d{3}-\d{3}-\d{4}$";

/// Amounts above this validate with a warning
pub const TYPICAL_MAX_LOAN: f64 = 100_000.0;

/// Attribute carrying the identifier the page assigns on confirmation
pub const APPLICATION_ID_ATTR: &str = "data-application-id";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(PHONE_PATTERN).expect("phone pattern compiles"));

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Check an application before it is typed into the form
#[must_use]
pub fn validate_application(application: &LoanApplication) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let personal = &application.personal_info;
    if is_blank(&personal.first_name) {
        errors.push("first name is required".to_string());
    }
    if is_blank(&personal.last_name) {
        errors.push("last name is required".to_string());
    }
    if !EMAIL_RE.is_match(&personal.email) {
        errors.push(format!("invalid email '{}'", personal.email));
    }
    if !PHONE_RE.is_match(&personal.phone) {
        errors.push(format!("invalid phone '{}'", personal.phone));
    }

    let financial = &application.financial_info;
    if !(financial.annual_income > 0.0 && financial.annual_income.is_finite()) {
        errors.push("annual income must be positive".to_string());
    }
    if is_blank(&financial.employment_type) {
        errors.push("employment type is required".to_string());
    }
    if financial.employer.as_deref().map_or(true, is_blank) {
        warnings.push("no employer given".to_string());
    }
    if let Some(expenses) = financial.monthly_expenses {
        if expenses * 12.0 > financial.annual_income {
            warnings.push("monthly expenses exceed income".to_string());
        }
    }

    if !(application.loan_amount > 0.0 && application.loan_amount.is_finite()) {
        errors.push("loan amount must be positive".to_string());
    } else if application.loan_amount > TYPICAL_MAX_LOAN {
        warnings.push(format!(
            "loan amount {} is above {TYPICAL_MAX_LOAN}",
            application.loan_amount
        ));
    }
    if is_blank(&application.loan_purpose) {
        errors.push("loan purpose is required".to_string());
    }

    ValidationResult::from_findings(errors, warnings)
}

/// Whether an application passes every required-field and format check
#[must_use]
pub fn validate_application_data(application: &LoanApplication) -> bool {
    let result = validate_application(application);
    if !result.is_valid {
        warn!(errors = ?result.errors, "application data rejected");
    }
    result.is_valid
}

/// A valid baseline application with `overrides` applied.
///
/// The overrides are not validated, so negative cases can be built from it.
pub fn create_test_application(
    overrides: impl FnOnce(&mut LoanApplication),
) -> SemprobeResult<LoanApplication> {
    let mut application = LoanApplication {
        personal_info: PersonalInfo {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: "test.user@example.com".to_string(),
            phone: "555-123-4567".to_string(),
            date_of_birth: None,
            ssn: None,
        },
        financial_info: FinancialInfo {
            annual_income: 75_000.0,
            employment_type: "Full-time".to_string(),
            employer: Some("Test Company".to_string()),
            monthly_expenses: None,
        },
        loan_amount: 25_000.0,
        loan_purpose: "Debt Consolidation".to_string(),
    };
    let baseline = validate_application(&application);
    if !baseline.is_valid {
        return Err(SemprobeError::InvalidState {
            message: format!("baseline application failed validation: {:?}", baseline.errors),
        });
    }
    overrides(&mut application);
    Ok(application)
}

/// Runs applications through the loan page
#[derive(Debug, Clone)]
pub struct LoanApplicationAutomator {
    page: LoanApplicationPage,
}

impl LoanApplicationAutomator {
    /// Wrap an existing page component
    #[must_use]
    pub const fn new(page: LoanApplicationPage) -> Self {
        Self { page }
    }

    /// Build the page component from a context
    #[must_use]
    pub fn from_context(ctx: ComponentContext) -> Self {
        Self::new(LoanApplicationPage::new(ctx))
    }

    /// The page being driven
    #[must_use]
    pub const fn page(&self) -> &LoanApplicationPage {
        &self.page
    }

    /// Drive one application end to end; `true` only when the page confirmed it
    pub async fn process_loan_application(&self, application: &LoanApplication) -> bool {
        self.process_with_report(application).await.success
    }

    /// Drive one application end to end and describe how far it got.
    ///
    /// Status is `Submitted` when confirmed, `InProgress` when a submit
    /// control was clicked but nothing confirmed it, `Draft` otherwise.
    pub async fn process_with_report(&self, application: &LoanApplication) -> SubmissionResult {
        let run_id = Uuid::new_v4().to_string();
        info!(%run_id, "processing loan application");

        let report = |success: bool,
                      status: ApplicationStatus,
                      message: Option<String>,
                      application_id: Option<String>| SubmissionResult {
            success,
            run_id: run_id.clone(),
            application_id,
            status,
            message,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.page.navigate_to_application().await {
            warn!(%run_id, error = %e, "could not open the application form");
            return report(false, ApplicationStatus::Draft, Some(e.to_string()), None);
        }

        let _ = self.page.dismiss_chat_widget().await;

        let filled = self.page.fill_complete_application(application).await;
        let unfilled: Vec<String> = [&filled.personal, &filled.financial, &filled.loan]
            .into_iter()
            .flat_map(|section| {
                section
                    .failed_fields()
                    .into_iter()
                    .map(move |field| format!("{}.{field}", section.section))
            })
            .collect();

        let _ = self.page.handle_challenge_widget().await;

        if !self.page.submit_application().await {
            return report(
                false,
                ApplicationStatus::Draft,
                Some("no submit control found".to_string()),
                None,
            );
        }

        if self.page.verify_submission_success().await {
            let application_id = self.application_id().await;
            info!(%run_id, application_id = ?application_id, "loan application submitted");
            let message = (!unfilled.is_empty())
                .then(|| format!("submitted with unfilled fields: {}", unfilled.join(", ")));
            report(true, ApplicationStatus::Submitted, message, application_id)
        } else {
            let mut message = "submission not confirmed".to_string();
            if !unfilled.is_empty() {
                message.push_str(&format!("; unfilled fields: {}", unfilled.join(", ")));
            }
            report(false, ApplicationStatus::InProgress, Some(message), None)
        }
    }

    async fn application_id(&self) -> Option<String> {
        let selector = Selector::css(format!("[{APPLICATION_ID_ATTR}]"));
        self.page
            .form()
            .context()
            .driver()
            .get_attribute(&selector, APPLICATION_ID_ATTR)
            .await
            .ok()
            .flatten()
    }
}
