//! Loan application page component.
//!
//! Business-level steps over [`FormComponent`]. Every field is addressed by
//! its semantics label first, since the form is rendered entirely into the
//! overlay.

use crate::component::{Component, ComponentContext};
use crate::form::{FieldResult, FormComponent};
use crate::locator::{attr_equals, Candidates, FieldStrategies, Selector, SEMANTICS_ROLE_ATTR};
use crate::models::{format_amount, FinancialInfo, LoanApplication, PersonalInfo};
use crate::result::{SemprobeError, SemprobeResult};
use crate::wait::{poll_until, ElementState, LoadState};
use async_trait::async_trait;
use serde::Serialize;
use std::any::Any;
use tracing::{debug, info, warn};

/// Component name used in logs and screenshots
pub const LOAN_PAGE_NAME: &str = "LoanApplicationPage";

/// Chat launchers that may cover the form
pub const CHAT_WIDGET_SELECTORS: [&str; 4] = [
    "#zendesk-chat",
    ".zopim-chat-widget",
    "[data-testid=\"chat-widget\"]",
    ".chat-widget",
];

/// Per-field results of one form section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    /// Section name
    pub section: String,
    /// Results in fill order
    pub fields: Vec<FieldResult>,
}

impl SectionReport {
    fn new(section: &str, fields: Vec<FieldResult>) -> Self {
        Self {
            section: section.to_string(),
            fields,
        }
    }

    /// Every field succeeded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fields.iter().all(|f| f.success)
    }

    /// Fields that could not be filled
    #[must_use]
    pub fn failed_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.success)
            .map(|f| f.field.as_str())
            .collect()
    }
}

/// Results of filling a complete application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplicationReport {
    /// Personal section
    pub personal: SectionReport,
    /// Financial section
    pub financial: SectionReport,
    /// Loan amount and purpose
    pub loan: SectionReport,
}

impl ApplicationReport {
    /// Every section complete
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.personal.is_complete() && self.financial.is_complete() && self.loan.is_complete()
    }
}

/// The loan application page
#[derive(Debug, Clone)]
pub struct LoanApplicationPage {
    form: FormComponent,
}

impl LoanApplicationPage {
    /// Create over a page context
    #[must_use]
    pub fn new(ctx: ComponentContext) -> Self {
        Self {
            form: FormComponent::new(LOAN_PAGE_NAME, ctx)
                .with_strategies(FieldStrategies::semantics_first()),
        }
    }

    /// Underlying form operations
    #[must_use]
    pub const fn form(&self) -> &FormComponent {
        &self.form
    }

    fn ctx(&self) -> &ComponentContext {
        self.form.context()
    }

    /// Canvas host
    #[must_use]
    pub fn flutter_view(&self) -> Selector {
        self.ctx().config().readiness.view()
    }

    /// Overlay root
    #[must_use]
    pub fn semantics_host(&self) -> Selector {
        self.ctx().config().readiness.marker()
    }

    /// Text-field semantics nodes
    #[must_use]
    pub fn text_fields(&self) -> Selector {
        self.ctx().config().readiness.text_fields()
    }

    /// Button semantics nodes
    #[must_use]
    pub fn buttons(&self) -> Selector {
        Selector::css(attr_equals(SEMANTICS_ROLE_ATTR, "button"))
    }

    /// Popup (dropdown) semantics nodes
    #[must_use]
    pub fn dropdowns(&self) -> Selector {
        Selector::css(attr_equals(SEMANTICS_ROLE_ATTR, "popup"))
    }

    /// Submit controls in priority order
    #[must_use]
    pub fn submit_candidates() -> Candidates {
        Candidates::new()
            .with(Selector::semantics_label("submit"))
            .with(Selector::semantics_label("apply"))
            .with(Selector::css_with_text("button", "Submit"))
            .with(Selector::css_with_text("button", "Apply"))
            .with("[type=\"submit\"]")
    }

    /// Indicators of a confirmed submission in priority order
    #[must_use]
    pub fn success_indicators() -> Vec<Selector> {
        vec![
            Selector::semantics_label("success"),
            Selector::semantics_label("submitted"),
            Selector::css(".success-message"),
            Selector::css(".confirmation-message"),
        ]
    }

    /// Navigate unless already on the target host, then wait for the overlay.
    ///
    /// Fails with [`SemprobeError::PageNotReady`] when the structural check
    /// fails after the overlay reported ready.
    pub async fn navigate_to_application(&self) -> SemprobeResult<()> {
        let ctx = self.ctx();
        let config = ctx.config();
        let driver = ctx.driver();

        let current = driver.current_url().await.unwrap_or_default();
        if current.contains(&config.target_host) {
            debug!(url = %current, "already on the application");
        } else {
            info!(url = %config.base_url, "navigating to application");
            driver.navigate(&config.base_url).await?;
            ctx.readiness().begin_page_load();
        }

        if let Err(e) = driver
            .wait_for_load_state(LoadState::NetworkIdle, config.timing.navigation_timeout())
            .await
        {
            warn!(error = %e, "network did not go idle after navigation");
        }

        ctx.readiness().wait_for_semantics_default().await?;

        if !self.is_ready().await {
            ctx.screenshot(LOAN_PAGE_NAME, "not-ready").await;
            return Err(SemprobeError::PageNotReady {
                page: LOAN_PAGE_NAME.to_string(),
                message: "canvas host or semantics overlay missing".to_string(),
            });
        }
        info!("loan application page ready");
        Ok(())
    }

    /// Fill names, contact details and the optional identity fields
    pub async fn fill_personal_info(&self, info: &PersonalInfo) -> SectionReport {
        let mut fields = vec![
            ("first name", info.first_name.as_str()),
            ("last name", info.last_name.as_str()),
            ("email", info.email.as_str()),
            ("phone", info.phone.as_str()),
        ];
        if let Some(dob) = &info.date_of_birth {
            fields.push(("date of birth", dob.as_str()));
        }
        if let Some(ssn) = &info.ssn {
            fields.push(("ssn", ssn.as_str()));
        }
        let report = SectionReport::new("personal", self.form.fill_fields(fields).await);
        log_section(&report);
        report
    }

    /// Fill income and employer, pick the employment type, then expenses
    pub async fn fill_financial_info(&self, info: &FinancialInfo) -> SectionReport {
        let mut fields = vec![("annual income".to_string(), format_amount(info.annual_income))];
        if let Some(employer) = &info.employer {
            fields.push(("employer".to_string(), employer.clone()));
        }
        let mut results = self.form.fill_fields(fields).await;

        if !info.employment_type.trim().is_empty() {
            let selected = self
                .form
                .select_dropdown_option(
                    Selector::semantics_label("employment"),
                    &info.employment_type,
                )
                .await;
            results.push(FieldResult {
                field: "employment type".to_string(),
                success: selected,
                skipped: false,
            });
        }

        if let Some(expenses) = info.monthly_expenses {
            results.extend(
                self.form
                    .fill_fields([("monthly expenses", format_amount(expenses))])
                    .await,
            );
        }

        let report = SectionReport::new("financial", results);
        log_section(&report);
        report
    }

    /// Fill the amount and pick the purpose
    pub async fn set_loan_details(&self, amount: f64, purpose: &str) -> SectionReport {
        let mut results = self
            .form
            .fill_fields([("loan amount", format_amount(amount))])
            .await;
        let selected = self
            .form
            .select_dropdown_option(Selector::semantics_label("purpose"), purpose)
            .await;
        results.push(FieldResult {
            field: "loan purpose".to_string(),
            success: selected,
            skipped: false,
        });
        let report = SectionReport::new("loan", results);
        log_section(&report);
        report
    }

    /// Click a submit control, then wait for the page to settle
    pub async fn submit_application(&self) -> bool {
        let clicked = self
            .form
            .submit_form(Some(&Self::submit_candidates()))
            .await;
        self.ctx().resolver().wait_for_stable_state().await;
        clicked
    }

    /// Obtain a challenge token and hand it to the page callback.
    ///
    /// `false` means no token was delivered, not that the run failed: absence
    /// of the widget is normal and yields `false`.
    pub async fn handle_challenge_widget(&self) -> bool {
        let ctx = self.ctx();
        let challenge = &ctx.config().challenge;
        let container = Selector::css(challenge.container_selector.clone());
        if ctx
            .resolver()
            .wait_for_element(
                &container,
                ElementState::Attached,
                ctx.timing().challenge_timeout(),
            )
            .await
            .is_err()
        {
            debug!("no challenge widget on the page");
            return false;
        }

        let token = match ctx.driver().evaluate(&challenge.execute_script()).await {
            Ok(serde_json::Value::String(token)) if !token.is_empty() => token,
            Ok(_) => {
                warn!("challenge widget present but produced no token");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "challenge execution failed");
                return false;
            }
        };

        match ctx
            .driver()
            .evaluate(&challenge.callback_script(&token))
            .await
        {
            Ok(delivered) => {
                let delivered = delivered.as_bool() == Some(true);
                info!(delivered, "challenge token handled");
                delivered
            }
            Err(e) => {
                warn!(error = %e, "challenge callback failed");
                false
            }
        }
    }

    /// Click the first visible chat launcher, if any
    pub async fn dismiss_chat_widget(&self) -> bool {
        let ctx = self.ctx();
        for css in CHAT_WIDGET_SELECTORS {
            let selector = Selector::css(css);
            if ctx
                .resolver()
                .is_visible(&selector, ctx.timing().chat_timeout())
                .await
            {
                let clicked = ctx
                    .driver()
                    .click(&selector, ctx.resolver().default_options())
                    .await
                    .is_ok();
                debug!(%selector, clicked, "chat widget interaction");
                return clicked;
            }
        }
        false
    }

    /// Poll the success indicators until one is visible or the timeout elapses
    pub async fn verify_submission_success(&self) -> bool {
        let ctx = self.ctx();
        let indicators = Self::success_indicators();
        let indicators = &indicators;
        let driver = ctx.driver();
        let result = poll_until(
            "submission success indicator",
            ctx.timing().success_timeout(),
            ctx.timing().success_poll(),
            move || async move {
                for indicator in indicators {
                    if driver.is_visible(indicator).await.unwrap_or(false) {
                        return true;
                    }
                }
                false
            },
        )
        .await;
        if result.success {
            info!("submission confirmed");
        } else {
            warn!("no submission success indicator appeared");
            ctx.screenshot(LOAN_PAGE_NAME, "submission-unconfirmed").await;
        }
        result.success
    }

    /// Fill personal, financial, then loan details, in that order
    pub async fn fill_complete_application(&self, application: &LoanApplication) -> ApplicationReport {
        let personal = self.fill_personal_info(&application.personal_info).await;
        let financial = self.fill_financial_info(&application.financial_info).await;
        let loan = self
            .set_loan_details(application.loan_amount, &application.loan_purpose)
            .await;
        ApplicationReport {
            personal,
            financial,
            loan,
        }
    }
}

fn log_section(report: &SectionReport) {
    if report.is_complete() {
        info!(section = %report.section, fields = report.fields.len(), "section filled");
    } else {
        warn!(
            section = %report.section,
            failed = ?report.failed_fields(),
            "section partially filled"
        );
    }
}

#[async_trait]
impl Component for LoanApplicationPage {
    fn name(&self) -> &str {
        LOAN_PAGE_NAME
    }

    /// Canvas host and overlay root both attached
    async fn is_ready(&self) -> bool {
        let driver = self.ctx().driver();
        let attached = |n: SemprobeResult<usize>| n.map_or(false, |n| n > 0);
        attached(driver.count(&self.flutter_view()).await)
            && attached(driver.count(&self.semantics_host()).await)
    }

    async fn initialize(&self) -> SemprobeResult<()> {
        self.navigate_to_application().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SemprobeConfig;
    use crate::mock::{MockAction, MockDriver, MockElement};
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> SemprobeConfig {
        SemprobeConfig::default()
            .with_screenshot_dir(std::env::temp_dir().join("semprobe-loan-page-tests"))
    }

    fn fixture() -> (Arc<MockDriver>, LoanApplicationPage) {
        let driver = Arc::new(MockDriver::new());
        let ctx = ComponentContext::new(driver.clone(), config());
        (driver, LoanApplicationPage::new(ctx))
    }

    fn render_overlay(driver: &MockDriver) {
        driver.add_element("flutter-view", MockElement::new("flutter-view"));
        driver.add_element("flt-semantics-host", MockElement::new("flt-semantics-host"));
        driver.add_element("flt-semantics-host > *", MockElement::new("flt-semantics"));
    }

    fn personal() -> PersonalInfo {
        PersonalInfo {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555-123-4567".into(),
            date_of_birth: None,
            ssn: Some("123-45-6789".into()),
        }
    }

    mod navigation_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_navigates_when_off_host() {
            let (driver, page) = fixture();
            render_overlay(&driver);
            page.navigate_to_application().await.unwrap();
            assert_eq!(
                driver.actions(),
                vec![MockAction::Navigate(
                    "https://myaccount.withuloans.com/login".into()
                )]
            );
            assert!(page.is_ready().await);
        }

        #[tokio::test(start_paused = true)]
        async fn test_skips_navigation_on_host() {
            let driver = Arc::new(
                MockDriver::new().with_url("https://myaccount.withuloans.com/dashboard"),
            );
            render_overlay(&driver);
            let page = LoanApplicationPage::new(ComponentContext::new(driver.clone(), config()));
            page.navigate_to_application().await.unwrap();
            assert!(driver.actions().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_overlay_times_out() {
            let (_, page) = fixture();
            let err = page.navigate_to_application().await.unwrap_err();
            assert!(err.is_timeout());
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_canvas_host_is_not_ready() {
            let (driver, page) = fixture();
            driver.add_element("flt-semantics-host", MockElement::new("flt-semantics-host"));
            driver.add_element("flt-semantics-host > *", MockElement::new("flt-semantics"));
            let err = page.navigate_to_application().await.unwrap_err();
            assert!(matches!(err, SemprobeError::PageNotReady { .. }));
        }
    }

    mod section_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_personal_info_by_semantics_label() {
            let (driver, page) = fixture();
            for label in ["first name", "last name", "email", "phone", "ssn"] {
                driver.add_element(Selector::semantics_label(label), MockElement::input());
            }
            let report = page.fill_personal_info(&personal()).await;
            assert!(report.is_complete());
            assert_eq!(report.fields.len(), 5);
            assert_eq!(
                driver.value_of(Selector::semantics_label("last name")),
                Some("Lovelace".into())
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_financial_info_selects_employment() {
            let (driver, page) = fixture();
            driver.add_element(Selector::semantics_label("annual income"), MockElement::input());
            driver.add_element(
                Selector::semantics_label("employment"),
                MockElement::select(["Full-time", "Contract"]),
            );
            let info = FinancialInfo {
                annual_income: 50000.99,
                employment_type: "Contract".into(),
                employer: None,
                monthly_expenses: None,
            };
            let report = page.fill_financial_info(&info).await;
            assert!(report.is_complete());
            assert_eq!(
                driver.value_of(Selector::semantics_label("annual income")),
                Some("50000.99".into())
            );
            assert_eq!(
                driver.value_of(Selector::semantics_label("employment")),
                Some("Contract".into())
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_loan_details_report_failures() {
            let (driver, page) = fixture();
            driver.add_element(Selector::semantics_label("loan amount"), MockElement::input());
            let report = page.set_loan_details(25000.0, "Vacation").await;
            assert!(!report.is_complete());
            assert_eq!(report.failed_fields(), vec!["loan purpose"]);
            assert_eq!(
                driver.value_of(Selector::semantics_label("loan amount")),
                Some("25000".into())
            );
        }
    }

    mod widget_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_challenge_absent_is_false() {
            let (driver, page) = fixture();
            assert!(!page.handle_challenge_widget().await);
            assert!(driver.evaluations().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_challenge_token_delivered() {
            let (driver, page) = fixture();
            let challenge = SemprobeConfig::default().challenge;
            driver.add_element(".g-recaptcha", MockElement::new("div"));
            driver.set_eval_result(challenge.execute_script(), serde_json::json!("tok-1"));
            driver.set_eval_result(challenge.callback_script("tok-1"), serde_json::json!(true));
            assert!(page.handle_challenge_widget().await);
            assert_eq!(driver.evaluations().len(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_chat_widget_dismissed() {
            let (driver, page) = fixture();
            driver.add_element(".chat-widget", MockElement::button("Chat"));
            assert!(page.dismiss_chat_widget().await);
            assert_eq!(driver.actions(), vec![MockAction::Click("css=.chat-widget".into())]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_success_indicator_appears_late() {
            let (driver, page) = fixture();
            driver.add_element(
                ".confirmation-message",
                MockElement::text_node("Thanks").appearing_after(Duration::from_millis(1200)),
            );
            assert!(page.verify_submission_success().await);
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_success_indicator() {
            let (_, page) = fixture();
            let start = tokio::time::Instant::now();
            assert!(!page.verify_submission_success().await);
            assert!(start.elapsed() >= Duration::from_millis(5000));
        }
    }
}
