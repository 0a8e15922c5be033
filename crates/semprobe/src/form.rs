//! Generic form operations over the semantics overlay.
//!
//! Every operation is best effort: a control that cannot be found or acted on
//! yields `false`, `None` or an empty list, never an error. Running an
//! operation twice against an unchanged page has the same visible effect as
//! running it once.

use crate::component::{Component, ComponentContext};
use crate::locator::{Candidates, FieldStrategies, Selector};
use crate::wait::{duration_ms, poll_until, ElementState};
use async_trait::async_trait;
use serde::Serialize;
use std::any::Any;
use tracing::{debug, info, warn};

/// Error message elements
pub const VALIDATION_ERROR_SELECTOR: &str = ".error, .error-message, [role=\"alert\"]";

/// Elements signalling pending validation
pub const LOADING_INDICATOR_SELECTOR: &str = "[data-loading=\"true\"], .loading, .spinner";

/// Controls a form reset clears one by one
pub const RESETTABLE_FIELD_SELECTOR: &str =
    "input:not([type=\"submit\"]):not([type=\"button\"]), textarea, select";

/// Submit controls tried when the caller gives none
#[must_use]
pub fn default_submit_candidates() -> Candidates {
    Candidates::new()
        .with("[type=\"submit\"]")
        .with("button[type=\"submit\"]")
        .with("input[type=\"submit\"]")
        .with(Selector::css_with_text("button", "Submit"))
        .with(Selector::css_with_text("button", "Send"))
        .with(Selector::css_with_text("button", "Apply"))
        .with(Selector::css_with_text(
            "[data-semantics-role=\"button\"]",
            "Submit",
        ))
}

/// Controls that reset a whole form
#[must_use]
pub fn reset_candidates() -> Candidates {
    Candidates::new()
        .with("[type=\"reset\"]")
        .with(Selector::css_with_text("button", "Reset"))
        .with(Selector::css_with_text("button", "Clear"))
}

/// Outcome of filling one logical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldResult {
    /// Logical field name
    pub field: String,
    /// Filled, or skipped because the value was blank
    pub success: bool,
    /// Blank value; the page was not touched
    pub skipped: bool,
}

impl FieldResult {
    fn filled(field: &str, success: bool) -> Self {
        Self {
            field: field.to_string(),
            success,
            skipped: false,
        }
    }

    fn skipped(field: &str) -> Self {
        Self {
            field: field.to_string(),
            success: true,
            skipped: true,
        }
    }
}

/// Form operations shared by page components
#[derive(Debug, Clone)]
pub struct FormComponent {
    name: String,
    ctx: ComponentContext,
    strategies: FieldStrategies,
}

impl FormComponent {
    /// Create with the default field strategies
    #[must_use]
    pub fn new(name: impl Into<String>, ctx: ComponentContext) -> Self {
        Self {
            name: name.into(),
            ctx,
            strategies: FieldStrategies::default(),
        }
    }

    /// Replace the field strategy order
    #[must_use]
    pub fn with_strategies(mut self, strategies: FieldStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    /// Shared page context
    #[must_use]
    pub const fn context(&self) -> &ComponentContext {
        &self.ctx
    }

    /// Field strategies in use
    #[must_use]
    pub const fn strategies(&self) -> &FieldStrategies {
        &self.strategies
    }

    /// Fill the first actionable candidate of explicit selectors
    pub async fn fill_candidates(&self, candidates: &Candidates, value: &str) -> bool {
        self.ctx.resolver().fill(candidates, value).await.success
    }

    /// Click the first actionable candidate of explicit selectors
    pub async fn click_candidates(&self, candidates: &Candidates) -> bool {
        self.ctx.resolver().click(candidates).await.success
    }

    /// Fill a logical field through the strategy list
    pub async fn fill_field(&self, field: &str, value: &str) -> bool {
        let candidates = self.strategies.candidates_for(field);
        let outcome = self.ctx.resolver().fill(&candidates, value).await;
        if outcome.success {
            debug!(form = %self.name, field, index = ?outcome.matched, "field filled");
        } else {
            warn!(form = %self.name, field, "no strategy located the field");
        }
        outcome.success
    }

    /// Fill fields in the given order.
    ///
    /// Blank values succeed without touching the page. Each successful fill is
    /// followed by the pacing delay.
    pub async fn fill_fields<I, K, V>(&self, fields: I) -> Vec<FieldResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut results = Vec::new();
        for (field, value) in fields {
            let (field, value) = (field.as_ref(), value.as_ref());
            if value.trim().is_empty() {
                results.push(FieldResult::skipped(field));
                continue;
            }
            let success = self.fill_field(field, value).await;
            if success {
                tokio::time::sleep(self.ctx.timing().fill_pacing()).await;
            }
            results.push(FieldResult::filled(field, success));
        }
        results
    }

    /// Fill explicit selectors, returning how many succeeded
    pub async fn fill_multiple_fields(&self, fields: &[(Selector, String)]) -> usize {
        let mut filled = 0;
        for (selector, value) in fields {
            if value.trim().is_empty() {
                continue;
            }
            if self
                .fill_candidates(&Candidates::from(selector.clone()), value)
                .await
            {
                filled += 1;
                tokio::time::sleep(self.ctx.timing().fill_pacing()).await;
            } else {
                warn!(form = %self.name, %selector, "failed to fill field");
            }
        }
        filled
    }

    /// Value of an input, textarea or select; text content otherwise
    pub async fn get_field_value(&self, selector: &Selector) -> Option<String> {
        let driver = self.ctx.driver();
        driver
            .wait_for(selector, ElementState::Visible, self.ctx.timing().probe_timeout())
            .await
            .ok()?;
        let tag = driver.tag_name(selector).await.ok()?;
        match tag.as_str() {
            "input" | "textarea" | "select" => driver.input_value(selector).await.ok(),
            _ => driver.text_content(selector).await.ok().flatten(),
        }
    }

    /// Clear a visible field
    pub async fn clear_field(&self, selector: &Selector) -> bool {
        let driver = self.ctx.driver();
        if driver
            .wait_for(selector, ElementState::Visible, self.ctx.timing().probe_timeout())
            .await
            .is_err()
        {
            return false;
        }
        driver.clear(selector).await.is_ok()
    }

    /// Choose an option in a custom popup, a native select, or by semantics label.
    ///
    /// A dropdown with `role="combobox"` or an `aria-expanded` attribute is
    /// opened and its `[role="option"]` clicked. Anything else is treated as a
    /// native `<select>`. If neither path succeeds the option text is matched
    /// against semantics labels.
    pub async fn select_dropdown_option(
        &self,
        dropdown: impl Into<Selector>,
        option_text: &str,
    ) -> bool {
        let dropdown = dropdown.into();
        let driver = self.ctx.driver();
        let resolver = self.ctx.resolver();
        let timing = self.ctx.timing();

        if resolver
            .is_visible(&dropdown, timing.dropdown_timeout())
            .await
        {
            let role = driver.get_attribute(&dropdown, "role").await.ok().flatten();
            let expanded = driver
                .get_attribute(&dropdown, "aria-expanded")
                .await
                .ok()
                .flatten();

            if role.as_deref() == Some("combobox") || expanded.is_some() {
                if resolver
                    .click(&Candidates::from(dropdown.clone()))
                    .await
                    .success
                {
                    tokio::time::sleep(timing.popup_delay()).await;
                    let option = Selector::css_with_text("[role=\"option\"]", option_text);
                    if self.click_when_visible(&option).await {
                        info!(form = %self.name, option = option_text, "popup option selected");
                        return true;
                    }
                }
            } else if driver.select_option(&dropdown, option_text).await.is_ok() {
                info!(form = %self.name, option = option_text, "native option selected");
                return true;
            }
        }

        let semantic = Selector::semantics_label(option_text);
        if self.click_when_visible(&semantic).await {
            info!(form = %self.name, option = option_text, "option selected by semantics label");
            return true;
        }
        warn!(form = %self.name, %dropdown, option = option_text, "failed to select dropdown option");
        false
    }

    async fn click_when_visible(&self, selector: &Selector) -> bool {
        let resolver = self.ctx.resolver();
        if !resolver
            .is_visible(selector, self.ctx.timing().option_timeout())
            .await
        {
            return false;
        }
        self.ctx
            .driver()
            .click(selector, resolver.default_options())
            .await
            .is_ok()
    }

    /// Click a submit control; `None` uses [`default_submit_candidates`]
    pub async fn submit_form(&self, candidates: Option<&Candidates>) -> bool {
        let defaults;
        let candidates = match candidates {
            Some(c) => c,
            None => {
                defaults = default_submit_candidates();
                &defaults
            }
        };
        let outcome = self.ctx.resolver().click(candidates).await;
        if outcome.success {
            info!(form = %self.name, selector = ?outcome.selector, "form submitted");
        } else {
            warn!(form = %self.name, "no submit control found");
        }
        outcome.success
    }

    /// Apply a predicate to the field's value; absent fields fail
    pub async fn validate_field<F>(&self, selector: &Selector, rule: F) -> bool
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        match self.get_field_value(selector).await {
            Some(value) if !value.is_empty() => rule(&value),
            _ => false,
        }
    }

    /// Wait for loading indicators to disappear, then settle
    pub async fn wait_for_form_validation(&self) {
        let timing = self.ctx.timing();
        let driver = self.ctx.driver();
        let loading = Selector::css(LOADING_INDICATOR_SELECTOR);
        let loading = &loading;
        let result = poll_until(
            "validation indicators cleared",
            timing.validation_timeout(),
            self.ctx.config().readiness.poll_interval(),
            move || async move { driver.count(loading).await.map_or(true, |n| n == 0) },
        )
        .await;
        if !result.success {
            warn!(
                form = %self.name,
                timeout_ms = duration_ms(timing.validation_timeout()),
                "form validation timeout"
            );
        }
        tokio::time::sleep(timing.validation_settle()).await;
    }

    /// Whether a validation error is visible, for one field (CSS) or the whole form
    pub async fn has_validation_error(&self, field_css: Option<&str>) -> bool {
        let selector = match field_css {
            Some(field) => Selector::css(format!("{field} ~ .error, {field} + .error")),
            None => Selector::css(VALIDATION_ERROR_SELECTOR),
        };
        self.ctx
            .resolver()
            .is_visible(&selector, self.ctx.timing().validation_error_timeout())
            .await
    }

    /// Non-blank validation messages currently on the page
    pub async fn get_validation_errors(&self) -> Vec<String> {
        self.ctx
            .driver()
            .all_text_contents(&Selector::css(VALIDATION_ERROR_SELECTOR))
            .await
            .map(|texts| {
                texts
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// No validation error visible
    pub async fn is_form_valid(&self) -> bool {
        !self.has_validation_error(None).await
    }

    /// Click a reset control, or clear every field when there is none
    pub async fn reset_form(&self) -> bool {
        let driver = self.ctx.driver();
        let candidates = reset_candidates();
        let controls = &candidates;
        let found = poll_until(
            "reset control",
            self.ctx.timing().probe_timeout(),
            self.ctx.config().readiness.poll_interval(),
            move || async move {
                for control in controls.iter() {
                    if driver.is_visible(control).await.unwrap_or(false) {
                        return true;
                    }
                }
                false
            },
        )
        .await;
        if found.success {
            for control in candidates.iter() {
                if driver.is_visible(control).await.unwrap_or(false) {
                    return self
                        .click_candidates(&Candidates::from(control.clone()))
                        .await;
                }
            }
        }

        let fields = Selector::css(RESETTABLE_FIELD_SELECTOR);
        let count = driver.count(&fields).await.unwrap_or(0);
        for index in 0..count {
            if let Err(e) = driver.clear(&fields.clone().nth(index)).await {
                warn!(form = %self.name, index, error = %e, "failed to reset form");
                return false;
            }
        }
        debug!(form = %self.name, count, "form fields cleared");
        true
    }
}

#[async_trait]
impl Component for FormComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_ready(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
