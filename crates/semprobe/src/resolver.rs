//! Multi-candidate element resolution.
//!
//! [`ElementResolver::interact`] tries an ordered list of selectors and
//! performs the action on the first one that becomes visible within a short
//! probe. Failures of individual candidates are expected (the overlay exposes
//! each control under only some attribute schemes) and are logged at `debug`
//! before moving on. Only when every candidate fails does the caller see an
//! unsuccessful [`InteractionOutcome`].

use crate::config::TimingConfig;
use crate::driver::{ActionOptions, PageDriver};
use crate::locator::{Candidates, Selector};
use crate::result::SemprobeResult;
use crate::wait::{duration_ms, ElementState, LoadState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Action performed on a resolved element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Click
    Click,
    /// Replace the value
    Fill(String),
    /// Hover
    Hover,
    /// Focus
    Focus,
}

impl Action {
    /// Action name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill(_) => "fill",
            Self::Hover => "hover",
            Self::Focus => "focus",
        }
    }
}

/// Result of a multi-candidate interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionOutcome {
    /// Whether the action was performed
    pub success: bool,
    /// Index of the candidate that was acted on
    pub matched: Option<usize>,
    /// The candidate that was acted on
    pub selector: Option<Selector>,
    /// Last candidate failure, when unsuccessful
    pub diagnostic: Option<String>,
}

impl InteractionOutcome {
    /// Action performed on the candidate at `index`
    #[must_use]
    pub fn matched(index: usize, selector: Selector) -> Self {
        Self {
            success: true,
            matched: Some(index),
            selector: Some(selector),
            diagnostic: None,
        }
    }

    /// No candidate was actionable
    #[must_use]
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            matched: None,
            selector: None,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Resolves candidate lists against a page and runs the shared element helpers
pub struct ElementResolver {
    driver: Arc<dyn PageDriver>,
    timing: TimingConfig,
}

impl std::fmt::Debug for ElementResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementResolver")
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl ElementResolver {
    /// Create a resolver over a driver
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, timing: TimingConfig) -> Self {
        Self { driver, timing }
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    /// Timing in use
    #[must_use]
    pub const fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Default action options (configured action timeout, no force)
    #[must_use]
    pub fn default_options(&self) -> ActionOptions {
        ActionOptions::new(self.timing.action_timeout())
    }

    /// Perform `action` on the first actionable candidate, in order.
    ///
    /// Each candidate gets the probe timeout to become visible, independent of
    /// `options.timeout`, which bounds the action itself. At most one action
    /// is performed.
    pub async fn interact(
        &self,
        candidates: &Candidates,
        action: &Action,
        options: ActionOptions,
    ) -> InteractionOutcome {
        if candidates.is_empty() {
            return InteractionOutcome::failed("no candidates");
        }
        let mut last_error = String::new();
        for (index, selector) in candidates.iter().enumerate() {
            match self.try_candidate(selector, action, options).await {
                Ok(true) => {
                    debug!(action = action.name(), %selector, index, "candidate matched");
                    return InteractionOutcome::matched(index, selector.clone());
                }
                Ok(false) => {
                    debug!(action = action.name(), %selector, "candidate not visible");
                    last_error = format!("{selector}: not visible");
                }
                Err(e) => {
                    debug!(action = action.name(), %selector, error = %e, "candidate failed");
                    last_error = format!("{selector}: {e}");
                }
            }
        }
        debug!(
            action = action.name(),
            candidates = candidates.len(),
            "no candidate was actionable"
        );
        InteractionOutcome::failed(last_error)
    }

    async fn try_candidate(
        &self,
        selector: &Selector,
        action: &Action,
        options: ActionOptions,
    ) -> SemprobeResult<bool> {
        self.driver
            .wait_for(selector, ElementState::Visible, self.timing.probe_timeout())
            .await?;
        if !self.driver.is_visible(selector).await? {
            return Ok(false);
        }
        match action {
            Action::Click => self.driver.click(selector, options).await?,
            Action::Fill(value) => self.driver.fill(selector, value, options).await?,
            Action::Hover => self.driver.hover(selector, options).await?,
            Action::Focus => self.driver.focus(selector, options).await?,
        }
        Ok(true)
    }

    /// Click the first actionable candidate with default options
    pub async fn click(&self, candidates: &Candidates) -> InteractionOutcome {
        self.interact(candidates, &Action::Click, self.default_options())
            .await
    }

    /// Fill the first actionable candidate with default options
    pub async fn fill(&self, candidates: &Candidates, value: &str) -> InteractionOutcome {
        self.interact(
            candidates,
            &Action::Fill(value.to_string()),
            self.default_options(),
        )
        .await
    }

    /// Text of the first match once visible, `None` when absent
    pub async fn get_text(&self, selector: &Selector) -> Option<String> {
        self.driver
            .wait_for(selector, ElementState::Visible, self.timing.text_timeout())
            .await
            .ok()?;
        self.driver.text_content(selector).await.ok().flatten()
    }

    /// Whether the first match becomes visible within `timeout`
    pub async fn is_visible(&self, selector: &Selector, timeout: Duration) -> bool {
        self.driver
            .wait_for(selector, ElementState::Visible, timeout)
            .await
            .is_ok()
    }

    /// Hard wait for an element state; the timeout is propagated
    pub async fn wait_for_element(
        &self,
        selector: &Selector,
        state: ElementState,
        timeout: Duration,
    ) -> SemprobeResult<()> {
        self.driver.wait_for(selector, state, timeout).await
    }

    /// Wait for network idle, then settle. Never fails.
    pub async fn wait_for_stable_state(&self) {
        let timeout = self.timing.stable_timeout();
        if let Err(e) = self
            .driver
            .wait_for_load_state(LoadState::NetworkIdle, timeout)
            .await
        {
            debug!(timeout_ms = duration_ms(timeout), error = %e, "network did not go idle");
        }
        tokio::time::sleep(self.timing.stable_settle()).await;
    }

    /// Save a screenshot as `<dir>/<component>-<name>-<timestamp>.png`.
    ///
    /// Best effort: failures are logged and yield `None`.
    pub async fn take_screenshot(
        &self,
        dir: &Path,
        component: &str,
        name: &str,
    ) -> Option<PathBuf> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
        let path = dir.join(format!("{component}-{name}-{timestamp}.png"));
        let saved = match self.driver.screenshot().await {
            Ok(shot) => shot.save(&path).await,
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(component, name, error = %e, "could not take screenshot");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAction, MockDriver, MockElement};
    use proptest::prelude::*;

    fn fixture() -> (Arc<MockDriver>, ElementResolver) {
        let driver = Arc::new(MockDriver::new());
        let resolver = ElementResolver::new(driver.clone(), TimingConfig::default());
        (driver, resolver)
    }

    mod interact_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_first_visible_candidate_wins() {
            let (driver, resolver) = fixture();
            driver.add_element("#b", MockElement::button("B"));
            driver.add_element("#c", MockElement::button("C"));
            let candidates = Candidates::new().with("#a").with("#b").with("#c");

            let outcome = resolver.click(&candidates).await;

            assert!(outcome.success);
            assert_eq!(outcome.matched, Some(1));
            assert_eq!(outcome.selector, Some(Selector::css("#b")));
            assert_eq!(driver.actions(), vec![MockAction::Click("css=#b".into())]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_probe_timeout_is_per_candidate() {
            let (driver, resolver) = fixture();
            driver.add_element("#c", MockElement::input());
            let candidates = Candidates::new().with("#a").with("#b").with("#c");
            let start = tokio::time::Instant::now();

            let outcome = resolver.fill(&candidates, "x").await;

            assert!(outcome.success);
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(6000));
            assert!(elapsed < Duration::from_millis(6100));
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_actionable_candidate_fails_without_action() {
            let (driver, resolver) = fixture();
            driver.add_element("#hidden", MockElement::button("H").hidden());
            driver.add_element("#broken", MockElement::button("B").broken());
            let candidates = Candidates::new().with("#hidden").with("#broken");

            let outcome = resolver.click(&candidates).await;

            assert!(!outcome.success);
            assert_eq!(outcome.matched, None);
            assert!(outcome.diagnostic.unwrap().contains("#broken"));
            assert!(driver.actions().is_empty());
        }

        #[tokio::test]
        async fn test_empty_candidates() {
            let (_, resolver) = fixture();
            let outcome = resolver.click(&Candidates::new()).await;
            assert!(!outcome.success);
            assert_eq!(outcome.diagnostic.as_deref(), Some("no candidates"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_hover_and_focus() {
            let (driver, resolver) = fixture();
            driver.add_element("#menu", MockElement::button("Menu"));
            let candidates = Candidates::from(Selector::css("#menu"));
            let opts = resolver.default_options();
            assert!(resolver.interact(&candidates, &Action::Hover, opts).await.success);
            assert!(resolver.interact(&candidates, &Action::Focus, opts).await.success);
            assert_eq!(
                driver.actions(),
                vec![
                    MockAction::Hover("css=#menu".into()),
                    MockAction::Focus("css=#menu".into())
                ]
            );
        }
    }

    mod helper_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_get_text_absent_is_none() {
            let (driver, resolver) = fixture();
            driver.add_element(".title", MockElement::text_node("Apply now"));
            assert_eq!(
                resolver.get_text(&Selector::css(".title")).await,
                Some("Apply now".to_string())
            );
            assert_eq!(resolver.get_text(&Selector::css(".missing")).await, None);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stable_state_tolerates_busy_network() {
            let (driver, resolver) = fixture();
            driver.set_network_idle(false);
            let start = tokio::time::Instant::now();
            resolver.wait_for_stable_state().await;
            assert!(start.elapsed() >= Duration::from_millis(6000));
        }

        #[tokio::test]
        async fn test_screenshot_path_layout() {
            let (_, resolver) = fixture();
            let dir = tempfile::tempdir().unwrap();
            let path = resolver
                .take_screenshot(dir.path(), "LoanApplicationPage", "failure")
                .await
                .unwrap();
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("LoanApplicationPage-failure-"));
            assert!(name.ends_with(".png"));
            assert!(path.exists());
        }
    }

    mod property_tests {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn prop_acts_exactly_once_on_first_actionable(
                visible in proptest::collection::vec(any::<bool>(), 1..5)
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let (driver, resolver) = fixture();
                    let mut candidates = Candidates::new();
                    for (i, shown) in visible.iter().enumerate() {
                        let id = format!("#c{i}");
                        let element = MockElement::button("x");
                        driver.add_element(id.as_str(), if *shown { element } else { element.hidden() });
                        candidates.push(id);
                    }

                    let outcome = resolver.click(&candidates).await;
                    let expected = visible.iter().position(|v| *v);

                    prop_assert_eq!(outcome.success, expected.is_some());
                    prop_assert_eq!(outcome.matched, expected);
                    prop_assert_eq!(driver.actions().len(), usize::from(expected.is_some()));
                    Ok(())
                })?;
            }
        }
    }
}
