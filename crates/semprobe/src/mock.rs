//! Scripted in-memory page for testing without a browser.
//!
//! A [`MockDriver`] holds a table of elements keyed by the [`Selector`] that
//! finds them. Elements can be hidden, appear after a delay, refuse actions,
//! or be revealed by clicking another element. Every page-mutating command is
//! recorded so tests can assert on exactly what was touched.
//!
//! Time is measured with `tokio::time`, so tests using a paused clock advance
//! through appearance delays and timeouts instantly.
//!
//! ```rust,ignore
//! let driver = MockDriver::new();
//! driver.add_element(Selector::semantics_label("email"), MockElement::input());
//! driver.fill(&Selector::semantics_label("email"), "a@b.co", ActionOptions::default()).await?;
//! assert_eq!(driver.value_of(Selector::semantics_label("email")), Some("a@b.co".into()));
//! ```

use crate::driver::{ActionOptions, PageDriver, Screenshot};
use crate::locator::Selector;
use crate::result::{SemprobeError, SemprobeResult};
use crate::wait::{duration_ms, ElementState, LoadState};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const MOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A single scripted element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Lower-case tag name
    pub tag: String,
    /// Rendered with a non-empty box
    pub visible: bool,
    /// Current input value
    pub value: String,
    /// Text content
    pub text: Option<String>,
    /// Attributes
    pub attributes: HashMap<String, String>,
    /// Option labels for `<select>` elements
    pub options: Vec<String>,
    /// Attached only once this much time has passed since the driver was created
    pub appears_after: Option<Duration>,
    /// Every action on this element fails
    pub broken: bool,
}

impl MockElement {
    /// Visible element with a tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            visible: true,
            value: String::new(),
            text: None,
            attributes: HashMap::new(),
            options: Vec::new(),
            appears_after: None,
            broken: false,
        }
    }

    /// Visible `<input>`
    #[must_use]
    pub fn input() -> Self {
        Self::new("input")
    }

    /// Visible `<button>` with text
    #[must_use]
    pub fn button(text: impl Into<String>) -> Self {
        Self::new("button").with_text(text)
    }

    /// Visible `<div>` with text
    #[must_use]
    pub fn text_node(text: impl Into<String>) -> Self {
        Self::new("div").with_text(text)
    }

    /// Visible `<select>` offering labels
    #[must_use]
    pub fn select<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut element = Self::new("select");
        element.options = options.into_iter().map(Into::into).collect();
        element
    }

    /// Mark hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set initial value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attach only after a delay
    #[must_use]
    pub fn appearing_after(mut self, delay: Duration) -> Self {
        self.appears_after = Some(delay);
        self
    }

    /// Make every action fail
    #[must_use]
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

/// A recorded page-mutating command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
    /// Navigation to a URL
    Navigate(String),
    /// Click on a selector
    Click(String),
    /// Fill of a selector
    Fill {
        /// Target selector
        selector: String,
        /// Value written
        value: String,
    },
    /// Hover over a selector
    Hover(String),
    /// Focus of a selector
    Focus(String),
    /// Clear of a selector
    Clear(String),
    /// Native option selection
    Select {
        /// Target selector
        selector: String,
        /// Chosen label
        label: String,
    },
}

impl MockAction {
    /// Selector the action targeted, if any
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Navigate(_) => None,
            Self::Click(s) | Self::Hover(s) | Self::Focus(s) | Self::Clear(s) => Some(s),
            Self::Fill { selector, .. } | Self::Select { selector, .. } => Some(selector),
        }
    }
}

#[derive(Debug)]
struct MockState {
    url: String,
    elements: HashMap<String, Vec<MockElement>>,
    reveals: HashMap<String, Vec<(String, MockElement)>>,
    eval_results: HashMap<String, Value>,
    evaluations: Vec<String>,
    actions: Vec<MockAction>,
    network_idle: bool,
    blocked: Vec<String>,
    init_scripts: Vec<String>,
    viewport: Option<(u32, u32)>,
}

/// Scripted [`PageDriver`] backed by an element table
#[derive(Debug)]
pub struct MockDriver {
    epoch: Instant,
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn key_of(selector: &Selector) -> (String, usize) {
    match selector {
        Selector::Nth { inner, index } => (inner.to_string(), *index),
        other => (other.to_string(), 0),
    }
}

impl MockDriver {
    /// Create an empty page at `about:blank`
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            state: Mutex::new(MockState {
                url: "about:blank".to_string(),
                elements: HashMap::new(),
                reveals: HashMap::new(),
                eval_results: HashMap::new(),
                evaluations: Vec::new(),
                actions: Vec::new(),
                network_idle: true,
                blocked: Vec::new(),
                init_scripts: Vec::new(),
                viewport: None,
            }),
        }
    }

    /// Start at a URL
    #[must_use]
    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.lock().url = url.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_attached(&self, element: &MockElement) -> bool {
        element
            .appears_after
            .map_or(true, |delay| self.epoch.elapsed() >= delay)
    }

    /// Add an element matched by a selector. Repeated calls add further matches.
    pub fn add_element(&self, selector: impl Into<Selector>, element: MockElement) {
        self.lock()
            .elements
            .entry(selector.into().to_string())
            .or_default()
            .push(element);
    }

    /// Remove every element matched by a selector
    pub fn remove_elements(&self, selector: impl Into<Selector>) {
        self.lock().elements.remove(&selector.into().to_string());
    }

    /// Attach `element` under `target` the first time `trigger` is clicked
    pub fn reveal_on_click(
        &self,
        trigger: impl Into<Selector>,
        target: impl Into<Selector>,
        element: MockElement,
    ) {
        self.lock()
            .reveals
            .entry(trigger.into().to_string())
            .or_default()
            .push((target.into().to_string(), element));
    }

    /// Script the result of an exact in-page script. Unscripted scripts yield `null`.
    pub fn set_eval_result(&self, script: impl Into<String>, value: Value) {
        self.lock().eval_results.insert(script.into(), value);
    }

    /// Control whether the network ever goes idle
    pub fn set_network_idle(&self, idle: bool) {
        self.lock().network_idle = idle;
    }

    /// Recorded page-mutating commands in order
    #[must_use]
    pub fn actions(&self) -> Vec<MockAction> {
        self.lock().actions.clone()
    }

    /// Recorded scripts in evaluation order
    #[must_use]
    pub fn evaluations(&self) -> Vec<String> {
        self.lock().evaluations.clone()
    }

    /// Forget recorded commands and scripts
    pub fn clear_history(&self) {
        let mut state = self.lock();
        state.actions.clear();
        state.evaluations.clear();
    }

    /// Current value of the first element matched by a selector
    #[must_use]
    pub fn value_of(&self, selector: impl Into<Selector>) -> Option<String> {
        let (key, index) = key_of(&selector.into());
        self.lock()
            .elements
            .get(&key)
            .and_then(|els| els.get(index))
            .map(|el| el.value.clone())
    }

    /// Installed request block patterns
    #[must_use]
    pub fn blocked_patterns(&self) -> Vec<String> {
        self.lock().blocked.clone()
    }

    /// Installed init scripts
    #[must_use]
    pub fn init_scripts(&self) -> Vec<String> {
        self.lock().init_scripts.clone()
    }

    /// Viewport size, if set
    #[must_use]
    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.lock().viewport
    }

    /// (attached, visible) of the addressed element
    fn observe(&self, selector: &Selector) -> (bool, bool) {
        let (key, index) = key_of(selector);
        let state = self.lock();
        let element = state.elements.get(&key).and_then(|els| {
            els.iter()
                .filter(|el| self.is_attached(el))
                .nth(index)
        });
        element.map_or((false, false), |el| (true, el.visible))
    }

    /// Apply `f` to the addressed attached element
    fn with_element<T>(
        &self,
        selector: &Selector,
        f: impl FnOnce(&mut MockElement) -> T,
    ) -> SemprobeResult<T> {
        let (key, index) = key_of(selector);
        let mut state = self.lock();
        let epoch = self.epoch;
        let element = state
            .elements
            .get_mut(&key)
            .and_then(|els| {
                els.iter_mut()
                    .filter(|el| el.appears_after.map_or(true, |d| epoch.elapsed() >= d))
                    .nth(index)
            })
            .ok_or_else(|| SemprobeError::not_found(selector))?;
        Ok(f(element))
    }

    async fn wait_actionable(
        &self,
        action: &str,
        selector: &Selector,
        options: ActionOptions,
    ) -> SemprobeResult<()> {
        let wanted = if options.force {
            ElementState::Attached
        } else {
            ElementState::Visible
        };
        self.wait_for(selector, wanted, options.timeout)
            .await
            .map_err(|_| SemprobeError::action_failed(action, selector, "not actionable"))?;
        let broken = self.with_element(selector, |el| el.broken)?;
        if broken {
            return Err(SemprobeError::action_failed(
                action,
                selector,
                "element rejected the action",
            ));
        }
        Ok(())
    }

    fn record(&self, action: MockAction) {
        self.lock().actions.push(action);
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str) -> SemprobeResult<()> {
        let mut state = self.lock();
        state.url = url.to_string();
        state.actions.push(MockAction::Navigate(url.to_string()));
        Ok(())
    }

    async fn current_url(&self) -> SemprobeResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> SemprobeResult<()> {
        let idle = self.lock().network_idle;
        if state == LoadState::NetworkIdle && !idle {
            tokio::time::sleep(timeout).await;
            return Err(SemprobeError::Timeout {
                ms: duration_ms(timeout),
            });
        }
        Ok(())
    }

    async fn wait_for(
        &self,
        selector: &Selector,
        state: ElementState,
        timeout: Duration,
    ) -> SemprobeResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let (attached, visible) = self.observe(selector);
            if state.is_satisfied(attached, visible) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SemprobeError::Timeout {
                    ms: duration_ms(timeout),
                });
            }
            tokio::time::sleep(MOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn is_visible(&self, selector: &Selector) -> SemprobeResult<bool> {
        let (attached, visible) = self.observe(selector);
        Ok(attached && visible)
    }

    async fn count(&self, selector: &Selector) -> SemprobeResult<usize> {
        let (key, index) = key_of(selector);
        let state = self.lock();
        let attached = state
            .elements
            .get(&key)
            .map_or(0, |els| els.iter().filter(|el| self.is_attached(el)).count());
        Ok(match selector {
            Selector::Nth { .. } => usize::from(attached > index),
            _ => attached,
        })
    }

    async fn click(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()> {
        self.wait_actionable("click", selector, options).await?;
        let key = selector.to_string();
        let mut state = self.lock();
        state.actions.push(MockAction::Click(key.clone()));
        if let Some(revealed) = state.reveals.remove(&key) {
            for (target, element) in revealed {
                state.elements.entry(target).or_default().push(element);
            }
        }
        Ok(())
    }

    async fn fill(
        &self,
        selector: &Selector,
        value: &str,
        options: ActionOptions,
    ) -> SemprobeResult<()> {
        self.wait_actionable("fill", selector, options).await?;
        self.with_element(selector, |el| el.value = value.to_string())?;
        self.record(MockAction::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn hover(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()> {
        self.wait_actionable("hover", selector, options).await?;
        self.record(MockAction::Hover(selector.to_string()));
        Ok(())
    }

    async fn focus(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()> {
        self.wait_actionable("focus", selector, options).await?;
        self.record(MockAction::Focus(selector.to_string()));
        Ok(())
    }

    async fn clear(&self, selector: &Selector) -> SemprobeResult<()> {
        let broken = self.with_element(selector, |el| {
            if !el.broken {
                el.value.clear();
            }
            el.broken
        })?;
        if broken {
            return Err(SemprobeError::action_failed(
                "clear",
                selector,
                "element rejected the action",
            ));
        }
        self.record(MockAction::Clear(selector.to_string()));
        Ok(())
    }

    async fn select_option(&self, selector: &Selector, label: &str) -> SemprobeResult<()> {
        let selected = self.with_element(selector, |el| {
            if el.tag != "select" || !el.options.iter().any(|o| o == label) {
                return false;
            }
            el.value = label.to_string();
            true
        })?;
        if !selected {
            return Err(SemprobeError::action_failed(
                "select_option",
                selector,
                format!("no option labelled '{label}'"),
            ));
        }
        self.record(MockAction::Select {
            selector: selector.to_string(),
            label: label.to_string(),
        });
        Ok(())
    }

    async fn get_attribute(
        &self,
        selector: &Selector,
        name: &str,
    ) -> SemprobeResult<Option<String>> {
        self.with_element(selector, |el| el.attributes.get(name).cloned())
    }

    async fn text_content(&self, selector: &Selector) -> SemprobeResult<Option<String>> {
        self.with_element(selector, |el| el.text.clone())
    }

    async fn all_text_contents(&self, selector: &Selector) -> SemprobeResult<Vec<String>> {
        let (key, _) = key_of(selector);
        let state = self.lock();
        Ok(state.elements.get(&key).map_or_else(Vec::new, |els| {
            els.iter()
                .filter(|el| self.is_attached(el))
                .map(|el| el.text.clone().unwrap_or_default())
                .collect()
        }))
    }

    async fn tag_name(&self, selector: &Selector) -> SemprobeResult<String> {
        self.with_element(selector, |el| el.tag.clone())
    }

    async fn input_value(&self, selector: &Selector) -> SemprobeResult<String> {
        self.with_element(selector, |el| el.value.clone())
    }

    async fn evaluate(&self, script: &str) -> SemprobeResult<Value> {
        let mut state = self.lock();
        state.evaluations.push(script.to_string());
        Ok(state.eval_results.get(script).cloned().unwrap_or(Value::Null))
    }

    async fn screenshot(&self) -> SemprobeResult<Screenshot> {
        Ok(Screenshot::new(vec![0x89, 0x50, 0x4E, 0x47]))
    }

    async fn block_requests(&self, patterns: &[String]) -> SemprobeResult<()> {
        self.lock().blocked.extend_from_slice(patterns);
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> SemprobeResult<()> {
        self.lock().viewport = Some((width, height));
        Ok(())
    }

    async fn add_init_script(&self, script: &str) -> SemprobeResult<()> {
        self.lock().init_scripts.push(script.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ActionOptions {
        ActionOptions::new(Duration::from_millis(500))
    }

    mod element_tests {
        use super::*;

        #[tokio::test]
        async fn test_fill_updates_value_and_records() {
            let driver = MockDriver::new();
            driver.add_element("#email", MockElement::input());
            driver
                .fill(&Selector::css("#email"), "a@b.co", opts())
                .await
                .unwrap();
            assert_eq!(driver.value_of("#email"), Some("a@b.co".to_string()));
            assert_eq!(
                driver.actions(),
                vec![MockAction::Fill {
                    selector: "css=#email".to_string(),
                    value: "a@b.co".to_string()
                }]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_element_fails_after_timeout() {
            let driver = MockDriver::new();
            let err = driver
                .click(&Selector::css("#nope"), opts())
                .await
                .unwrap_err();
            assert!(matches!(err, SemprobeError::ActionFailed { .. }));
            assert!(driver.actions().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_hidden_element_needs_force() {
            let driver = MockDriver::new();
            driver.add_element("#ghost", MockElement::button("Go").hidden());
            let sel = Selector::css("#ghost");
            assert!(driver.click(&sel, opts()).await.is_err());
            driver.click(&sel, opts().with_force(true)).await.unwrap();
            assert_eq!(driver.actions().len(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_broken_element_rejects() {
            let driver = MockDriver::new();
            driver.add_element("#b", MockElement::input().broken());
            assert!(driver.fill(&Selector::css("#b"), "x", opts()).await.is_err());
            assert!(driver.clear(&Selector::css("#b")).await.is_err());
            assert!(driver.actions().is_empty());
        }

        #[tokio::test]
        async fn test_nth_addresses_later_matches() {
            let driver = MockDriver::new();
            driver.add_element("input", MockElement::input().with_value("a"));
            driver.add_element("input", MockElement::input().with_value("b"));
            let second = Selector::css("input").nth(1);
            assert_eq!(driver.input_value(&second).await.unwrap(), "b");
            assert_eq!(driver.count(&Selector::css("input")).await.unwrap(), 2);
            assert_eq!(driver.count(&second).await.unwrap(), 1);
            assert_eq!(driver.count(&Selector::css("input").nth(5)).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_select_option_requires_label() {
            let driver = MockDriver::new();
            driver.add_element("select", MockElement::select(["Full-time", "Part-time"]));
            let sel = Selector::css("select");
            driver.select_option(&sel, "Part-time").await.unwrap();
            assert_eq!(driver.value_of("select"), Some("Part-time".to_string()));
            assert!(driver.select_option(&sel, "Retired").await.is_err());
        }
    }

    mod timing_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_element_appears_after_delay() {
            let driver = MockDriver::new();
            driver.add_element(
                "#late",
                MockElement::input().appearing_after(Duration::from_millis(300)),
            );
            let sel = Selector::css("#late");
            assert!(!driver.is_visible(&sel).await.unwrap());
            driver
                .wait_for(&sel, ElementState::Visible, Duration::from_secs(1))
                .await
                .unwrap();
            assert!(driver.is_visible(&sel).await.unwrap());
        }

        #[tokio::test(start_paused = true)]
        async fn test_network_never_idle_times_out() {
            let driver = MockDriver::new();
            driver.set_network_idle(false);
            let err = driver
                .wait_for_load_state(LoadState::NetworkIdle, Duration::from_millis(200))
                .await
                .unwrap_err();
            assert!(err.is_timeout());
            driver
                .wait_for_load_state(LoadState::Load, Duration::from_millis(200))
                .await
                .unwrap();
        }
    }

    mod scripting_tests {
        use super::*;

        #[tokio::test]
        async fn test_click_reveals_once() {
            let driver = MockDriver::new();
            driver.add_element("#open", MockElement::button("Open"));
            driver.reveal_on_click("#open", "#menu", MockElement::text_node("Menu"));
            let open = Selector::css("#open");
            driver.click(&open, opts()).await.unwrap();
            driver.click(&open, opts()).await.unwrap();
            assert_eq!(driver.count(&Selector::css("#menu")).await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_eval_results() {
            let driver = MockDriver::new();
            driver.set_eval_result("1 + 1", Value::from(2));
            assert_eq!(driver.evaluate("1 + 1").await.unwrap(), Value::from(2));
            assert_eq!(driver.evaluate("unknown()").await.unwrap(), Value::Null);
            assert_eq!(driver.evaluations(), vec!["1 + 1", "unknown()"]);
        }

        #[tokio::test]
        async fn test_setup_commands_are_stored() {
            let driver = MockDriver::new().with_url("https://app.example/apply");
            driver.set_viewport(800, 600).await.unwrap();
            driver
                .block_requests(&["*chat.example*".to_string()])
                .await
                .unwrap();
            driver.add_init_script("window.x = 1;").await.unwrap();
            assert_eq!(driver.viewport(), Some((800, 600)));
            assert_eq!(driver.blocked_patterns(), vec!["*chat.example*"]);
            assert_eq!(driver.init_scripts().len(), 1);
            assert_eq!(
                driver.current_url().await.unwrap(),
                "https://app.example/apply"
            );
        }
    }
}
