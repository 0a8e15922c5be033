//! Semantics overlay readiness detection.
//!
//! The rendering engine paints to a canvas and mirrors the widget tree into a
//! semantics overlay asynchronously. Interacting before the overlay exists
//! silently fails, so every page gates its interactions on
//! [`SemanticsReadinessDetector::wait_for_semantics`].
//!
//! ```text
//! NotInitialized --(engine flag | marker attached)--> Initializing
//! Initializing --(marker has children, then settle delay)--> Ready
//! ```
//!
//! The state only moves forward within one page load;
//! [`SemanticsReadinessDetector::begin_page_load`] resets it after navigation.

use crate::driver::PageDriver;
use crate::locator::{attr_equals, Selector, SEMANTICS_ROLE_ATTR};
use crate::result::{SemprobeError, SemprobeResult};
use crate::wait::{duration_ms, poll_until, ElementState};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Readiness of the semantics overlay for the current page load
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReadinessState {
    /// Nothing observed yet
    #[default]
    NotInitialized,
    /// Engine or overlay marker present, overlay not populated
    Initializing,
    /// Overlay populated and settled
    Ready,
}

impl std::fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotInitialized => "not-initialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Markers, scripts and timings used to detect readiness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Overlay root element
    pub marker_selector: String,
    /// Canvas host element
    pub view_selector: String,
    /// Script resolving to `true` once the engine initializer exists
    pub engine_flag_script: String,
    /// Script resolving truthy once the framework loader is on the page
    pub loader_script: String,
    /// Pause after the overlay is populated
    pub settle_delay_ms: u64,
    /// Observation interval
    pub poll_interval_ms: u64,
    /// Default overlay wait
    pub default_timeout_ms: u64,
    /// Default engine wait
    pub engine_timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            marker_selector: "flt-semantics-host".to_string(),
            view_selector: "flutter-view".to_string(),
            engine_flag_script:
                "window._flutter?.loader?.didCreateEngineInitializer === true".to_string(),
            loader_script: "!!(window._flutter && window._flutter.loader)".to_string(),
            settle_delay_ms: 3000,
            poll_interval_ms: 100,
            default_timeout_ms: 15_000,
            engine_timeout_ms: 30_000,
        }
    }
}

impl ReadinessConfig {
    /// Pause after the overlay is populated
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Observation interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Default overlay wait
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Default engine wait
    #[must_use]
    pub const fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    /// Overlay root
    #[must_use]
    pub fn marker(&self) -> Selector {
        Selector::css(self.marker_selector.clone())
    }

    /// Direct children of the overlay root
    #[must_use]
    pub fn marker_children(&self) -> Selector {
        Selector::css(format!("{} > *", self.marker_selector))
    }

    /// Canvas host
    #[must_use]
    pub fn view(&self) -> Selector {
        Selector::css(self.view_selector.clone())
    }

    /// Text-field semantics nodes
    #[must_use]
    pub fn text_fields(&self) -> Selector {
        Selector::css(attr_equals(SEMANTICS_ROLE_ATTR, "text-field"))
    }
}

/// One structural observation of the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    /// Engine initializer flag set
    pub engine: bool,
    /// Overlay root attached
    pub marker: bool,
    /// Children under the overlay root
    pub children: usize,
}

impl Observation {
    /// Overlay attached and populated
    #[must_use]
    pub const fn is_populated(&self) -> bool {
        self.marker && self.children > 0
    }
}

/// Tracks overlay readiness for one page
pub struct SemanticsReadinessDetector {
    driver: Arc<dyn PageDriver>,
    config: ReadinessConfig,
    state: Mutex<ReadinessState>,
}

impl std::fmt::Debug for SemanticsReadinessDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticsReadinessDetector")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SemanticsReadinessDetector {
    /// Create a detector in the `NotInitialized` state
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, config: ReadinessConfig) -> Self {
        Self {
            driver,
            config,
            state: Mutex::new(ReadinessState::NotInitialized),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ReadinessState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Reset for a fresh navigation
    pub fn begin_page_load(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) =
            ReadinessState::NotInitialized;
        debug!("semantics readiness reset for new page load");
    }

    fn advance(&self, to: ReadinessState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if to > *state {
            debug!(from = %*state, to = %to, "semantics readiness advanced");
            *state = to;
        }
    }

    /// Whether the engine initializer flag is set. Script failures read as `false`.
    pub async fn engine_initialized(&self) -> bool {
        self.driver
            .evaluate(&self.config.engine_flag_script)
            .await
            .map(|v| v.as_bool() == Some(true))
            .unwrap_or(false)
    }

    /// Observe the page once, advancing to `Initializing` when warranted
    pub async fn observe(&self) -> Observation {
        let engine = self.engine_initialized().await;
        let marker = self
            .driver
            .count(&self.config.marker())
            .await
            .map(|n| n > 0)
            .unwrap_or(false);
        let children = if marker {
            self.driver
                .count(&self.config.marker_children())
                .await
                .unwrap_or(0)
        } else {
            0
        };
        if engine || marker {
            self.advance(ReadinessState::Initializing);
        }
        Observation {
            engine,
            marker,
            children,
        }
    }

    /// Wait until the overlay is populated and settled.
    ///
    /// Returns immediately once `Ready` for the current page load.
    pub async fn wait_for_semantics(&self, timeout: Duration) -> SemprobeResult<()> {
        if self.state() == ReadinessState::Ready {
            return Ok(());
        }
        let result = poll_until(
            "semantics overlay populated",
            timeout,
            self.config.poll_interval(),
            || async move { self.observe().await.is_populated() },
        )
        .await;
        if !result.success {
            warn!(
                timeout_ms = duration_ms(timeout),
                state = %self.state(),
                "semantics overlay never populated"
            );
            return Err(SemprobeError::Timeout {
                ms: duration_ms(timeout),
            });
        }
        tokio::time::sleep(self.config.settle_delay()).await;
        self.advance(ReadinessState::Ready);
        info!(elapsed_ms = duration_ms(result.elapsed), "semantics overlay ready");
        Ok(())
    }

    /// [`Self::wait_for_semantics`] with the configured default timeout
    pub async fn wait_for_semantics_default(&self) -> SemprobeResult<()> {
        self.wait_for_semantics(self.config.default_timeout()).await
    }

    /// Wait for the engine initializer flag, then for the overlay root to attach
    pub async fn wait_for_engine(&self, timeout: Duration) -> SemprobeResult<()> {
        let result = poll_until(
            "engine initializer",
            timeout,
            self.config.poll_interval(),
            || async move { self.engine_initialized().await },
        )
        .await;
        if !result.success {
            return Err(SemprobeError::Timeout {
                ms: duration_ms(timeout),
            });
        }
        self.advance(ReadinessState::Initializing);
        let remaining = timeout.saturating_sub(result.elapsed);
        self.driver
            .wait_for(&self.config.marker(), ElementState::Attached, remaining)
            .await
    }

    /// Settle, then wait for a visible text-field semantics node
    pub async fn wait_for_semantic_elements(&self, timeout: Duration) -> SemprobeResult<()> {
        tokio::time::sleep(self.config.settle_delay()).await;
        self.driver
            .wait_for(&self.config.text_fields(), ElementState::Visible, timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};

    fn fixture() -> (Arc<MockDriver>, SemanticsReadinessDetector) {
        let driver = Arc::new(MockDriver::new());
        let detector = SemanticsReadinessDetector::new(driver.clone(), ReadinessConfig::default());
        (driver, detector)
    }

    mod state_tests {
        use super::*;

        #[test]
        fn test_states_are_ordered() {
            assert!(ReadinessState::NotInitialized < ReadinessState::Initializing);
            assert!(ReadinessState::Initializing < ReadinessState::Ready);
            assert_eq!(ReadinessState::Ready.to_string(), "ready");
        }

        #[test]
        fn test_advance_never_regresses() {
            let (_, detector) = fixture();
            detector.advance(ReadinessState::Ready);
            detector.advance(ReadinessState::Initializing);
            assert_eq!(detector.state(), ReadinessState::Ready);
            detector.begin_page_load();
            assert_eq!(detector.state(), ReadinessState::NotInitialized);
        }
    }

    mod wait_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_times_out_without_marker() {
            let (_, detector) = fixture();
            let start = tokio::time::Instant::now();
            let err = detector
                .wait_for_semantics(Duration::from_millis(5000))
                .await
                .unwrap_err();
            assert!(matches!(err, SemprobeError::Timeout { ms: 5000 }));
            assert!(start.elapsed() >= Duration::from_millis(5000));
            assert!(start.elapsed() < Duration::from_millis(5200));
            assert_eq!(detector.state(), ReadinessState::NotInitialized);
        }

        #[tokio::test(start_paused = true)]
        async fn test_empty_marker_is_only_initializing() {
            let (driver, detector) = fixture();
            driver.add_element("flt-semantics-host", MockElement::new("flt-semantics-host"));
            assert!(detector
                .wait_for_semantics(Duration::from_millis(1000))
                .await
                .is_err());
            assert_eq!(detector.state(), ReadinessState::Initializing);
        }

        #[tokio::test(start_paused = true)]
        async fn test_ready_after_children_and_settle() {
            let (driver, detector) = fixture();
            driver.add_element("flt-semantics-host", MockElement::new("flt-semantics-host"));
            driver.add_element(
                "flt-semantics-host > *",
                MockElement::new("flt-semantics").appearing_after(Duration::from_millis(800)),
            );
            let start = tokio::time::Instant::now();
            detector
                .wait_for_semantics(Duration::from_millis(5000))
                .await
                .unwrap();
            assert_eq!(detector.state(), ReadinessState::Ready);
            assert!(start.elapsed() >= Duration::from_millis(3800));

            let again = tokio::time::Instant::now();
            detector
                .wait_for_semantics(Duration::from_millis(5000))
                .await
                .unwrap();
            assert_eq!(again.elapsed(), Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_engine_flag_moves_to_initializing() {
            let (driver, detector) = fixture();
            driver.set_eval_result(
                ReadinessConfig::default().engine_flag_script,
                serde_json::Value::Bool(true),
            );
            driver.add_element("flt-semantics-host", MockElement::new("flt-semantics-host"));
            detector
                .wait_for_engine(Duration::from_millis(1000))
                .await
                .unwrap();
            assert_eq!(detector.state(), ReadinessState::Initializing);
        }

        #[tokio::test(start_paused = true)]
        async fn test_semantic_elements_wait_for_text_field() {
            let (driver, detector) = fixture();
            driver.add_element(
                Selector::css("[data-semantics-role=\"text-field\"]"),
                MockElement::input(),
            );
            detector
                .wait_for_semantic_elements(Duration::from_millis(100))
                .await
                .unwrap();
        }
    }
}
