//! Wait primitives shared by the driver, readiness detection and the registry.
//!
//! Every suspension point in Semprobe is one of: an element-state wait, a
//! readiness wait, or a fixed settle/pacing delay. The first two are built on
//! [`poll_until`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Page load states (Playwright parity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// Wait for the `load` event to fire
    #[default]
    Load,
    /// Wait for `DOMContentLoaded` event
    DomContentLoaded,
    /// Wait for network to be idle (no requests for 500ms)
    NetworkIdle,
}

impl LoadState {
    /// Get the JavaScript event name for this load state
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

/// Element states an element wait can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementState {
    /// Present in the DOM
    Attached,
    /// Absent from the DOM
    Detached,
    /// Present and rendered with a non-empty box
    #[default]
    Visible,
    /// Absent or not rendered
    Hidden,
}

impl ElementState {
    /// Whether an element with the given attachment/visibility satisfies this state
    #[must_use]
    pub const fn is_satisfied(self, attached: bool, visible: bool) -> bool {
        match self {
            Self::Attached => attached,
            Self::Detached => !attached,
            Self::Visible => attached && visible,
            Self::Hidden => !attached || !visible,
        }
    }
}

impl std::fmt::Display for ElementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Attached => "attached",
            Self::Detached => "detached",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        };
        f.write_str(name)
    }
}

/// Result of a wait operation
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Whether the wait was successful
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

impl WaitResult {
    /// Create a successful wait result
    #[must_use]
    pub fn success(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed,
            waited_for: waited_for.into(),
        }
    }

    /// Create a timeout wait result
    #[must_use]
    pub fn timeout(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed,
            waited_for: waited_for.into(),
        }
    }
}

/// Milliseconds in a duration, saturating at `u64::MAX`
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Poll an async condition until it holds or the timeout elapses.
///
/// The condition is always evaluated at least once, even with a zero timeout.
pub async fn poll_until<F, Fut>(
    description: impl Into<String>,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> WaitResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let deadline = start + timeout;
    loop {
        if check().await {
            return WaitResult::success(start.elapsed(), description);
        }
        let now = Instant::now();
        if now >= deadline {
            return WaitResult::timeout(start.elapsed(), description);
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
