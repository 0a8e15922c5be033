//! Component capability trait and the shared context components are built from.
//!
//! Components are composed, not inherited: a page component holds a
//! [`FormComponent`](crate::form::FormComponent), which holds a
//! [`ComponentContext`] carrying the driver, resolver, readiness detector and
//! configuration for one page.

use crate::config::{SemprobeConfig, TimingConfig};
use crate::driver::PageDriver;
use crate::readiness::SemanticsReadinessDetector;
use crate::resolver::ElementResolver;
use crate::result::{SemprobeError, SemprobeResult};
use crate::wait::{duration_ms, poll_until};
use async_trait::async_trait;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Poll interval of the default [`Component::wait_for_ready`]
pub const DEFAULT_READY_POLL_MS: u64 = 500;

/// Capabilities every registered component provides.
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl Component for Banner {
///     fn name(&self) -> &str {
///         "Banner"
///     }
///
///     async fn is_ready(&self) -> bool {
///         self.ctx.resolver().is_visible(&Selector::css(".banner"), Duration::ZERO).await
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Name used in logs and screenshot file names
    fn name(&self) -> &str;

    /// Whether the component can be interacted with now
    async fn is_ready(&self) -> bool;

    /// Poll [`Self::is_ready`] until it holds or `timeout` elapses
    async fn wait_for_ready(&self, timeout: Duration) -> SemprobeResult<()> {
        let result = poll_until(
            format!("{} ready", self.name()),
            timeout,
            Duration::from_millis(DEFAULT_READY_POLL_MS),
            || async move { self.is_ready().await },
        )
        .await;
        if result.success {
            Ok(())
        } else {
            Err(SemprobeError::Timeout {
                ms: duration_ms(timeout),
            })
        }
    }

    /// One-time setup hook
    async fn initialize(&self) -> SemprobeResult<()> {
        Ok(())
    }

    /// Downcast support for typed registry lookups
    fn as_any(&self) -> &dyn Any;
}

/// Everything a component needs to talk to one page
#[derive(Clone)]
pub struct ComponentContext {
    driver: Arc<dyn PageDriver>,
    resolver: Arc<ElementResolver>,
    readiness: Arc<SemanticsReadinessDetector>,
    config: Arc<SemprobeConfig>,
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("readiness", &self.readiness.state())
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl ComponentContext {
    /// Build the resolver and readiness detector for a driver
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, config: SemprobeConfig) -> Self {
        let resolver = Arc::new(ElementResolver::new(driver.clone(), config.timing.clone()));
        let readiness = Arc::new(SemanticsReadinessDetector::new(
            driver.clone(),
            config.readiness.clone(),
        ));
        Self {
            driver,
            resolver,
            readiness,
            config: Arc::new(config),
        }
    }

    /// Page driver
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    /// Candidate resolver
    #[must_use]
    pub fn resolver(&self) -> &ElementResolver {
        &self.resolver
    }

    /// Readiness detector shared by every component on the page
    #[must_use]
    pub fn readiness(&self) -> &SemanticsReadinessDetector {
        &self.readiness
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &SemprobeConfig {
        &self.config
    }

    /// Delays and timeouts
    #[must_use]
    pub fn timing(&self) -> &TimingConfig {
        &self.config.timing
    }

    /// Best-effort screenshot into the configured directory
    pub async fn screenshot(&self, component: &str, name: &str) -> Option<PathBuf> {
        self.resolver
            .take_screenshot(&self.config.screenshot_dir, component, name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        checks: AtomicUsize,
        ready_after: usize,
    }

    #[async_trait]
    impl Component for Flaky {
        fn name(&self) -> &str {
            "Flaky"
        }

        async fn is_ready(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) >= self.ready_after
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_wait_for_ready_polls() {
        let flaky = Flaky {
            checks: AtomicUsize::new(0),
            ready_after: 2,
        };
        flaky.wait_for_ready(Duration::from_secs(5)).await.unwrap();
        assert_eq!(flaky.checks.load(Ordering::SeqCst), 3);
        flaky.initialize().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_wait_for_ready_times_out() {
        let flaky = Flaky {
            checks: AtomicUsize::new(0),
            ready_after: usize::MAX,
        };
        let err = flaky
            .wait_for_ready(Duration::from_millis(1200))
            .await
            .unwrap_err();
        assert!(matches!(err, SemprobeError::Timeout { ms: 1200 }));
    }

    #[test]
    fn test_context_shares_config() {
        let config = SemprobeConfig::default().with_target_host("staging.example");
        let ctx = ComponentContext::new(Arc::new(MockDriver::new()), config);
        let clone = ctx.clone();
        assert_eq!(clone.config().target_host, "staging.example");
        assert_eq!(ctx.timing().probe_timeout_ms, 3000);
        assert!(format!("{ctx:?}").contains("staging.example"));
    }
}
