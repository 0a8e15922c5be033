//! Per-page preparation before a scenario runs.
//!
//! Sizes the viewport, blocks analytics and ad traffic, installs the test
//! marker and challenge stub, opens the base URL, then waits for the
//! framework loader to appear.

use crate::config::SemprobeConfig;
use crate::driver::PageDriver;
use crate::result::{SemprobeError, SemprobeResult};
use crate::wait::{duration_ms, poll_until, LoadState};
use tracing::{debug, info, warn};

/// Global set by the init script so the page can detect an automated run
pub const TEST_MARKER_GLOBAL: &str = "SEMPROBE_TEST";

/// Prepares a fresh page for a scenario
#[derive(Debug, Clone, Copy, Default)]
pub struct PageSetup;

impl PageSetup {
    /// Script run before any page script on every navigation
    #[must_use]
    pub fn init_script(config: &SemprobeConfig) -> String {
        let mut script = format!("window.{TEST_MARKER_GLOBAL} = true;");
        if let Some(token) = &config.challenge.stub_token {
            script.push('\n');
            script.push_str(&config.challenge.stub_script(token));
        }
        script
    }

    /// Apply every setup step, then wait for the framework loader.
    ///
    /// A network that never goes idle is logged, not fatal; a loader that
    /// never appears fails with [`SemprobeError::Timeout`].
    pub async fn apply(driver: &dyn PageDriver, config: &SemprobeConfig) -> SemprobeResult<()> {
        driver
            .set_viewport(config.viewport.width, config.viewport.height)
            .await?;

        let patterns = config.blocked_patterns();
        if !patterns.is_empty() {
            driver.block_requests(&patterns).await?;
            debug!(count = patterns.len(), "blocking third-party requests");
        }

        driver.add_init_script(&Self::init_script(config)).await?;

        info!(url = %config.base_url, "opening base url");
        driver.navigate(&config.base_url).await?;

        let timeout = config.timing.navigation_timeout();
        if let Err(e) = driver
            .wait_for_load_state(LoadState::NetworkIdle, timeout)
            .await
        {
            warn!(error = %e, "network did not go idle");
        }

        let loader = config.readiness.loader_script.as_str();
        let result = poll_until(
            "framework loader",
            config.readiness.engine_timeout(),
            config.readiness.poll_interval(),
            move || async move {
                driver
                    .evaluate(loader)
                    .await
                    .is_ok_and(|v| v.as_bool() == Some(true))
            },
        )
        .await;
        if !result.success {
            return Err(SemprobeError::Timeout {
                ms: duration_ms(config.readiness.engine_timeout()),
            });
        }
        info!(elapsed_ms = duration_ms(result.elapsed), "page setup complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAction, MockDriver};
    use serde_json::json;
    use std::time::Duration;

    fn loaded_driver(config: &SemprobeConfig) -> MockDriver {
        let driver = MockDriver::new();
        driver.set_eval_result(config.readiness.loader_script.clone(), json!(true));
        driver
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_runs_every_step() {
        let config = SemprobeConfig::default();
        let driver = loaded_driver(&config);
        PageSetup::apply(&driver, &config).await.unwrap();

        assert_eq!(driver.viewport(), Some((1920, 1080)));
        assert_eq!(driver.blocked_patterns().len(), config.blocked_hosts.len());
        assert!(driver
            .blocked_patterns()
            .contains(&"*google-analytics.com*".to_string()));
        assert_eq!(
            driver.actions(),
            vec![MockAction::Navigate(config.base_url.clone())]
        );
        let scripts = driver.init_scripts();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("SEMPROBE_TEST"));
        assert!(scripts[0].contains("test-recaptcha-token"));
    }

    #[test]
    fn test_init_script_without_stub() {
        let mut config = SemprobeConfig::default();
        config.challenge.stub_token = None;
        assert_eq!(PageSetup::init_script(&config), "window.SEMPROBE_TEST = true;");
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_network_is_not_fatal() {
        let config = SemprobeConfig::default();
        let driver = loaded_driver(&config);
        driver.set_network_idle(false);
        PageSetup::apply(&driver, &config).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_loader_times_out() {
        let config = SemprobeConfig::default();
        let driver = MockDriver::new();
        let start = tokio::time::Instant::now();
        let err = PageSetup::apply(&driver, &config).await.unwrap_err();
        assert!(matches!(err, SemprobeError::Timeout { ms: 30_000 }));
        assert!(start.elapsed() >= Duration::from_millis(30_000));
    }
}
