//! Run configuration loaded from YAML.
//!
//! Every delay and timeout the interaction layer uses lives in
//! [`TimingConfig`] so suites can tune them per environment. All sections
//! default, so an empty document is a valid configuration.
//!
//! ```yaml
//! base_url: https://staging.example/apply
//! target_host: staging.example
//! headless: false
//! timing:
//!   probe_timeout_ms: 1500
//! readiness:
//!   settle_delay_ms: 1000
//! ```

use crate::locator::js_str;
use crate::readiness::ReadinessConfig;
use crate::result::{SemprobeError, SemprobeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Delays and timeouts, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Per-candidate visibility probe
    pub probe_timeout_ms: u64,
    /// Upper bound for a single element action
    pub action_timeout_ms: u64,
    /// Text read probe
    pub text_timeout_ms: u64,
    /// Pause after each successful field fill
    pub fill_pacing_ms: u64,
    /// Dropdown visibility probe
    pub dropdown_timeout_ms: u64,
    /// Pause after opening a custom dropdown
    pub popup_delay_ms: u64,
    /// Option visibility probe
    pub option_timeout_ms: u64,
    /// Network idle wait after submission
    pub stable_timeout_ms: u64,
    /// Settle pause after network idle
    pub stable_settle_ms: u64,
    /// Wait for loading indicators to clear before reading validation
    pub validation_timeout_ms: u64,
    /// Settle pause for validation messages
    pub validation_settle_ms: u64,
    /// Visibility probe for per-field validation errors
    pub validation_error_timeout_ms: u64,
    /// Success indicator wait
    pub success_timeout_ms: u64,
    /// Success indicator poll interval
    pub success_poll_ms: u64,
    /// Challenge widget presence wait
    pub challenge_timeout_ms: u64,
    /// Chat widget visibility probe
    pub chat_timeout_ms: u64,
    /// Registry readiness poll interval
    pub registry_poll_ms: u64,
    /// Registry readiness wait
    pub registry_wait_ms: u64,
    /// Navigation and initial network idle wait
    pub navigation_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 3000,
            action_timeout_ms: 10_000,
            text_timeout_ms: 5000,
            fill_pacing_ms: 200,
            dropdown_timeout_ms: 5000,
            popup_delay_ms: 500,
            option_timeout_ms: 3000,
            stable_timeout_ms: 5000,
            stable_settle_ms: 1000,
            validation_timeout_ms: 5000,
            validation_settle_ms: 500,
            validation_error_timeout_ms: 1000,
            success_timeout_ms: 5000,
            success_poll_ms: 250,
            challenge_timeout_ms: 5000,
            chat_timeout_ms: 2000,
            registry_poll_ms: 500,
            registry_wait_ms: 10_000,
            navigation_timeout_ms: 45_000,
        }
    }
}

impl TimingConfig {
    /// Per-candidate visibility probe
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Upper bound for a single element action
    #[must_use]
    pub const fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    /// Text read probe
    #[must_use]
    pub const fn text_timeout(&self) -> Duration {
        Duration::from_millis(self.text_timeout_ms)
    }

    /// Pause after each successful field fill
    #[must_use]
    pub const fn fill_pacing(&self) -> Duration {
        Duration::from_millis(self.fill_pacing_ms)
    }

    /// Dropdown visibility probe
    #[must_use]
    pub const fn dropdown_timeout(&self) -> Duration {
        Duration::from_millis(self.dropdown_timeout_ms)
    }

    /// Pause after opening a custom dropdown
    #[must_use]
    pub const fn popup_delay(&self) -> Duration {
        Duration::from_millis(self.popup_delay_ms)
    }

    /// Option visibility probe
    #[must_use]
    pub const fn option_timeout(&self) -> Duration {
        Duration::from_millis(self.option_timeout_ms)
    }

    /// Network idle wait after submission
    #[must_use]
    pub const fn stable_timeout(&self) -> Duration {
        Duration::from_millis(self.stable_timeout_ms)
    }

    /// Settle pause after network idle
    #[must_use]
    pub const fn stable_settle(&self) -> Duration {
        Duration::from_millis(self.stable_settle_ms)
    }

    /// Network idle wait for validation
    #[must_use]
    pub const fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    /// Settle pause for validation messages
    #[must_use]
    pub const fn validation_settle(&self) -> Duration {
        Duration::from_millis(self.validation_settle_ms)
    }

    /// Visibility probe for per-field validation errors
    #[must_use]
    pub const fn validation_error_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_error_timeout_ms)
    }

    /// Success indicator wait
    #[must_use]
    pub const fn success_timeout(&self) -> Duration {
        Duration::from_millis(self.success_timeout_ms)
    }

    /// Success indicator poll interval
    #[must_use]
    pub const fn success_poll(&self) -> Duration {
        Duration::from_millis(self.success_poll_ms)
    }

    /// Challenge widget presence wait
    #[must_use]
    pub const fn challenge_timeout(&self) -> Duration {
        Duration::from_millis(self.challenge_timeout_ms)
    }

    /// Chat widget visibility probe
    #[must_use]
    pub const fn chat_timeout(&self) -> Duration {
        Duration::from_millis(self.chat_timeout_ms)
    }

    /// Registry readiness poll interval
    #[must_use]
    pub const fn registry_poll(&self) -> Duration {
        Duration::from_millis(self.registry_poll_ms)
    }

    /// Registry readiness wait
    #[must_use]
    pub const fn registry_wait(&self) -> Duration {
        Duration::from_millis(self.registry_wait_ms)
    }

    /// Navigation and initial network idle wait
    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// Anti-bot challenge widget integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// CSS selector of the widget container
    pub container_selector: String,
    /// Global object exposing `execute(siteKey, { action })`
    pub global: String,
    /// Site key passed to `execute`
    pub site_key: String,
    /// Action name passed to `execute`
    pub action: String,
    /// Page-level callback receiving the token
    pub callback: String,
    /// Token returned by the test stub installed at page setup; `None` installs no stub
    pub stub_token: Option<String>,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            container_selector: ".g-recaptcha".to_string(),
            global: "grecaptcha".to_string(),
            site_key: "test-site-key".to_string(),
            action: "submit".to_string(),
            callback: "handleRecaptchaResponse".to_string(),
            stub_token: Some("test-recaptcha-token".to_string()),
        }
    }
}

impl ChallengeConfig {
    /// Script resolving to the challenge token, or `null` when the global is absent
    #[must_use]
    pub fn execute_script(&self) -> String {
        format!(
            "(async () => {{ const w = window[{global}]; \
             if (w && typeof w.execute === 'function') {{ \
             return await w.execute({key}, {{ action: {action} }}); }} \
             return null; }})()",
            global = js_str(&self.global),
            key = js_str(&self.site_key),
            action = js_str(&self.action),
        )
    }

    /// Script handing a token to the page callback; resolves to whether it was delivered
    #[must_use]
    pub fn callback_script(&self, token: &str) -> String {
        format!(
            "(() => {{ const cb = window[{callback}]; \
             if (typeof cb === 'function') {{ cb({token}); return true; }} \
             return false; }})()",
            callback = js_str(&self.callback),
            token = js_str(token),
        )
    }

    /// Script installing a stub global that resolves to `token`
    #[must_use]
    pub fn stub_script(&self, token: &str) -> String {
        format!(
            "window[{global}] = {{ \
             execute: () => Promise.resolve({token}), \
             render: () => 'test-widget-id', \
             ready: (cb) => cb() }};",
            global = js_str(&self.global),
            token = js_str(token),
        )
    }
}

/// Top-level run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemprobeConfig {
    /// Application form entry URL
    pub base_url: String,
    /// Host that identifies "already on the application"
    pub target_host: String,
    /// Run the browser without a window
    pub headless: bool,
    /// Override the browser user agent
    pub user_agent: Option<String>,
    /// Chromium executable; autodetected when unset
    pub chrome_path: Option<PathBuf>,
    /// Viewport size
    pub viewport: ViewportConfig,
    /// Hosts whose requests are aborted at page setup
    pub blocked_hosts: Vec<String>,
    /// Directory for failure screenshots
    pub screenshot_dir: PathBuf,
    /// Delays and timeouts
    pub timing: TimingConfig,
    /// Semantics overlay readiness
    pub readiness: ReadinessConfig,
    /// Anti-bot challenge widget
    pub challenge: ChallengeConfig,
}

impl Default for SemprobeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://myaccount.withuloans.com/login".to_string(),
            target_host: "myaccount.withuloans.com".to_string(),
            headless: true,
            user_agent: None,
            chrome_path: None,
            viewport: ViewportConfig::default(),
            blocked_hosts: [
                "google-analytics.com",
                "googletagmanager.com",
                "facebook.com",
                "twitter.com",
                "linkedin.com",
                "doubleclick.net",
                "google.com/ads",
                "googlesyndication.com",
                "amazon-adsystem.com",
                "adsystem.amazon.com",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            timing: TimingConfig::default(),
            readiness: ReadinessConfig::default(),
            challenge: ChallengeConfig::default(),
        }
    }
}

impl SemprobeConfig {
    /// Parse from a YAML document
    pub fn from_yaml_str(yaml: &str) -> SemprobeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_file(path: &Path) -> SemprobeResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> SemprobeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject configurations the interaction layer cannot run with
    pub fn validate(&self) -> SemprobeResult<()> {
        if self.base_url.is_empty() {
            return Err(SemprobeError::config("base_url must not be empty"));
        }
        if self.target_host.is_empty() {
            return Err(SemprobeError::config("target_host must not be empty"));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(SemprobeError::config("viewport dimensions must be non-zero"));
        }
        let readiness = &self.readiness;
        let markers = [
            ("readiness.marker_selector", &readiness.marker_selector),
            ("readiness.view_selector", &readiness.view_selector),
            ("readiness.engine_flag_script", &readiness.engine_flag_script),
            ("readiness.loader_script", &readiness.loader_script),
        ];
        if let Some((name, _)) = markers.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SemprobeError::config(format!("{name} must not be empty")));
        }
        if let Some((name, _)) = self.bounded_waits().iter().find(|(_, ms)| *ms == 0) {
            return Err(SemprobeError::config(format!("{name} must be non-zero")));
        }
        Ok(())
    }

    /// Every timeout and poll interval, by its YAML path
    fn bounded_waits(&self) -> [(&'static str, u64); 18] {
        let t = &self.timing;
        let r = &self.readiness;
        [
            ("timing.probe_timeout_ms", t.probe_timeout_ms),
            ("timing.action_timeout_ms", t.action_timeout_ms),
            ("timing.text_timeout_ms", t.text_timeout_ms),
            ("timing.dropdown_timeout_ms", t.dropdown_timeout_ms),
            ("timing.option_timeout_ms", t.option_timeout_ms),
            ("timing.stable_timeout_ms", t.stable_timeout_ms),
            ("timing.validation_timeout_ms", t.validation_timeout_ms),
            ("timing.validation_error_timeout_ms", t.validation_error_timeout_ms),
            ("timing.success_timeout_ms", t.success_timeout_ms),
            ("timing.success_poll_ms", t.success_poll_ms),
            ("timing.challenge_timeout_ms", t.challenge_timeout_ms),
            ("timing.chat_timeout_ms", t.chat_timeout_ms),
            ("timing.registry_poll_ms", t.registry_poll_ms),
            ("timing.registry_wait_ms", t.registry_wait_ms),
            ("timing.navigation_timeout_ms", t.navigation_timeout_ms),
            ("readiness.poll_interval_ms", r.poll_interval_ms),
            ("readiness.default_timeout_ms", r.default_timeout_ms),
            ("readiness.engine_timeout_ms", r.engine_timeout_ms),
        ]
    }

    /// Set the entry URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Point the run at another deployment: sets the entry URL and takes the
    /// target host from its authority. A URL without a host leaves the target
    /// host as it was.
    #[must_use]
    pub fn with_entry_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        if let Some(host) = url_host(&self.base_url) {
            self.target_host = host.to_string();
        }
        self
    }

    /// Set the target host
    #[must_use]
    pub fn with_target_host(mut self, host: impl Into<String>) -> Self {
        self.target_host = host.into();
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Replace the timing section
    #[must_use]
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Replace the readiness section
    #[must_use]
    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    /// Set the screenshot directory
    #[must_use]
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    /// Block an additional host
    #[must_use]
    pub fn with_blocked_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.push(host.into());
        self
    }

    /// URL wildcard patterns for the blocked hosts
    #[must_use]
    pub fn blocked_patterns(&self) -> Vec<String> {
        self.blocked_hosts
            .iter()
            .map(|host| format!("*{host}*"))
            .collect()
    }
}

/// Host part of an absolute URL, without userinfo or port
fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = if host_port.starts_with('[') {
        host_port.split_inclusive(']').next().unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or_default()
    };
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_empty_document_is_default() {
            let config = SemprobeConfig::from_yaml_str("{}").unwrap();
            assert_eq!(config, SemprobeConfig::default());
        }

        #[test]
        fn test_partial_override() {
            let yaml = "base_url: https://staging.example/apply\n\
                        target_host: staging.example\n\
                        timing:\n  probe_timeout_ms: 1500\n\
                        readiness:\n  settle_delay_ms: 250\n";
            let config = SemprobeConfig::from_yaml_str(yaml).unwrap();
            assert_eq!(config.target_host, "staging.example");
            assert_eq!(config.timing.probe_timeout(), Duration::from_millis(1500));
            assert_eq!(config.timing.action_timeout_ms, 10_000);
            assert_eq!(config.readiness.settle_delay_ms, 250);
        }

        #[test]
        fn test_yaml_roundtrip_through_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("semprobe.yaml");
            let config = SemprobeConfig::default().with_headless(false);
            std::fs::write(&path, config.to_yaml().unwrap()).unwrap();
            assert_eq!(SemprobeConfig::from_file(&path).unwrap(), config);
        }

        #[test]
        fn test_partial_viewport() {
            let config = SemprobeConfig::from_yaml_str("viewport:\n  width: 1280\n").unwrap();
            assert_eq!(config.viewport.width, 1280);
            assert_eq!(config.viewport.height, 1080);
        }

        #[test]
        fn test_malformed_yaml_is_error() {
            let err = SemprobeConfig::from_yaml_str("timing: [1, 2").unwrap_err();
            assert!(matches!(err, SemprobeError::Yaml(_)));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_rejects_empty_base_url() {
            let err = SemprobeConfig::default()
                .with_base_url("")
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("base_url"));
        }

        #[test]
        fn test_rejects_zero_poll() {
            let mut config = SemprobeConfig::default();
            config.timing.registry_poll_ms = 0;
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_rejects_zero_timeouts() {
            let mut config = SemprobeConfig::default();
            config.timing.action_timeout_ms = 0;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("timing.action_timeout_ms"));

            let mut config = SemprobeConfig::default();
            config.timing.success_timeout_ms = 0;
            assert!(config.validate().is_err());

            let mut config = SemprobeConfig::default();
            config.readiness.default_timeout_ms = 0;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("readiness.default_timeout_ms"));
        }

        #[test]
        fn test_zero_delays_are_allowed() {
            let mut config = SemprobeConfig::default();
            config.timing.fill_pacing_ms = 0;
            config.timing.popup_delay_ms = 0;
            config.readiness.settle_delay_ms = 0;
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_rejects_blank_marker() {
            let mut config = SemprobeConfig::default();
            config.readiness.marker_selector = "  ".to_string();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("readiness.marker_selector"));

            let yaml = "readiness:\n  marker_selector: ''\n";
            assert!(matches!(
                SemprobeConfig::from_yaml_str(yaml),
                Err(SemprobeError::Config { .. })
            ));
        }

        #[test]
        fn test_entry_url_sets_target_host() {
            let config = SemprobeConfig::default()
                .with_entry_url("https://staging.example.com:8443/apply?x=1");
            assert_eq!(config.base_url, "https://staging.example.com:8443/apply?x=1");
            assert_eq!(config.target_host, "staging.example.com");

            let config = SemprobeConfig::default().with_entry_url("http://user@[::1]:8080/");
            assert_eq!(config.target_host, "[::1]");
        }

        #[test]
        fn test_entry_url_without_host_keeps_target() {
            let config = SemprobeConfig::default().with_entry_url("about:blank");
            assert_eq!(config.target_host, "myaccount.withuloans.com");
        }

        #[test]
        fn test_blocked_patterns() {
            let config = SemprobeConfig::default().with_blocked_host("chat.example");
            assert!(config
                .blocked_patterns()
                .contains(&"*chat.example*".to_string()));
        }
    }

    mod challenge_tests {
        use super::*;

        #[test]
        fn test_scripts_embed_quoted_values() {
            let challenge = ChallengeConfig::default();
            let exec = challenge.execute_script();
            assert!(exec.contains("window[\"grecaptcha\"]"));
            assert!(exec.contains("\"test-site-key\""));
            let cb = challenge.callback_script("tok\"en");
            assert!(cb.contains("\"tok\\\"en\""));
            assert!(challenge.stub_script("t").contains("Promise.resolve(\"t\")"));
        }
    }
}
