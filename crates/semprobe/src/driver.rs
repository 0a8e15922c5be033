//! PageDriver - Abstract Browser Automation Trait
//!
//! The browser-automation driver is an external collaborator. Everything in
//! Semprobe reaches the page through this trait, so the interaction engine can
//! run against a real Chromium page ([`crate::cdp::CdpDriver`], feature
//! `browser`) or a scripted in-memory page ([`crate::mock::MockDriver`]).
//!
//! Element operations always target the first match of a [`Selector`]; use
//! [`Selector::nth`] to address other matches.

use crate::locator::Selector;
use crate::result::SemprobeResult;
use crate::wait::{ElementState, LoadState};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Options applied to a single element action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOptions {
    /// Upper bound for the action including its own actionability wait
    pub timeout: Duration,
    /// Skip the visibility requirement
    pub force: bool,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            force: false,
        }
    }
}

impl ActionOptions {
    /// Create options with a timeout
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            force: false,
        }
    }

    /// Set the force flag
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Screenshot data with metadata
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Timestamp when screenshot was taken
    pub timestamp: std::time::SystemTime,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: std::time::SystemTime::now(),
        }
    }

    /// Get the size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if screenshot is valid (has data)
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }

    /// Write the PNG to disk, creating parent directories
    pub async fn save(&self, path: &Path) -> SemprobeResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &self.data).await?;
        Ok(())
    }
}

/// Abstract driver trait for browser automation.
///
/// Implementations must be shareable (`Arc<dyn PageDriver>`); state changes
/// go through interior mutability. Callers never run two commands against
/// the same page concurrently.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to URL
    async fn navigate(&self, url: &str) -> SemprobeResult<()>;

    /// Get current URL
    async fn current_url(&self) -> SemprobeResult<String>;

    /// Wait until the page reaches a load state
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> SemprobeResult<()>;

    /// Wait until the first match reaches an element state
    async fn wait_for(
        &self,
        selector: &Selector,
        state: ElementState,
        timeout: Duration,
    ) -> SemprobeResult<()>;

    /// Whether the first match is currently visible (no waiting)
    async fn is_visible(&self, selector: &Selector) -> SemprobeResult<bool>;

    /// Number of attached matches
    async fn count(&self, selector: &Selector) -> SemprobeResult<usize>;

    /// Click element
    async fn click(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()>;

    /// Replace the element's value
    async fn fill(
        &self,
        selector: &Selector,
        value: &str,
        options: ActionOptions,
    ) -> SemprobeResult<()>;

    /// Hover element
    async fn hover(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()>;

    /// Focus element
    async fn focus(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()>;

    /// Clear the element's value
    async fn clear(&self, selector: &Selector) -> SemprobeResult<()>;

    /// Select a native `<select>` option by its label
    async fn select_option(&self, selector: &Selector, label: &str) -> SemprobeResult<()>;

    /// Read an attribute of the first match
    async fn get_attribute(&self, selector: &Selector, name: &str)
        -> SemprobeResult<Option<String>>;

    /// Text content of the first match
    async fn text_content(&self, selector: &Selector) -> SemprobeResult<Option<String>>;

    /// Text content of every match
    async fn all_text_contents(&self, selector: &Selector) -> SemprobeResult<Vec<String>>;

    /// Lower-case tag name of the first match
    async fn tag_name(&self, selector: &Selector) -> SemprobeResult<String>;

    /// Current value of an input, textarea or select
    async fn input_value(&self, selector: &Selector) -> SemprobeResult<String>;

    /// Execute JavaScript in page context
    async fn evaluate(&self, script: &str) -> SemprobeResult<serde_json::Value>;

    /// Take screenshot
    async fn screenshot(&self) -> SemprobeResult<Screenshot>;

    /// Abort requests whose URL matches any wildcard pattern
    async fn block_requests(&self, patterns: &[String]) -> SemprobeResult<()>;

    /// Resize the viewport
    async fn set_viewport(&self, width: u32, height: u32) -> SemprobeResult<()>;

    /// Register a script evaluated before any page script on every navigation
    async fn add_init_script(&self, script: &str) -> SemprobeResult<()>;
}
