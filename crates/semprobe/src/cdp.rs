//! Real Chromium pages over the DevTools protocol.
//!
//! [`CdpSession`] owns the browser process and its event handler task;
//! [`CdpDriver`] implements [`PageDriver`] for one page. Element operations
//! resolve the [`Selector`] in the page with the query it compiles to, so
//! every selector kind behaves the same here as in the scripted driver.

use crate::config::SemprobeConfig;
use crate::driver::{ActionOptions, PageDriver, Screenshot};
use crate::locator::{js_str, Selector};
use crate::result::{SemprobeError, SemprobeResult};
use crate::wait::{duration_ms, ElementState, LoadState, DEFAULT_POLL_INTERVAL_MS};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, SetBlockedUrLsParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Quiet period after which the network counts as idle
pub const NETWORK_QUIET_MS: u64 = 500;

const VISIBLE_JS: &str = "(() => { const r = el.getBoundingClientRect(); \
     const s = getComputedStyle(el); \
     return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; })()";

/// Browser process plus its protocol handler
#[derive(Debug)]
pub struct CdpSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl CdpSession {
    /// Launch Chromium configured from the run configuration
    pub async fn launch(config: &SemprobeConfig) -> SemprobeResult<Self> {
        let mut builder =
            BrowserConfig::builder().window_size(config.viewport.width, config.viewport.height);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.arg(format!("--user-agent={agent}"));
        }
        let browser_config = builder
            .build()
            .map_err(|message| SemprobeError::BrowserLaunchError { message })?;

        let (browser, mut events) = Browser::launch(browser_config).await.map_err(|e| {
            SemprobeError::BrowserLaunchError {
                message: e.to_string(),
            }
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!(headless = config.headless, "browser launched");
        Ok(Self { browser, handler })
    }

    /// Open a blank page
    pub async fn new_driver(&self) -> SemprobeResult<CdpDriver> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| SemprobeError::BrowserLaunchError {
                message: e.to_string(),
            })?;
        Ok(CdpDriver::new(page))
    }

    /// Close the browser and stop the handler task
    pub async fn close(mut self) -> SemprobeResult<()> {
        let closed = self.browser.close().await;
        self.handler.abort();
        closed.map_err(|e| SemprobeError::BrowserLaunchError {
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ElementReply {
    found: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Wrap `body` so it runs against the first match bound to `el`
fn element_script(selector: &Selector, body: &str) -> String {
    format!(
        "(async () => {{ const el = {query}; \
         if (!el) {{ return {{ found: false }}; }} \
         try {{ const value = await (async () => {{ {body} }})(); \
         return {{ found: true, value: value === undefined ? null : value }}; }} \
         catch (e) {{ return {{ found: true, error: String(e) }}; }} }})()",
        query = selector.to_query()
    )
}

/// [`PageDriver`] over one Chromium page
#[derive(Debug, Clone)]
pub struct CdpDriver {
    page: Page,
    poll_interval: Duration,
}

impl CdpDriver {
    /// Wrap a page
    #[must_use]
    pub fn new(page: Page) -> Self {
        Self {
            page,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Underlying protocol page
    #[must_use]
    pub const fn page(&self) -> &Page {
        &self.page
    }

    async fn eval(&self, script: &str) -> SemprobeResult<Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|message| SemprobeError::EvaluationError { message })?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| SemprobeError::EvaluationError {
                message: e.to_string(),
            })?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn on_element(
        &self,
        action: &str,
        selector: &Selector,
        body: &str,
    ) -> SemprobeResult<Value> {
        let raw = self.eval(&element_script(selector, body)).await?;
        let reply: ElementReply = serde_json::from_value(raw)?;
        if !reply.found {
            return Err(SemprobeError::not_found(selector));
        }
        if let Some(error) = reply.error {
            return Err(SemprobeError::action_failed(action, selector, error));
        }
        Ok(reply.value)
    }

    /// (attached, visible) of the first match
    async fn observe(&self, selector: &Selector) -> SemprobeResult<(bool, bool)> {
        match self.on_element("observe", selector, &format!("return {VISIBLE_JS};")).await {
            Ok(visible) => Ok((true, visible.as_bool() == Some(true))),
            Err(SemprobeError::ElementNotFound { .. }) => Ok((false, false)),
            Err(e) => Err(e),
        }
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
            .map_err(|_| SemprobeError::action_failed(action, selector, "not actionable"))
    }

    /// Centre of the first match after scrolling it into view
    async fn centre_of(&self, action: &str, selector: &Selector) -> SemprobeResult<Point> {
        let value = self
            .on_element(
                action,
                selector,
                "el.scrollIntoView({ block: 'center', inline: 'center' }); \
                 const r = el.getBoundingClientRect(); \
                 return [r.left + r.width / 2, r.top + r.height / 2];",
            )
            .await?;
        match value.as_array().map(Vec::as_slice) {
            Some([x, y]) => Ok(Point::new(
                x.as_f64().unwrap_or_default(),
                y.as_f64().unwrap_or_default(),
            )),
            _ => Err(SemprobeError::action_failed(action, selector, "no bounding box")),
        }
    }

    async fn poll_script(&self, script: &str, timeout: Duration) -> SemprobeResult<()> {
        let start = Instant::now();
        loop {
            if self.eval(script).await?.as_bool() == Some(true) {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(SemprobeError::Timeout {
                    ms: duration_ms(timeout),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> SemprobeResult<()> {
        let quiet = Duration::from_millis(NETWORK_QUIET_MS);
        let start = Instant::now();
        let mut last_count = None;
        let mut quiet_since = Instant::now();
        loop {
            let state = self
                .eval(
                    "({ complete: document.readyState === 'complete', \
                     resources: performance.getEntriesByType('resource').length })",
                )
                .await?;
            let complete = state["complete"].as_bool() == Some(true);
            let count = state["resources"].as_u64();
            if count != last_count || !complete {
                last_count = count;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= quiet {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(SemprobeError::Timeout {
                    ms: duration_ms(timeout),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> SemprobeResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| SemprobeError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> SemprobeResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| SemprobeError::EvaluationError {
                message: e.to_string(),
            })?;
        Ok(url.unwrap_or_default())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> SemprobeResult<()> {
        match state {
            LoadState::Load => {
                self.poll_script("document.readyState === 'complete'", timeout)
                    .await
            }
            LoadState::DomContentLoaded => {
                self.poll_script("document.readyState !== 'loading'", timeout)
                    .await
            }
            LoadState::NetworkIdle => self.wait_for_network_idle(timeout).await,
        }
    }

    async fn wait_for(
        &self,
        selector: &Selector,
        state: ElementState,
        timeout: Duration,
    ) -> SemprobeResult<()> {
        let start = Instant::now();
        loop {
            let (attached, visible) = self.observe(selector).await?;
            if state.is_satisfied(attached, visible) {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(SemprobeError::Timeout {
                    ms: duration_ms(timeout),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn is_visible(&self, selector: &Selector) -> SemprobeResult<bool> {
        Ok(self.observe(selector).await?.1)
    }

    async fn count(&self, selector: &Selector) -> SemprobeResult<usize> {
        let value = self.eval(&selector.to_count_query()).await?;
        Ok(value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_default())
    }

    async fn click(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()> {
        self.wait_actionable("click", selector, options).await?;
        let point = self.centre_of("click", selector).await?;
        self.page
            .click(point)
            .await
            .map_err(|e| SemprobeError::action_failed("click", selector, e.to_string()))?;
        Ok(())
    }

    async fn fill(
        &self,
        selector: &Selector,
        value: &str,
        options: ActionOptions,
    ) -> SemprobeResult<()> {
        self.wait_actionable("fill", selector, options).await?;
        let _ = self
            .on_element(
                "fill",
                selector,
                "el.focus(); \
                 if (typeof el.select === 'function') { el.select(); } \
                 else { document.execCommand('selectAll'); }",
            )
            .await?;
        self.page
            .execute(InsertTextParams::new(value))
            .await
            .map_err(|e| SemprobeError::action_failed("fill", selector, e.to_string()))?;
        Ok(())
    }

    async fn hover(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()> {
        self.wait_actionable("hover", selector, options).await?;
        let point = self.centre_of("hover", selector).await?;
        self.page
            .move_mouse(point)
            .await
            .map_err(|e| SemprobeError::action_failed("hover", selector, e.to_string()))?;
        Ok(())
    }

    async fn focus(&self, selector: &Selector, options: ActionOptions) -> SemprobeResult<()> {
        self.wait_actionable("focus", selector, options).await?;
        let _ = self.on_element("focus", selector, "el.focus();").await?;
        Ok(())
    }

    async fn clear(&self, selector: &Selector) -> SemprobeResult<()> {
        let _ = self
            .on_element(
                "clear",
                selector,
                "if (!('value' in el)) { throw new Error('not an input'); } \
                 el.value = ''; \
                 el.dispatchEvent(new Event('input', { bubbles: true })); \
                 el.dispatchEvent(new Event('change', { bubbles: true }));",
            )
            .await?;
        Ok(())
    }

    async fn select_option(&self, selector: &Selector, label: &str) -> SemprobeResult<()> {
        let body = format!(
            "if (el.tagName.toLowerCase() !== 'select') {{ throw new Error('not a select'); }} \
             const option = Array.from(el.options).find(o => o.label === {label} || o.text.trim() === {label}); \
             if (!option) {{ throw new Error('no such option'); }} \
             el.value = option.value; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));",
            label = js_str(label)
        );
        let _ = self.on_element("select", selector, &body).await?;
        Ok(())
    }

    async fn get_attribute(
        &self,
        selector: &Selector,
        name: &str,
    ) -> SemprobeResult<Option<String>> {
        let body = format!("return el.getAttribute({});", js_str(name));
        let value = self.on_element("get_attribute", selector, &body).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn text_content(&self, selector: &Selector) -> SemprobeResult<Option<String>> {
        let value = self
            .on_element("text_content", selector, "return el.textContent;")
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn all_text_contents(&self, selector: &Selector) -> SemprobeResult<Vec<String>> {
        let script = format!(
            "({}).map(el => el.textContent || '')",
            selector.to_all_query()
        );
        let value = self.eval(&script).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn tag_name(&self, selector: &Selector) -> SemprobeResult<String> {
        let value = self
            .on_element("tag_name", selector, "return el.tagName.toLowerCase();")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn input_value(&self, selector: &Selector) -> SemprobeResult<String> {
        let value = self
            .on_element(
                "input_value",
                selector,
                "if (!('value' in el)) { throw new Error('not an input'); } return el.value;",
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn evaluate(&self, script: &str) -> SemprobeResult<Value> {
        self.eval(script).await
    }

    async fn screenshot(&self) -> SemprobeResult<Screenshot> {
        use base64::Engine;

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self
            .page
            .execute(params)
            .await
            .map_err(|e| SemprobeError::ScreenshotError {
                message: e.to_string(),
            })?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| SemprobeError::ScreenshotError {
                message: e.to_string(),
            })?;
        Ok(Screenshot::new(data))
    }

    async fn block_requests(&self, patterns: &[String]) -> SemprobeResult<()> {
        let fail = |e: chromiumoxide::error::CdpError| SemprobeError::EvaluationError {
            message: format!("request blocking failed: {e}"),
        };
        let _ = self
            .page
            .execute(NetworkEnableParams::default())
            .await
            .map_err(fail)?;
        let _ = self
            .page
            .execute(SetBlockedUrLsParams::new(patterns.to_vec()))
            .await
            .map_err(fail)?;
        debug!(count = patterns.len(), "request blocking enabled");
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> SemprobeResult<()> {
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        let _ = self
            .page
            .execute(params)
            .await
            .map_err(|e| SemprobeError::EvaluationError {
                message: format!("viewport override failed: {e}"),
            })?;
        Ok(())
    }

    async fn add_init_script(&self, script: &str) -> SemprobeResult<()> {
        let _ = self
            .page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
            .await
            .map_err(|e| {
                warn!(error = %e, "init script rejected");
                SemprobeError::EvaluationError {
                    message: e.to_string(),
                }
            })?;
        Ok(())
    }
}
