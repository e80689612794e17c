//! Chrome DevTools Protocol driver for a single render page

use crate::provision::BrowserProvisioner;
use crate::scaffold::{self, PageReply, RenderJob};
use crate::{Error, Geometry, Result, Viewport};
use headless_chrome::browser::tab::{NoElementFound, Tab};
use headless_chrome::protocol::cdp::types::Method;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::Browser;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Parameters fixed for the lifetime of one browser session
#[derive(Debug, Clone, Copy)]
pub struct SessionSetup {
    /// Initial window and layout viewport
    pub window: Viewport,
    /// Device scale factor applied to every viewport of the session
    pub scale: f64,
    /// Default timeout for navigation, element lookups and evaluation
    pub page_timeout: Duration,
}

/// One headless browser with one tab, driven synchronously.
///
/// Dropping a `CdpPage` drops the `Browser`, which kills the child process,
/// so a half-initialized page never outlives the call that created it.
pub struct CdpPage {
    browser: Browser,
    tab: Arc<Tab>,
    scale: f64,
}

impl CdpPage {
    /// Launch a browser through `provisioner` and prepare a tab for rendering.
    pub fn launch(provisioner: &dyn BrowserProvisioner, setup: &SessionSetup) -> Result<Self> {
        let launch_options = provisioner.launch_options(setup.window, setup.page_timeout)?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Launch(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(setup.page_timeout);

        let page = Self {
            browser,
            tab,
            scale: setup.scale,
        };
        page.set_viewport(setup.window)?;

        debug!(
            "{} browser ready ({}x{} @{}x)",
            provisioner.name(),
            setup.window.width,
            setup.window.height,
            setup.scale
        );
        Ok(page)
    }

    /// Resize the layout viewport, keeping the session's device scale factor.
    pub fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.call_json::<Emulation::SetDeviceMetricsOverride>(serde_json::json!({
            "width": viewport.width,
            "height": viewport.height,
            "deviceScaleFactor": self.scale,
            "mobile": false,
        }))
        .map_err(|e| Error::RenderError(format!("Failed to set viewport: {}", e)))?;
        Ok(())
    }

    /// Replace the page with `html`.
    pub fn load_html(&self, html: &str) -> Result<()> {
        self.tab
            .navigate_to(&scaffold::data_url(html))
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        Ok(())
    }

    /// Append a `<script src>` and wait for it to load.
    pub fn add_script(&self, url: &str) -> Result<()> {
        let reply = self.evaluate_reply(&scaffold::inject_script(url)?)?;
        if !reply.ok {
            return Err(Error::LoadError(
                reply.error.unwrap_or_else(|| format!("failed to load {}", url)),
            ));
        }
        Ok(())
    }

    /// Run the render-and-measure function for `job`.
    pub fn render(&self, job: &RenderJob) -> Result<Geometry> {
        self.evaluate_reply(&job.to_script()?)?.into_geometry()
    }

    /// Make the default page background fully transparent.
    pub fn set_transparent_background(&self) -> Result<()> {
        self.call_json::<Emulation::SetDefaultBackgroundColorOverride>(serde_json::json!({
            "color": { "r": 0, "g": 0, "b": 0, "a": 0.0 }
        }))
        .map_err(|e| Error::RenderError(format!("Failed to clear background: {}", e)))?;
        Ok(())
    }

    /// PNG screenshot clipped to the border box of the element at `selector`.
    pub fn capture_element(&self, selector: &str) -> Result<Vec<u8>> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|e| lookup_error(selector, e))?;

        let clip = element
            .get_box_model()
            .map_err(|e| Error::RenderError(format!("Failed to measure {}: {}", selector, e)))?
            .border_viewport();

        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
    }

    /// Close the browser and clean up the child process.
    pub fn close(self) -> Result<()> {
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }

    fn evaluate_reply(&self, script: &str) -> Result<PageReply> {
        let result = self
            .tab
            .evaluate(script, true)
            .map_err(|e| Error::ScriptError(format!("Evaluation failed: {}", e)))?;

        let value = result
            .value
            .ok_or_else(|| Error::ScriptError("No value returned from evaluation".into()))?;

        match value.as_str() {
            Some(raw) => PageReply::parse(raw),
            None => Err(Error::ScriptError(format!("Expected a JSON string, got {}", value))),
        }
    }

    // Protocol structs are built from JSON so only the fields we set need naming.
    fn call_json<C>(&self, params: serde_json::Value) -> Result<C::ReturnObject>
    where
        C: Method + Serialize + DeserializeOwned + std::fmt::Debug,
    {
        let method: C = serde_json::from_value(params)
            .map_err(|e| Error::CdpError(format!("Invalid protocol parameters: {}", e)))?;
        Ok(self.tab.call_method(method)?)
    }
}

// Only an absent element means the container is missing; anything else is a
// broken session.
fn lookup_error(selector: &str, err: anyhow::Error) -> Error {
    if err.downcast_ref::<NoElementFound>().is_some() {
        Error::MissingContainer
    } else {
        Error::RenderError(format!("Failed to look up {}: {}", selector, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::LocalChrome;
    use headless_chrome::LaunchOptions;
    use std::sync::Mutex;

    /// Records the timeout it is handed and refuses to launch.
    #[derive(Default)]
    struct RecordingProvisioner {
        seen: Mutex<Option<Duration>>,
    }

    impl BrowserProvisioner for RecordingProvisioner {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn launch_options(&self, _window: Viewport, call_timeout: Duration) -> Result<LaunchOptions<'static>> {
            *self.seen.lock().unwrap() = Some(call_timeout);
            Err(Error::Launch("not launching".into()))
        }
    }

    #[test]
    fn page_timeout_bounds_protocol_calls() {
        let provisioner = RecordingProvisioner::default();
        let setup = SessionSetup {
            window: Viewport::default(),
            scale: 2.0,
            page_timeout: Duration::from_millis(1500),
        };
        assert!(matches!(CdpPage::launch(&provisioner, &setup), Err(Error::Launch(_))));
        assert_eq!(*provisioner.seen.lock().unwrap(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn absent_element_is_missing_container() {
        let err = lookup_error("#wrap", NoElementFound {}.into());
        assert!(matches!(err, Error::MissingContainer));
        assert_eq!(err.to_string(), "Failed to render SVG container");
    }

    #[test]
    fn broken_transport_is_not_missing_container() {
        let closed = anyhow::anyhow!("Unable to make method calls because underlying connection is closed");
        let err = lookup_error("#wrap", closed);
        match err {
            Error::RenderError(msg) => {
                assert!(msg.starts_with("Failed to look up #wrap:"));
                assert!(msg.contains("connection is closed"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_cdp_page_launch() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let setup = SessionSetup {
            window: Viewport::default(),
            scale: 1.0,
            page_timeout: Duration::from_secs(30),
        };
        let result = CdpPage::launch(&LocalChrome::default(), &setup);
        match result {
            Ok(page) => page.close().unwrap(),
            Err(e) => eprintln!(
                "Skipping CDP launch test because Chrome is not available or failed to launch: {}",
                e
            ),
        }
    }

    #[test]
    fn protocol_params_deserialize() {
        let m: Emulation::SetDeviceMetricsOverride = serde_json::from_value(serde_json::json!({
            "width": 152,
            "height": 206,
            "deviceScaleFactor": 2.0,
            "mobile": false,
        }))
        .unwrap();
        assert_eq!(m.width, 152);
        assert_eq!(m.height, 206);
        assert_eq!(m.device_scale_factor, 2.0);
    }
}
