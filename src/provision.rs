//! Browser provisioning strategies
//!
//! A provisioner knows where the browser binary lives and how it must be
//! started. The strategy is picked once at startup from [`ServiceConfig`] and
//! shared by every request.

use crate::config::ServiceConfig;
use crate::{Error, Result, Viewport};
use headless_chrome::LaunchOptions;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Flags for sandboxed, single-process hosts (function runtimes and the like).
pub const SERVERLESS_ARGS: &[&str] = &[
    "--allow-pre-commit-input",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--force-color-profile=srgb",
    "--font-render-hinting=none",
    "--hide-scrollbars",
    "--in-process-gpu",
    "--mute-audio",
    "--no-first-run",
    "--no-zygote",
    "--single-process",
    "--use-angle=swiftshader",
    "--use-gl=angle",
];

/// Default locations searched for a serverless Chromium binary
pub const DEFAULT_CHROMIUM_CANDIDATES: &[&str] = &["/tmp/chromium", "/opt/chromium/chromium"];

/// Which provisioning strategy the process runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionMode {
    Local,
    Serverless,
}

/// Produces launch options for one browser process.
pub trait BrowserProvisioner: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Launch options for a browser whose window matches `window`.
    ///
    /// `call_timeout` bounds every protocol call, script evaluation included.
    fn launch_options(&self, window: Viewport, call_timeout: Duration) -> Result<LaunchOptions<'static>>;
}

/// A full Chrome installation on the host (auto-detected unless `path` is set)
#[derive(Debug, Clone, Default)]
pub struct LocalChrome {
    pub path: Option<PathBuf>,
}

impl BrowserProvisioner for LocalChrome {
    fn name(&self) -> &'static str {
        "local"
    }

    fn launch_options(&self, window: Viewport, call_timeout: Duration) -> Result<LaunchOptions<'static>> {
        LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((window.width, window.height)))
            .path(self.path.clone())
            .idle_browser_timeout(call_timeout)
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))
    }
}

/// A minimal Chromium bundle resolved at launch time, run without a sandbox
#[derive(Debug, Clone)]
pub struct ServerlessChromium {
    pub candidates: Vec<PathBuf>,
}

impl Default for ServerlessChromium {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CHROMIUM_CANDIDATES.iter().map(PathBuf::from).collect(),
        }
    }
}

impl ServerlessChromium {
    /// First candidate that exists on disk.
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        self.candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| {
                Error::Launch(format!(
                    "No Chromium binary found (searched {:?})",
                    self.candidates
                ))
            })
    }
}

impl BrowserProvisioner for ServerlessChromium {
    fn name(&self) -> &'static str {
        "serverless"
    }

    fn launch_options(&self, window: Viewport, call_timeout: Duration) -> Result<LaunchOptions<'static>> {
        let binary = self.resolve_binary()?;
        let args: Vec<&'static OsStr> = SERVERLESS_ARGS.iter().map(OsStr::new).collect();

        LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(Some(binary))
            .args(args)
            .window_size(Some((window.width, window.height)))
            .idle_browser_timeout(call_timeout)
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))
    }
}

/// Build the provisioner selected by `config`.
pub fn provisioner_for(config: &ServiceConfig) -> Arc<dyn BrowserProvisioner> {
    match config.provision_mode() {
        ProvisionMode::Local => Arc::new(LocalChrome {
            path: config.chrome_path.clone(),
        }),
        ProvisionMode::Serverless => Arc::new(ServerlessChromium {
            candidates: config.chromium_candidates(),
        }),
    }
}
