//! The render pipeline: one browser session per request, from scaffold to PNG

use crate::cdp::SessionSetup;
use crate::provision::BrowserProvisioner;
use crate::scaffold::{self, RenderJob, CONTAINER_SELECTOR, DEFAULT_MERMAID_URL};
use crate::session::BrowserSession;
use crate::{Error, Geometry, RenderRequest, Result, Viewport};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-wide render settings
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Script URL of the Mermaid bundle
    pub mermaid_url: String,
    /// Viewport every session starts with
    pub initial_viewport: Viewport,
    /// Default timeout for page operations
    pub page_timeout: Duration,
    /// Ceiling for one whole render
    pub request_timeout: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mermaid_url: DEFAULT_MERMAID_URL.to_string(),
            initial_viewport: Viewport::default(),
            page_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// A finished capture
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// PNG bytes
    pub png: Vec<u8>,
    /// Natural size of the diagram
    pub geometry: Geometry,
    /// Capture surface in CSS pixels (geometry plus padding)
    pub viewport: Viewport,
    /// Device scale factor of the capture
    pub scale: f64,
}

/// Anything that can turn a validated request into an image.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> Result<RenderedImage>;
}

/// Renders Mermaid diagrams in a fresh headless browser per call
pub struct MermaidRenderer {
    provisioner: Arc<dyn BrowserProvisioner>,
    settings: RenderSettings,
}

impl MermaidRenderer {
    pub fn new(provisioner: Arc<dyn BrowserProvisioner>, settings: RenderSettings) -> Self {
        Self {
            provisioner,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    async fn render_once(&self, request: &RenderRequest) -> Result<RenderedImage> {
        let setup = SessionSetup {
            window: self.settings.initial_viewport,
            scale: request.scale,
            page_timeout: self.settings.page_timeout,
        };
        let session = BrowserSession::launch(self.provisioner.clone(), setup).await?;

        let outcome = self.drive(&session, request).await;

        // Close on every path; a failed close must not hide the real outcome.
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
        outcome
    }

    async fn drive(&self, session: &BrowserSession, request: &RenderRequest) -> Result<RenderedImage> {
        session
            .load_html(&scaffold::scaffold_html(&request.background, request.padding))
            .await?;
        session.add_script(&self.settings.mermaid_url).await?;

        let job = RenderJob::new(&request.code, &request.theme, &request.font_family);
        let geometry = session.render(job).await?;
        let viewport = geometry.padded(request.padding);
        debug!(
            "measured {}x{}, capturing {}x{} @{}x",
            geometry.width, geometry.height, viewport.width, viewport.height, request.scale
        );

        session.resize(viewport).await?;
        if request.is_transparent() {
            session.transparent_background().await?;
        }
        let png = session.capture(CONTAINER_SELECTOR).await?;

        Ok(RenderedImage {
            png,
            geometry,
            viewport,
            scale: request.scale,
        })
    }
}

#[async_trait]
impl DiagramRenderer for MermaidRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderedImage> {
        let started = Instant::now();
        let limit = self.settings.request_timeout;

        let image = tokio::time::timeout(limit, self.render_once(&request))
            .await
            .map_err(|_| Error::Timeout(limit.as_millis() as u64))??;

        info!(
            "rendered {}x{} diagram ({} bytes) via {} browser in {:?}",
            image.viewport.width,
            image.viewport.height,
            image.png.len(),
            self.provisioner.name(),
            started.elapsed()
        );
        Ok(image)
    }
}
