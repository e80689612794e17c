//! diagramshot
//!
//! Renders Mermaid diagram text to PNG images inside a headless Chrome
//! instance and serves the result over HTTP.
//!
//! # Features
//!
//! - **CDP Backend**: Drives Chrome through the DevTools Protocol
//! - **Provisioning Strategies**: Local Chrome or a serverless Chromium bundle,
//!   picked once at startup
//! - **One Browser Per Request**: No pooling, torn down on every exit path
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use diagramshot::provision::LocalChrome;
//! use diagramshot::render::{DiagramRenderer, MermaidRenderer, RenderSettings};
//! use diagramshot::RenderRequest;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let renderer = MermaidRenderer::new(Arc::new(LocalChrome::default()), RenderSettings::default());
//! let image = renderer.render(RenderRequest::new("graph TD; A-->B;")).await?;
//! println!("{}x{} -> {} bytes", image.viewport.width, image.viewport.height, image.png.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod cdp;
pub mod config;
pub mod provision;
pub mod render;
pub mod request;
pub mod scaffold;
pub mod server;
pub mod session;

pub use request::RenderRequest;

/// Geometry used when the rendered SVG cannot be measured
pub const FALLBACK_GEOMETRY: Geometry = Geometry {
    width: 800,
    height: 400,
};

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Natural size of a rendered diagram, as measured in the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    /// Build a geometry from raw page measurements.
    ///
    /// Non-finite or non-positive sizes fall back to [`FALLBACK_GEOMETRY`].
    pub fn from_measured(width: f64, height: f64) -> Self {
        let usable = |v: f64| v.is_finite() && v >= 1.0;
        if usable(width) && usable(height) {
            Self {
                width: width.ceil().min(u32::MAX as f64) as u32,
                height: height.ceil().min(u32::MAX as f64) as u32,
            }
        } else {
            FALLBACK_GEOMETRY
        }
    }

    /// The capture surface: this geometry plus `padding` on every side.
    pub fn padded(&self, padding: u32) -> Viewport {
        Viewport {
            width: self.width.saturating_add(padding.saturating_mul(2)),
            height: self.height.saturating_add(padding.saturating_mul(2)),
        }
    }
}
