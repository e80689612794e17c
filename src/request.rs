//! Request validation for the render endpoint
//!
//! Turns a raw HTTP body into a [`RenderRequest`] with every optional field
//! resolved. Nothing in this module touches the browser, so a rejected request
//! never costs a browser launch.

use crate::{Error, Result};
use serde::Deserialize;

pub const DEFAULT_THEME: &str = "default";
pub const DEFAULT_BACKGROUND: &str = "transparent";
pub const OPAQUE_BACKGROUND: &str = "#ffffff";
pub const DEFAULT_SCALE: f64 = 2.0;
pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 4.0;
pub const DEFAULT_PADDING: u32 = 16;
pub const MAX_PADDING: u32 = 256;
pub const DEFAULT_FONT_FAMILY: &str = "Inter, Arial, sans-serif";

const MISSING_CODE: &str = "Missing \"code\" (Mermaid DSL string)";

/// A validated render request with defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Mermaid diagram text
    pub code: String,
    /// Mermaid theme preset name
    pub theme: String,
    /// `"transparent"` or a CSS color
    pub background: String,
    /// Device pixel ratio used for the capture
    pub scale: f64,
    /// Padding around the diagram in CSS pixels, at most [`MAX_PADDING`]
    pub padding: u32,
    /// Font family handed to Mermaid and applied to the SVG
    pub font_family: String,
}

/// Wire shape of the JSON body. Field names follow the browser client.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderPayload {
    #[serde(default, alias = "diagram")]
    code: Option<serde_json::Value>,
    theme: Option<String>,
    background: Option<String>,
    scale: Option<serde_json::Value>,
    padding: Option<u32>,
    #[serde(alias = "font_family")]
    font_family: Option<String>,
    transparent: Option<bool>,
}

impl RenderRequest {
    /// Build a request with defaults for everything but the diagram text.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            theme: DEFAULT_THEME.to_string(),
            background: DEFAULT_BACKGROUND.to_string(),
            scale: DEFAULT_SCALE,
            padding: DEFAULT_PADDING,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }

    /// Validate an HTTP request body.
    ///
    /// `content_type` is the raw `Content-Type` header value, if any.
    pub fn from_http(content_type: Option<&str>, body: &[u8]) -> Result<Self> {
        let is_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(Error::Validation("Content-Type must be application/json".into()));
        }

        let payload: Option<RenderPayload> = serde_json::from_slice(body)
            .map_err(|e| Error::Validation(format!("Invalid JSON body: {}", e)))?;

        Self::from_payload(payload.unwrap_or_default())
    }

    fn from_payload(payload: RenderPayload) -> Result<Self> {
        let code = match payload.code {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s,
            _ => return Err(Error::Validation(MISSING_CODE.into())),
        };

        let theme = payload.theme.unwrap_or_else(|| DEFAULT_THEME.to_string());
        if theme.is_empty()
            || !theme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Validation(format!("Invalid theme: {:?}", theme)));
        }

        // `transparent: false` only picks a color when none was given.
        let background = match (payload.transparent, payload.background) {
            (Some(true), _) => DEFAULT_BACKGROUND.to_string(),
            (_, Some(bg)) => bg,
            (Some(false), None) => OPAQUE_BACKGROUND.to_string(),
            (None, None) => DEFAULT_BACKGROUND.to_string(),
        };
        ensure_css_safe("background", &background)?;

        let font_family = payload
            .font_family
            .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());
        ensure_css_safe("fontFamily", &font_family)?;

        Ok(Self {
            code,
            theme,
            background,
            scale: normalize_scale(payload.scale.as_ref().map(scale_number)),
            padding: payload.padding.unwrap_or(DEFAULT_PADDING).min(MAX_PADDING),
            font_family,
        })
    }

    /// Whether the capture should keep an alpha channel.
    pub fn is_transparent(&self) -> bool {
        self.background == DEFAULT_BACKGROUND
    }
}

// Numbers and numeric strings are accepted; anything else is NaN.
fn scale_number(raw: &serde_json::Value) -> f64 {
    match raw {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Clamp the requested pixel density. Unusable numbers fall back to 1.
pub fn normalize_scale(raw: Option<f64>) -> f64 {
    match raw {
        Some(s) if s.is_finite() => s.clamp(MIN_SCALE, MAX_SCALE),
        Some(_) => MIN_SCALE,
        None => DEFAULT_SCALE,
    }
}

// Values end up inside a <style> block of the scaffold document.
fn ensure_css_safe(field: &str, value: &str) -> Result<()> {
    const FORBIDDEN: &[char] = &[';', '{', '}', '<', '>', '\\', '\n', '\r'];
    if value.trim().is_empty() || value.contains(FORBIDDEN) {
        return Err(Error::Validation(format!("Invalid {}: {:?}", field, value)));
    }
    Ok(())
}
