//! Page-side building blocks: the scaffold document and the scripts evaluated in it
//!
//! Everything sent into the page is plain text. Values from the request cross
//! that boundary as JSON (see [`RenderJob`]), and the page answers with a JSON
//! string that is decoded into a [`PageReply`].

use crate::{Error, Geometry, Result, FALLBACK_GEOMETRY};
use base64::Engine as Base64Engine;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Id of the element wrapping the rendered SVG; it is also the capture region.
pub const CONTAINER_ID: &str = "wrap";

/// CSS selector for [`CONTAINER_ID`]
pub const CONTAINER_SELECTOR: &str = "#wrap";

/// Version-pinned Mermaid bundle loaded into every page
pub const DEFAULT_MERMAID_URL: &str = "https://cdn.jsdelivr.net/npm/mermaid@10.9.1/dist/mermaid.min.js";

/// Scaffold document with a single container element.
///
/// `background` must already be validated for CSS use.
pub fn scaffold_html(background: &str, padding: u32) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <style>
    html, body {{ margin:0; padding:0; background:{background}; }}
    #{id} {{ padding:{padding}px; display:inline-block; }}
  </style>
</head>
<body>
  <div id="{id}"></div>
  <script>
    window.process = {{ env: {{ NODE_ENV: 'production' }} }};
  </script>
</body>
</html>"#,
        background = background,
        padding = padding,
        id = CONTAINER_ID,
    )
}

/// `data:` URL carrying `html`, suitable for a plain navigation.
pub fn data_url(html: &str) -> String {
    let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, html);
    format!("data:text/html;charset=utf-8;base64,{}", b64)
}

/// Expression that appends a `<script src>` and resolves once it has loaded.
pub fn inject_script(url: &str) -> Result<String> {
    let url_json = serde_json::to_string(url).map_err(|e| Error::ScriptError(e.to_string()))?;
    Ok(format!(
        r#"new Promise(function(resolve){{
    var s = document.createElement('script');
    s.src = {url};
    s.onload = function(){{ resolve(JSON.stringify({{ ok: true }})); }};
    s.onerror = function(){{ resolve(JSON.stringify({{ ok: false, error: 'failed to load ' + s.src }})); }};
    document.head.appendChild(s);
}})"#,
        url = url_json
    ))
}

/// Everything the page needs to render one diagram
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    pub code: String,
    pub theme: String,
    pub font_family: String,
    pub render_id: String,
}

impl RenderJob {
    pub fn new(code: &str, theme: &str, font_family: &str) -> Self {
        Self {
            code: code.to_string(),
            theme: theme.to_string(),
            font_family: font_family.to_string(),
            render_id: next_render_id(),
        }
    }

    /// The async expression evaluated in the page for this job.
    pub fn to_script(&self) -> Result<String> {
        let job = serde_json::to_string(self).map_err(|e| Error::ScriptError(e.to_string()))?;
        // The job goes in last so user text is never scanned for placeholders.
        Ok(RENDER_TEMPLATE
            .replace("{{CONTAINER_ID}}", CONTAINER_ID)
            .replace("{{FALLBACK_W}}", &FALLBACK_GEOMETRY.width.to_string())
            .replace("{{FALLBACK_H}}", &FALLBACK_GEOMETRY.height.to_string())
            .replace("{{JOB}}", &job))
    }
}

/// Unique within one page lifetime; derived from the wall clock.
fn next_render_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("graph-{}", millis)
}

// Built from a template rather than `format!` to keep the JS braces readable.
const RENDER_TEMPLATE: &str = r#"(async function(job){
    try {
        const mermaid = window.mermaid;
        if (!mermaid) throw new Error('mermaid is not loaded');
        mermaid.initialize({
            startOnLoad: false,
            theme: job.theme,
            securityLevel: 'strict',
            fontFamily: job.fontFamily
        });

        const { svg } = await mermaid.render(job.renderId, job.code);

        const wrap = document.getElementById('{{CONTAINER_ID}}');
        wrap.innerHTML = svg;

        const svgEl = wrap.querySelector('svg');
        let width = 0, height = 0;
        if (svgEl) {
            svgEl.style.fontFamily = job.fontFamily;
            const vb = svgEl.viewBox && svgEl.viewBox.baseVal;
            if (vb && vb.width && vb.height) {
                width = vb.width; height = vb.height;
            }
            if (!(width && height)) {
                try {
                    const bbox = svgEl.getBBox();
                    if (bbox && bbox.width && bbox.height) { width = bbox.width; height = bbox.height; }
                } catch (e) {}
            }
            if (!(width && height)) {
                const rect = svgEl.getBoundingClientRect();
                if (rect && rect.width && rect.height) { width = rect.width; height = rect.height; }
            }
        }
        if (!(width && height)) { width = {{FALLBACK_W}}; height = {{FALLBACK_H}}; }

        return JSON.stringify({ ok: true, width: Math.ceil(width), height: Math.ceil(height) });
    } catch (e) {
        return JSON.stringify({ ok: false, error: String((e && e.message) || e) });
    }
})({{JOB}})"#;

/// Reply posted back from the page by the injected scripts
#[derive(Debug, Clone, Deserialize)]
pub struct PageReply {
    pub ok: bool,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PageReply {
    /// Decode the JSON string returned from the page.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::ScriptError(format!("Unreadable page reply {:?}: {}", raw, e)))
    }

    /// Interpret a render reply. Failures carry the library message untouched.
    pub fn into_geometry(self) -> Result<Geometry> {
        if !self.ok {
            return Err(Error::Diagram(
                self.error.unwrap_or_else(|| "Unknown render error".to_string()),
            ));
        }
        match (self.width, self.height) {
            (Some(w), Some(h)) => Ok(Geometry::from_measured(w, h)),
            _ => Ok(FALLBACK_GEOMETRY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_propagates_background_and_padding() {
        let html = scaffold_html("#fafafa", 24);
        assert!(html.contains("background:#fafafa;"));
        assert!(html.contains("#wrap { padding:24px; display:inline-block; }"));
        assert!(html.contains(r#"<div id="wrap"></div>"#));
        assert!(html.contains("margin:0; padding:0;"));
    }

    #[test]
    fn data_url_round_trips_through_base64() {
        let url = data_url("<p>hi</p>");
        let b64 = url.strip_prefix("data:text/html;charset=utf-8;base64,").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(decoded, b"<p>hi</p>");
    }

    #[test]
    fn inject_script_quotes_url() {
        let js = inject_script(DEFAULT_MERMAID_URL).unwrap();
        assert!(js.contains(r#"s.src = "https://cdn.jsdelivr.net/npm/mermaid@10.9.1/dist/mermaid.min.js";"#));
    }

    #[test]
    fn render_script_embeds_job_as_json() {
        let job = RenderJob {
            code: "graph TD; A-->B;\n%% '); alert(1); //".to_string(),
            theme: "default".to_string(),
            font_family: "Inter".to_string(),
            render_id: "graph-1".to_string(),
        };
        let js = job.to_script().unwrap();
        assert!(js.ends_with(r#"})({"code":"graph TD; A-->B;\n%% '); alert(1); //","theme":"default","fontFamily":"Inter","renderId":"graph-1"})"#));
        assert!(js.contains("securityLevel: 'strict'"));
        assert!(js.contains("startOnLoad: false"));
        assert!(js.contains("getElementById('wrap')"));
        assert!(js.contains("width = 800; height = 400;"));
        assert!(!js.contains("{{"));
    }

    #[test]
    fn render_ids_use_graph_prefix() {
        let job = RenderJob::new("graph TD; A-->B;", "default", "Inter");
        let millis = job.render_id.strip_prefix("graph-").unwrap();
        assert!(millis.parse::<u128>().is_ok());
    }

    #[test]
    fn reply_with_size_becomes_geometry() {
        let reply = PageReply::parse(r#"{"ok":true,"width":120,"height":174}"#).unwrap();
        assert_eq!(reply.into_geometry().unwrap(), Geometry { width: 120, height: 174 });
    }

    #[test]
    fn reply_without_size_falls_back() {
        let reply = PageReply::parse(r#"{"ok":true}"#).unwrap();
        assert_eq!(reply.into_geometry().unwrap(), FALLBACK_GEOMETRY);
    }

    #[test]
    fn failed_reply_is_diagram_error() {
        let reply = PageReply::parse(r#"{"ok":false,"error":"Parse error on line 1"}"#).unwrap();
        match reply.into_geometry() {
            Err(Error::Diagram(msg)) => assert_eq!(msg, "Parse error on line 1"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn garbage_reply_is_script_error() {
        assert!(matches!(PageReply::parse("undefined"), Err(Error::ScriptError(_))));
    }
}
