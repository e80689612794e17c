//! HTTP surface: the render endpoint, its health probe and the companion page

use crate::render::DiagramRenderer;
use crate::{Error, RenderRequest};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, warn};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const RENDER_PATH: &str = "/api/render-mermaid";
pub const PAGE_PATH: &str = "/diagram";

const DIAGRAM_PAGE: &str = include_str!("page.html");

#[derive(Clone)]
pub struct AppState {
    pub renderer: Arc<dyn DiagramRenderer>,
}

impl AppState {
    pub fn new(renderer: Arc<dyn DiagramRenderer>) -> Self {
        Self { renderer }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(RENDER_PATH, post(render_diagram).get(health))
        .route(PAGE_PATH, get(diagram_page))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Validate the body, render it and answer with the PNG.
async fn render_diagram(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request = RenderRequest::from_http(content_type, &body)?;

    let image = state.renderer.render(request).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        image.png,
    )
        .into_response())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "msg": "Mermaid renderer is running (POST with {code})",
    }))
}

async fn diagram_page() -> Html<&'static str> {
    Html(DIAGRAM_PAGE)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_client_error() {
            warn!("Rejected render request: {}", self);
        } else {
            error!("Mermaid render error: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
