//! HTTP front end.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use edge_template::RenderMode;

use crate::config::GatewayConfig;
use crate::handler::RequestHandler;
use crate::sources::RequestInfo;

/// Query parameter selecting fragment rendering (`?mode=fragment`).
const MODE_PARAM: &str = "mode";

/// Router sending every path to the composition handler.
pub fn router(handler: Arc<RequestHandler>) -> Router {
    Router::new().fallback(compose_page).with_state(handler)
}

/// Render mode requested by the query string.
pub fn render_mode(uri: &Uri) -> RenderMode {
    let fragment = uri.query().is_some_and(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .any(|(name, value)| name == MODE_PARAM && value == "fragment")
    });
    if fragment {
        RenderMode::Fragment
    } else {
        RenderMode::Document
    }
}

async fn compose_page(
    State(handler): State<Arc<RequestHandler>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let mode = render_mode(&uri);
    let composed = handler
        .handle(RequestInfo::new(uri.path(), headers), mode)
        .await;

    let mut response = Response::new(Body::from_stream(composed.body));
    *response.status_mut() = composed.head.status;
    *response.headers_mut() = composed.head.headers;
    response
}

/// Serve the gateway until Ctrl-C.
pub async fn serve(config: &GatewayConfig) -> Result<()> {
    let handler =
        RequestHandler::from_config(config).context("Failed to create upstream client")?;
    let addr = config.server.socket_addr()?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, templates = %config.templates.path.display(), "Gateway listening");

    axum::serve(listener, router(Arc::new(handler)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Gateway shutting down");
        })
        .await
        .context("Gateway server failed")
}
