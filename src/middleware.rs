//! Request id, CORS, trace logging and panic recovery layers.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
const MAX_LEN: usize = 255;

static ID_CLEANUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-@]").expect("id cleanup regex"));

/// Request id stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(String);

impl RequestId {
    pub fn get(&self) -> &str {
        &self.0
    }
}

pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = make_request_id(request.headers().get(X_REQUEST_ID));
    request.extensions_mut().insert(RequestId(id.clone()));
    let mut res = next.run(request).await;
    match HeaderValue::from_str(&id) {
        Ok(v) => {
            res.headers_mut().insert(X_REQUEST_ID, v);
        }
        Err(_) => tracing::warn!(request_id = %id, "could not set request id header"),
    }
    res
}

/// Keep a sanitized inbound id, otherwise mint a UUID.
fn make_request_id(inbound: Option<&HeaderValue>) -> String {
    inbound
        .and_then(|hdr| hdr.to_str().ok())
        .map(|s| ID_CLEANUP.replace_all(s, "").chars().take(MAX_LEN).collect::<String>())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub fn cors(allow_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let mut layer = CorsLayer::permissive();
    if !allow_origins.is_empty() {
        let mut list = Vec::with_capacity(allow_origins.len());
        for origin in allow_origins {
            list.push(origin.parse::<HeaderValue>()?);
        }
        layer = layer.allow_origin(list);
    }
    Ok(layer)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let msg = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("no error details");
    tracing::error!(err.msg = msg, "server_panic");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal server error" }))).into_response()
}

/// Wrap `app` with the standard stack. Outermost first: request id, panic
/// recovery, CORS, trace. The request id wraps everything so preflight and
/// panic responses carry it too.
pub fn apply(app: Router, cors: CorsLayer) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let id = req.extensions().get::<RequestId>().map(RequestId::get).unwrap_or("-");
        tracing::info_span!("http", method = %req.method(), uri = %req.uri(), request_id = %id)
    });
    app.layer(trace)
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(axum::middleware::from_fn(request_id))
}
