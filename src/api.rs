use crate::{
    extract::{extract, ExtractError, ExtractedPayload},
    model::{basic_chat_messages, ChatMessage, GenerateParams, LlmBackend},
    prompt::{PromptTemplate, TemplateError},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, sync::Arc, time::Instant};
use thiserror::Error;

#[derive(Deserialize)]
pub struct AskReq {
    pub question: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("model backend failed: {0:#}")]
    Backend(anyhow::Error),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Template(_) => "template",
            Self::Backend(_) => "backend",
            Self::Extract(_) => "extract",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Template(_) | Self::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Extract(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Extract(e) => match e.candidate() {
                Some(c) => json!({ "error": self.to_string(), "candidate": c }),
                None => json!({ "error": self.to_string() }),
            },
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState<B> {
    pub backend: B,
    pub template: Arc<PromptTemplate>,
    pub params: GenerateParams,
    pub metrics: Option<PrometheusHandle>,
}

impl<B> AppState<B> {
    pub fn new(backend: B, params: GenerateParams) -> Self {
        Self {
            backend,
            template: Arc::new(PromptTemplate::answer_json()),
            params,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn routes<B: LlmBackend + Clone>(state: AppState<B>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(render_metrics::<B>))
        .route("/basic-chat/", post(basic_chat::<B>))
        .route("/basic-chat/prompt-template", post(prompt_template_chat::<B>))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn render_metrics<B: LlmBackend + Clone>(State(state): State<AppState<B>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn generate<B: LlmBackend>(
    backend: &B,
    messages: &[ChatMessage],
    params: &GenerateParams,
    route: &'static str,
) -> Result<String, ApiError> {
    let t0 = Instant::now();
    let out = backend.generate(messages, params).await;
    metrics::histogram!("chat_generate_seconds", "route" => route).record(t0.elapsed().as_secs_f64());
    out.map_err(|e| {
        tracing::error!(route, error = %format!("{e:#}"), "model call failed");
        ApiError::Backend(e)
    })
}

fn observe<T>(route: &'static str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    metrics::counter!("chat_requests_total", "route" => route).increment(1);
    if let Err(e) = &result {
        metrics::counter!("chat_failures_total", "route" => route, "kind" => e.kind()).increment(1);
    }
    result
}

/// `"1 answer: ...\n2 answer: ...\n"`, one line per completion choice.
pub fn number_choices<S: AsRef<str>>(choices: &[S]) -> String {
    choices
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} answer: {}\n", i + 1, c.as_ref()))
        .collect()
}

async fn basic_chat<B: LlmBackend + Clone>(
    State(state): State<AppState<B>>,
) -> Result<Json<ExtractedPayload>, ApiError> {
    const ROUTE: &str = "basic_chat";
    let result = generate(&state.backend, &basic_chat_messages(), &state.params, ROUTE)
        .await
        .map(|text| Json(ExtractedPayload { answer: number_choices(&[text]) }));
    observe(ROUTE, result)
}

async fn prompt_template_chat<B: LlmBackend + Clone>(
    State(state): State<AppState<B>>,
    Json(req): Json<AskReq>,
) -> Result<Json<ExtractedPayload>, ApiError> {
    const ROUTE: &str = "prompt_template";
    let result: Result<Json<ExtractedPayload>, ApiError> = async {
        let question = req.question.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("question must not be empty"));
        }
        let vars = HashMap::from([("question", question)]);
        let messages = state.template.format(&vars)?;
        let raw = generate(&state.backend, &messages, &state.params, ROUTE).await?;
        extract(&raw).map(Json).map_err(|e| {
            tracing::warn!(error = %e, candidate = e.candidate().unwrap_or(""), "unparsable model output");
            ApiError::from(e)
        })
    }
    .await;
    observe(ROUTE, result)
}
