use super::{ChatMessage, GenerateParams, LlmBackend};
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
    top_p: f32,
    num_predict: i32,
    repeat_penalty: f32,
}

impl From<&GenerateParams> for Options {
    fn from(p: &GenerateParams) -> Self {
        Self {
            temperature: p.temp,
            top_p: p.top_p,
            num_predict: p.max_tokens,
            repeat_penalty: p.repeat_penalty,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

struct Inner {
    http: Client,
    chat_url: String,
    model: String,
}

/// Chat backend talking to a local Ollama server over its `/api/chat` endpoint.
#[derive(Clone)]
pub struct OllamaBackend {
    inner: Arc<Inner>,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("build ollama http client")?;
        let chat_url = format!("{}/api/chat", base_url.trim_end_matches('/'));
        Ok(Self { inner: Arc::new(Inner { http, chat_url, model: model.into() }) })
    }

    pub fn model(&self) -> &str {
        &self.inner.model
    }
}

#[async_trait::async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, messages: &[ChatMessage], p: &GenerateParams) -> Result<String> {
        let body = ChatRequest {
            model: &self.inner.model,
            messages,
            stream: false,
            options: p.into(),
        };

        let t0 = Instant::now();
        let res = self
            .inner
            .http
            .post(&self.inner.chat_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("send chat request to {}", self.inner.chat_url))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(anyhow!("ollama returned {status}: {detail}"));
        }

        let parsed: ChatResponse = res.json().await.context("decode ollama chat response")?;
        tracing::debug!(
            model = %self.inner.model,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            eval_count = ?parsed.eval_count,
            "ollama chat done"
        );
        Ok(parsed.message.content)
    }
}
