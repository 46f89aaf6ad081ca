use clap::Parser;
use dotenvy::dotenv;
use metrics_exporter_prometheus::PrometheusBuilder;
use simple_chatbot::api::{self, AppState};
use simple_chatbot::config::Config;
use simple_chatbot::middleware;
use simple_chatbot::model::{ollama::OllamaBackend, GenerateParams};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};


#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
dotenv().ok();
let cfg = Config::parse();


// logs
let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
fmt().with_env_filter(filter).init();


// ollama backend
let backend = OllamaBackend::new(&cfg.ollama_url, cfg.model.clone(), Duration::from_secs(cfg.request_timeout_secs))?;


let params = GenerateParams {
max_tokens: cfg.max_tokens, temp: cfg.temp, top_p: cfg.top_p, repeat_penalty: cfg.repeat_penalty,
};


let mut state = AppState::new(backend, params);
if !cfg.disable_metrics {
state = state.with_metrics(PrometheusBuilder::new().install_recorder()?);
}


let app = middleware::apply(api::routes(state), middleware::cors(&cfg.cors_allow_origins)?);
let addr: SocketAddr = cfg.bind_addr.parse()?;


tracing::info!(%addr, model = %cfg.model, ollama = %cfg.ollama_url, "listening");
axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
.with_graceful_shutdown(shutdown_signal())
.await?;
Ok(())
}


async fn shutdown_signal() {
if let Err(e) = tokio::signal::ctrl_c().await {
tracing::error!(error = %e, "failed to listen for ctrl-c");
}
tracing::info!("shutting down");
}
