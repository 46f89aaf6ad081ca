use axum::{body::Body, http, response::Response, Router};
use serde_json::{json, Value};
use simple_chatbot::api::{number_choices, routes, AppState};
use simple_chatbot::middleware;
use simple_chatbot::model::{basic_chat_messages, ChatMessage, GenerateParams, LlmBackend, Role};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

#[derive(Clone, Default)]
struct FakeBackend {
    seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

#[async_trait::async_trait]
impl LlmBackend for FakeBackend {
    async fn generate(&self, messages: &[ChatMessage], _p: &GenerateParams) -> anyhow::Result<String> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        match last {
            "fail" => anyhow::bail!("backend failure for test prompt"),
            "panic" => panic!("backend blew up"),
            "garbage" => Ok("I would rather not.".to_string()),
            "broken fence" => Ok("```json\n{\"answer\": }\n```".to_string()),
            q if messages[0].role == Role::System && messages.len() == 2 => {
                Ok(format!("Sure!\n```json\n{{\"answer\": \"echo: {q}\"}}\n```"))
            }
            _ => Ok("LangChain offers models, chains and agents.".to_string()),
        }
    }
}

fn test_router(backend: FakeBackend) -> Router {
    let state = AppState::new(backend, GenerateParams::default());
    let cors = middleware::cors(&[]).unwrap();
    middleware::apply(routes(state), cors)
}

fn post_json(uri: &str, body: Value) -> http::Request<Body> {
    http::Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn json_body(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn basic_chat_uses_fixed_conversation() {
    let backend = FakeBackend::default();
    let app = test_router(backend.clone());
    let req = http::Request::builder()
        .method(http::Method::POST)
        .uri("/basic-chat/")
        .body(Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), http::StatusCode::OK);
    let v = json_body(res).await;
    assert_eq!(v["answer"], "1 answer: LangChain offers models, chains and agents.\n");

    let seen = backend.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], basic_chat_messages());
}

#[tokio::test]
async fn prompt_template_extracts_answer() {
    let backend = FakeBackend::default();
    let app = test_router(backend.clone());

    let res = app
        .oneshot(post_json("/basic-chat/prompt-template", json!({"question": "What is Rust?"})))
        .await
        .unwrap();
    assert_eq!(res.status(), http::StatusCode::OK);
    let v = json_body(res).await;
    assert_eq!(v, json!({"answer": "echo: What is Rust?"}));

    let seen = backend.seen.lock().unwrap();
    assert_eq!(seen[0][0].role, Role::System);
    assert_eq!(seen[0][1], ChatMessage::user("What is Rust?"));
}

#[tokio::test]
async fn prompt_template_backend_error() {
    let app = test_router(FakeBackend::default());
    let res = app
        .oneshot(post_json("/basic-chat/prompt-template", json!({"question": "fail"})))
        .await
        .unwrap();
    assert_eq!(res.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    let v = json_body(res).await;
    assert!(v["error"].as_str().unwrap().contains("backend failure"));
}

#[tokio::test]
async fn prompt_template_unparsable_output() {
    let app = test_router(FakeBackend::default());
    let res = app
        .oneshot(post_json("/basic-chat/prompt-template", json!({"question": "garbage"})))
        .await
        .unwrap();
    assert_eq!(res.status(), http::StatusCode::BAD_GATEWAY);
    let v = json_body(res).await;
    assert_eq!(v["candidate"], "I would rather not.");
}

#[tokio::test]
async fn prompt_template_broken_fence_reports_fence_body() {
    let app = test_router(FakeBackend::default());
    let res = app
        .oneshot(post_json("/basic-chat/prompt-template", json!({"question": "broken fence"})))
        .await
        .unwrap();
    assert_eq!(res.status(), http::StatusCode::BAD_GATEWAY);
    let v = json_body(res).await;
    assert_eq!(v["candidate"], "{\"answer\": }");
}

#[tokio::test]
async fn prompt_template_empty_question() {
    let backend = FakeBackend::default();
    let app = test_router(backend.clone());
    let res = app
        .oneshot(post_json("/basic-chat/prompt-template", json!({"question": "   "})))
        .await
        .unwrap();
    assert_eq!(res.status(), http::StatusCode::BAD_REQUEST);
    assert!(backend.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn prompt_template_bad_request() {
    let app = test_router(FakeBackend::default());
    // missing required field "question"
    let res = app
        .oneshot(post_json("/basic-chat/prompt-template", json!({"not_question": "x"})))
        .await
        .unwrap();
    assert_eq!(res.status(), http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let app = test_router(FakeBackend::default());

    let req = http::Request::builder()
        .uri("/healthz")
        .header(middleware::X_REQUEST_ID, "abc-123")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), http::StatusCode::OK);
    assert_eq!(res.headers()[middleware::X_REQUEST_ID], "abc-123");

    let req = http::Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    let id = res.headers()[middleware::X_REQUEST_ID].to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn metrics_disabled_is_not_found() {
    let app = test_router(FakeBackend::default());
    let req = http::Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), http::StatusCode::NOT_FOUND);
}

#[test]
fn choices_are_numbered_one_per_line() {
    assert_eq!(number_choices(&["a", "b"]), "1 answer: a\n2 answer: b\n");
    assert_eq!(number_choices::<&str>(&[]), "");
}

#[tokio::test]
async fn cors_preflight_carries_request_id() {
    let app = test_router(FakeBackend::default());
    let req = http::Request::builder()
        .method(http::Method::OPTIONS)
        .uri("/basic-chat/prompt-template")
        .header(http::header::ORIGIN, "https://example.com")
        .header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(middleware::X_REQUEST_ID, "preflight-1")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), http::StatusCode::OK);
    assert!(res.headers().contains_key(http::header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(res.headers()[middleware::X_REQUEST_ID], "preflight-1");
}

#[tokio::test]
async fn backend_panic_becomes_500_with_request_id() {
    let app = test_router(FakeBackend::default());
    let res = app
        .oneshot(post_json("/basic-chat/prompt-template", json!({"question": "panic"})))
        .await
        .unwrap();
    assert_eq!(res.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    let id = res.headers()[middleware::X_REQUEST_ID].to_str().unwrap().to_string();
    assert_eq!(id.len(), 36);
    let v = json_body(res).await;
    assert_eq!(v["error"], "internal server error");
}
