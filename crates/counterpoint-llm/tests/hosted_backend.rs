//! Hosted backend against a local mock of the deployment API.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use counterpoint_llm::{ErrorKind, LlmBackend, LlmError, OpenAiBackend, RetryPolicy, SafetyVerdict};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const API_KEY: &str = "sk-mock";
const BANNED_WORD: &str = "forbidden";

#[derive(Default)]
struct MockState {
    /// Chat completions answered with null content before real content arrives.
    null_replies: AtomicU32,
    chat_calls: AtomicU32,
    embedding_calls: AtomicU32,
}

async fn chat(
    State(state): State<Arc<MockState>>,
    Path(_deployment): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if headers.get("api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "bad key"}})));
    }
    let call = state.chat_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let content = if call <= state.null_replies.load(Ordering::SeqCst) {
        Value::Null
    } else {
        Value::from(format!("reply after {call} calls"))
    };
    (
        StatusCode::OK,
        Json(json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]})),
    )
}

async fn completions(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let prompt = body["prompt"].as_str().unwrap_or_default();
    if prompt.contains(BANNED_WORD) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"code": "content_filter", "message": "content management policy"}})),
        );
    }
    (StatusCode::OK, Json(json!({"choices": [{"text": "."}]})))
}

/// Echoes each input's length as its vector, in reverse `index` order.
async fn embeddings(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.embedding_calls.fetch_add(1, Ordering::SeqCst);
    let inputs: Vec<String> = match &body["input"] {
        Value::String(s) => vec![s.clone()],
        other => serde_json::from_value(other.clone()).unwrap_or_default(),
    };
    let mut data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(i, text)| json!({"index": i, "embedding": [text.len() as f64, i as f64]}))
        .collect();
    data.reverse();
    Json(json!({"object": "list", "data": data}))
}

async fn spawn_mock(state: Arc<MockState>) -> SocketAddr {
    let app = Router::new()
        .route("/openai/deployments/{deployment}/chat/completions", post(chat))
        .route("/openai/deployments/{deployment}/completions", post(completions))
        .route("/openai/deployments/{deployment}/embeddings", post(embeddings))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn backend(addr: SocketAddr, key: &str) -> OpenAiBackend {
    OpenAiBackend::new(
        SecretString::from(key),
        format!("http://{addr}"),
        "gpt35",
        "2024-02-01",
        "gpt-35-turbo",
    )
}

#[tokio::test]
async fn test_complete_retries_until_content_arrives() {
    let state = Arc::new(MockState::default());
    state.null_replies.store(2, Ordering::SeqCst);
    let addr = spawn_mock(state.clone()).await;

    let reply = backend(addr, API_KEY).complete("hello", 250).await.unwrap();
    assert_eq!(reply, "reply after 3 calls");
    assert_eq!(state.chat_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_bounded_retry_gives_up() {
    let state = Arc::new(MockState::default());
    state.null_replies.store(10, Ordering::SeqCst);
    let addr = spawn_mock(state.clone()).await;

    let err = backend(addr, API_KEY)
        .with_retry_policy(RetryPolicy::bounded(2))
        .complete("hello", 250)
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RetriesExhausted { attempts: 2 }));
    assert_eq!(err.kind(), ErrorKind::BackendCallFailed);
    assert_eq!(state.chat_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_check_maps_bad_request_to_rejection() {
    let addr = spawn_mock(Arc::new(MockState::default())).await;
    let b = backend(addr, API_KEY);

    assert_eq!(b.check("a harmless question").await.unwrap(), SafetyVerdict::accepted());

    let verdict = b.check("something forbidden").await.unwrap();
    assert!(!verdict.accepted);
    assert_eq!(verdict.detail.as_deref(), Some("content management policy"));
}

#[tokio::test]
async fn test_wrong_key_is_call_failure_not_rejection() {
    let state = Arc::new(MockState::default());
    let addr = spawn_mock(state.clone()).await;

    let err = backend(addr, "sk-wrong").complete("hello", 10).await.unwrap_err();
    assert!(matches!(err, LlmError::ApiError { status: 401, .. }));
    assert_eq!(err.kind(), ErrorKind::BackendCallFailed);
}

#[tokio::test]
async fn test_embed_many_is_one_request_in_input_order() {
    let state = Arc::new(MockState::default());
    let addr = spawn_mock(state.clone()).await;

    let texts: Vec<String> = ["a", "bbb", "cc"].iter().map(|s| s.to_string()).collect();
    let vectors = backend(addr, API_KEY).embed_many(&texts).await.unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![3.0, 1.0], vec![2.0, 2.0]]);
    assert_eq!(state.embedding_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_embed_single_text() {
    let addr = spawn_mock(Arc::new(MockState::default())).await;
    let vector = backend(addr, API_KEY).embed("four").await.unwrap();
    assert_eq!(vector, vec![4.0, 0.0]);
}
