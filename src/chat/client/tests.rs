use super::*;
use crate::config::ChatConfig;
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server_uri: &str) -> OpenAiChatClient {
    let config = ChatConfig {
        api_base: format!("{server_uri}/v1"),
        model: "gpt-4o".to_string(),
        ..ChatConfig::default()
    };
    OpenAiChatClient::with_api_key(&config, "test-key".to_string()).expect("should create client")
}

#[test]
fn message_constructors() {
    assert_eq!(ChatMessage::system("a").role, Role::System);
    assert_eq!(ChatMessage::user("b").role, Role::User);
    assert_eq!(ChatMessage::assistant("c").role, Role::Assistant);
}

#[test]
fn roles_serialize_lowercase() {
    let message = ChatMessage::user("hello");
    let json = serde_json::to_string(&message).expect("should serialize");
    assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn complete_returns_the_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-4o"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Dead hangs build grip."}}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let messages = vec![ChatMessage::user("What are dead hangs?")];

    let answer = tokio::task::spawn_blocking(move || client.complete(&messages))
        .await
        .expect("task should join")
        .expect("completion should succeed");

    assert_eq!(answer, "Dead hangs build grip.");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn http_error_is_a_generation_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let messages = vec![ChatMessage::user("anything")];

    let result = tokio::task::spawn_blocking(move || client.complete(&messages))
        .await
        .expect("task should join");

    assert!(matches!(result, Err(AssistantError::Generation(_))));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn stream_yields_deltas_in_order() {
    let server = MockServer::start().await;

    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Dead \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"hangs.\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let messages = vec![ChatMessage::user("What are dead hangs?")];

    let deltas: Vec<String> = tokio::task::spawn_blocking(move || {
        client
            .stream(&messages)?
            .collect::<Result<Vec<String>>>()
    })
    .await
    .expect("task should join")
    .expect("stream should succeed");

    assert_eq!(deltas, vec!["Dead ".to_string(), "hangs.".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn malformed_stream_chunk_ends_the_stream_with_an_error() {
    let server = MockServer::start().await;

    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
        "data: {this is not json}\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let messages = vec![ChatMessage::user("anything")];

    let items: Vec<Result<String>> =
        tokio::task::spawn_blocking(move || client.stream(&messages).map(|s| s.collect()))
            .await
            .expect("task should join")
            .expect("request should succeed");

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(AssistantError::Generation(_))));
}

#[test]
fn chat_stream_is_single_pass() {
    let mut stream = ChatStream::new(vec![Ok("a".to_string()), Ok("b".to_string())].into_iter());

    assert_eq!(stream.next().and_then(Result::ok).as_deref(), Some("a"));
    assert_eq!(stream.next().and_then(Result::ok).as_deref(), Some("b"));
    assert!(stream.next().is_none());
    assert!(stream.next().is_none());
}
