use polza_core::rewrite::SYSTEM_INSTRUCTION;
use polza_core::{PolzaClient, RewriteError, Rewriter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Captured request: head (request line and headers) and body.
struct Captured {
    head: String,
    body: String,
}

/// Serves exactly one request with `status` and `body`.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/v1/", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0_u8; 4096];
        let captured = loop {
            let read = socket.read(&mut chunk).await.unwrap();
            raw.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&raw).into_owned();
            if let Some(split) = text.find("\r\n\r\n") {
                let head = text[..split].to_string();
                let length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                let body = &text[split + 4..];
                if body.len() >= length {
                    break Captured {
                        head,
                        body: body.to_string(),
                    };
                }
            }
            assert!(read > 0, "connection closed before the request was complete");
        };

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        captured
    });

    (base_url, server)
}

#[tokio::test]
async fn sends_bearer_request_and_returns_first_choice() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"Hello, world."}}]}"#,
    )
    .await;
    let client = PolzaClient::with_base_url(base_url);

    let improved = client
        .improve("hello world", "test/model", "sk-123")
        .await
        .unwrap();
    assert_eq!(improved, "Hello, world.");

    let captured = server.await.unwrap();
    assert!(captured.head.starts_with("POST /v1/chat/completions HTTP/1.1"));
    assert!(captured
        .head
        .lines()
        .any(|line| line.eq_ignore_ascii_case("authorization: Bearer sk-123")));

    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["model"], "test/model");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], SYSTEM_INSTRUCTION);
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "hello world");
}

#[tokio::test]
async fn error_status_uses_the_body_message() {
    let (base_url, server) = serve_once(
        "401 Unauthorized",
        r#"{"error":{"message":"Invalid API key"}}"#,
    )
    .await;
    let client = PolzaClient::with_base_url(base_url);

    let err = client.improve("text", "m", "bad").await.unwrap_err();
    server.await.unwrap();

    match err {
        RewriteError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn error_status_without_message_uses_generic_text() {
    let (base_url, server) = serve_once("500 Internal Server Error", "{}").await;
    let client = PolzaClient::with_base_url(base_url);

    let err = client.improve("text", "m", "k").await.unwrap_err();
    server.await.unwrap();

    assert_eq!(err.to_string(), "API Error: 500");
}

#[tokio::test]
async fn no_choices_yields_an_empty_rewrite() {
    let (base_url, server) = serve_once("200 OK", r#"{"choices":[]}"#).await;
    let client = PolzaClient::with_base_url(base_url);

    let improved = client.improve("text", "m", "k").await.unwrap();
    server.await.unwrap();

    assert_eq!(improved, "");
}

#[tokio::test]
async fn malformed_success_body_is_an_invalid_response() {
    let (base_url, server) = serve_once("200 OK", "<html>oops</html>").await;
    let client = PolzaClient::with_base_url(base_url);

    let err = client.improve("text", "m", "k").await.unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, RewriteError::InvalidResponse(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = PolzaClient::with_base_url(format!("http://{addr}"));

    let err = client.improve("text", "m", "k").await.unwrap_err();

    assert!(matches!(err, RewriteError::Network(_)));
}
