//! Wire-level tests for the Ollama backend against a one-shot local HTTP server

use moderator_core::{
    BackendError, DiscussionConfig, DiscussionError, DiscussionState, GenerateEvent,
    GenerateRequest, InferenceBackend, MessageStatus, Moderator, OllamaBackend, RevealSettings,
};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one canned response per connection, returning each raw request
///
/// The body is written in the given pieces so line splitting across network
/// reads is exercised. The connection is closed after the last piece.
async fn serve(
    responses: Vec<(&'static str, Vec<&'static str>)>,
) -> (OllamaBackend, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, pieces) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut socket).await);

            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n"
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for piece in pieces {
                socket.write_all(piece.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
            }
            socket.shutdown().await.unwrap();
        }
        requests
    });

    (
        OllamaBackend::new(addr.ip().to_string(), addr.port()),
        handle,
    )
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn body_of(request: &str) -> serde_json::Value {
    let (_, body) = request.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

async fn drain(mut rx: tokio::sync::mpsc::Receiver<GenerateEvent>) -> Vec<GenerateEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_generate_decodes_split_lines() {
    let (backend, server) = serve(vec![(
        "200 OK",
        vec![
            "{\"response\":\"Hel\",\"done\":false}\n{\"resp",
            "onse\":\"lo\",\"done\":false}\nnot json\n",
            "{\"response\":\"\",\"done\":true,\"context\":[1,2,3],\"eval_count\":2,\"eval_duration\":500000000}",
        ],
    )])
    .await;

    let request = GenerateRequest::new("a", "Say hello").with_context(vec![4, 5]);
    let events = drain(backend.generate(&request).await.unwrap()).await;

    let fragments: Vec<_> = events
        .into_iter()
        .map(|event| match event {
            GenerateEvent::Fragment(f) => f,
            GenerateEvent::Error(e) => panic!("unexpected stream error: {e}"),
        })
        .collect();
    assert_eq!(fragments.len(), 3);
    assert_eq!(
        fragments.iter().map(|f| f.response.as_str()).collect::<String>(),
        "Hello"
    );
    let last = &fragments[2];
    assert!(last.done);
    assert_eq!(last.context, Some(vec![1, 2, 3]));
    assert_eq!(last.stats.tokens_per_second(), Some(4.0));

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("POST /api/generate "));
    assert_eq!(
        body_of(&requests[0]),
        serde_json::json!({
            "model": "a",
            "prompt": "Say hello",
            "context": [4, 5],
            "stream": true,
        })
    );
}

#[tokio::test]
async fn test_generate_error_status() {
    let (backend, _server) = serve(vec![(
        "404 Not Found",
        vec!["{\"error\":\"model 'ghost' not found\"}"],
    )])
    .await;

    let err = backend
        .generate(&GenerateRequest::new("ghost", "hi"))
        .await
        .unwrap_err();
    match err {
        BackendError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_line_fails_turn() {
    let (backend, _server) = serve(vec![(
        "200 OK",
        vec!["{\"response\":\"Hi\",\"done\":false}\n{\"error\":\"model runner has unexpectedly stopped\"}\n"],
    )])
    .await;

    let config = DiscussionConfig::new("X", "a", "b", "debate", 1).unwrap();
    let mut moderator = Moderator::new(backend, config, RevealSettings::instant());
    let outcome = moderator.run().await;

    assert_eq!(outcome.state, DiscussionState::Failed);
    assert!(matches!(
        outcome.error,
        Some(DiscussionError::Backend(BackendError::Stream(_)))
    ));
    let message = &moderator.transcript().messages()[0];
    assert_eq!(message.status, MessageStatus::Errored);
    assert!(
        message.content.contains("unexpectedly stopped"),
        "content: {:?}",
        message.content
    );
    assert_eq!(moderator.context_for("a"), None);
}

#[tokio::test]
async fn test_list_models_reads_data_field() {
    let (backend, server) = serve(vec![(
        "200 OK",
        vec![
            "{\"object\":\"list\",\"data\":[{\"id\":\"llama3.2\",\"object\":\"model\",\"created\":1,\"owned_by\":\"library\"},{\"id\":\"qwen3\"}]}",
        ],
    )])
    .await;

    let ids: Vec<_> = backend
        .list_models()
        .await
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec!["llama3.2", "qwen3"]);

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("GET /v1/models "));
}

#[tokio::test]
async fn test_list_models_failure_is_empty() {
    let (backend, _server) = serve(vec![("500 Internal Server Error", vec!["oops"])]).await;
    assert!(backend.list_models().await.is_empty());
}

#[tokio::test]
async fn test_check_connection_status() {
    let (backend, server) = serve(vec![
        ("200 OK", vec!["{\"models\":[]}"]),
        ("503 Service Unavailable", vec![""]),
    ])
    .await;

    assert!(backend.check_connection().await);
    assert!(!backend.check_connection().await);

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("GET /api/tags "));
}

#[tokio::test]
async fn test_discussion_over_http() {
    let (backend, server) = serve(vec![
        (
            "200 OK",
            vec!["{\"response\":\"Opening.\",\"done\":false}\n{\"response\":\"\",\"done\":true,\"context\":[9]}\n"],
        ),
        (
            "200 OK",
            vec!["{\"response\":\"Reply.\",\"done\":false}\n{\"response\":\"\",\"done\":true,\"context\":[8]}\n"],
        ),
    ])
    .await;

    let config = DiscussionConfig::new("X", "a", "b", "debate", 2).unwrap();
    let mut moderator = Moderator::new(backend, config, RevealSettings::instant());
    let outcome = moderator.run().await;

    assert_eq!(outcome.state, DiscussionState::Completed);
    let contents: Vec<_> = moderator
        .transcript()
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["Opening.", "Reply."]);
    assert_eq!(moderator.context_for("a"), Some(&vec![9]));

    let requests = server.await.unwrap();
    assert_eq!(body_of(&requests[1])["model"], "b");
}
