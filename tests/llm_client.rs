//! Gemini client against a one-shot local HTTP server.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use trendscope::config::GeminiConfig;
use trendscope::llm::{GeminiClient, NO_RESPONSE};
use trendscope::TrendError;

fn config() -> GeminiConfig {
    GeminiConfig {
        api_key: Some("AIzaSyA-0123456789abcdefghijklmnopq".to_string()),
        model: "gemini-test".to_string(),
        timeout: Duration::from_secs(5),
    }
}

/// Serves a single response and hands back the request line it saw.
async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        let text = String::from_utf8_lossy(&request).to_string();
        text.lines().next().unwrap_or_default().to_string()
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn test_generate_returns_candidate_text() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"candidates":[{"content":{"parts":[{"text":"Idea 1: street food POV"}]}}]}"#,
    )
    .await;
    let client = GeminiClient::new(&config()).unwrap().with_base_url(base);

    let answer = client.generate("system", "prompt").await.unwrap();
    assert_eq!(answer, "Idea 1: street food POV");

    let request_line = server.await.unwrap();
    assert!(request_line.starts_with("POST /models/gemini-test:generateContent?key=AIzaSyA-"));
}

#[tokio::test]
async fn test_generate_without_candidates_is_not_an_error() {
    let (base, _server) = serve_once("200 OK", r#"{"candidates":[]}"#).await;
    let client = GeminiClient::new(&config()).unwrap().with_base_url(base);

    assert_eq!(client.generate("system", "prompt").await.unwrap(), NO_RESPONSE);
}

#[tokio::test]
async fn test_non_success_status_surfaces_status_and_body() {
    let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
    let (base, _server) = serve_once("400 Bad Request", body).await;
    let client = GeminiClient::new(&config()).unwrap().with_base_url(base);

    match client.generate("system", "prompt").await {
        Err(TrendError::Llm(message)) => assert_eq!(message, format!("400 - {}", body)),
        other => panic!("expected an LLM error, got {:?}", other),
    }
}
