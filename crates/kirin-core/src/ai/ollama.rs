use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::{sse, ChatBackend, ChatReply, ChatRequest, FragmentStream};
use crate::error::TransportError;

#[derive(Deserialize)]
struct ThreadResponse {
    id: i64,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ReplyMessage,
    created_at: String,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

/// HTTP client for an Ollama-compatible chat server
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_models(&self) -> Result<Vec<String>, TransportError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response)?;

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn create_thread(&self) -> Result<i64, TransportError> {
        let url = format!("{}/v1/threads", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = check_status(response)?;

        let thread: ThreadResponse = response.json().await?;
        Ok(thread.id)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, TransportError> {
        let response = self
            .client
            .post(self.chat_url())
            .header(CACHE_CONTROL, "no-cache")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response)?;

        let chat_response: ChatResponse = response.json().await?;
        Ok(ChatReply {
            content: chat_response.message.content,
            created_at: parse_created_at(&chat_response.created_at),
        })
    }

    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream, TransportError> {
        let response = self
            .client
            .post(self.chat_url())
            .header(CACHE_CONTROL, "no-cache")
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response)?;

        info!("SSE open {}", response.status().as_u16());
        Ok(sse::fragments(Box::pin(response.bytes_stream())))
    }
}

fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if !status.is_success() {
        error!("Backend request to {} failed: {}", response.url(), status);
        return Err(TransportError::status(status.as_u16(), status.canonical_reason()));
    }
    Ok(response)
}

/// Server timestamps are RFC 3339; anything else is replaced by the receive time.
fn parse_created_at(raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            warn!("Unparsable created_at {:?}: {}", raw, e);
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatEntry;
    use chrono::{Datelike, Timelike};
    use futures_util::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Request as the server saw it: lowercased head and raw body
    struct Captured {
        head: String,
        body: String,
    }

    /// Answer a single request with `status` and `body`, capturing what was sent.
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> (OllamaClient, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let captured = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending a full request");
                buf.extend_from_slice(&chunk[..n]);

                let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    let body = String::from_utf8_lossy(&buf[end + 4..end + 4 + length]).into_owned();
                    break Captured { head, body };
                }
            };

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                content_type,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            captured
        });

        (OllamaClient::new(&format!("http://{}/", addr)), server)
    }

    fn request(stream: bool) -> ChatRequest {
        ChatRequest {
            model: "m".to_string(),
            thread_id: 0,
            stream,
            messages: vec![ChatEntry::user("hi")],
        }
    }

    #[test]
    fn test_parse_created_at_with_nanos() {
        let ts = parse_created_at("2023-08-04T19:22:45.499127Z");
        assert_eq!(ts.year(), 2023);
        assert_eq!(ts.hour(), 19);
        assert_eq!(ts.second(), 45);
    }

    #[test]
    fn test_parse_created_at_offset() {
        let ts = parse_created_at("2024-01-01T10:00:00+02:00");
        assert_eq!(ts.hour(), 8);
    }

    #[test]
    fn test_parse_created_at_garbage_falls_back() {
        let before = Utc::now();
        let ts = parse_created_at("yesterday");
        assert!(ts >= before);
    }

    #[test]
    fn test_chat_response_shape() {
        let body = r#"{"message":{"role":"assistant","content":"hi"},"created_at":"2024-01-01T00:00:00Z","done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "hi");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.chat_url(), "http://localhost:11434/api/chat");
    }

    #[tokio::test]
    async fn test_create_thread_posts_empty_object() {
        let (client, server) = serve_once("200 OK", "application/json", r#"{"id":7}"#).await;

        assert_eq!(client.create_thread().await, Ok(7));

        let sent = server.await.unwrap();
        assert!(sent.head.starts_with("post /v1/threads http/1.1"));
        assert_eq!(sent.body, "{}");
    }

    #[tokio::test]
    async fn test_open_stream_headers_and_fragments() {
        let (client, server) = serve_once(
            "200 OK",
            "text/event-stream",
            "data: Hel\n\ndata: lo\n\ndata:  world\n\n",
        )
        .await;

        let fragments: Vec<String> = client
            .open_stream(request(true))
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hel", "lo", " world"]);

        let sent = server.await.unwrap();
        assert!(sent.head.starts_with("post /api/chat http/1.1"));
        assert!(sent.head.contains("accept: text/event-stream"));
        assert!(sent.head.contains("cache-control: no-cache"));

        let body: serde_json::Value = serde_json::from_str(&sent.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "m",
                "threadId": 0,
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }

    #[tokio::test]
    async fn test_chat_single_reply() {
        let (client, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"message":{"role":"assistant","content":"<think>x</think>hi"},"created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .await;

        let reply = client.chat(request(false)).await.unwrap();
        assert_eq!(reply.content, "<think>x</think>hi");
        assert_eq!(reply.created_at.year(), 2024);

        let sent = server.await.unwrap();
        assert!(sent.head.starts_with("post /api/chat http/1.1"));
        assert!(!sent.head.contains("text/event-stream"));
        let body: serde_json::Value = serde_json::from_str(&sent.body).unwrap();
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_reason_phrase() {
        let (client, server) = serve_once("503 Service Unavailable", "text/plain", "").await;

        let err = match client.open_stream(request(true)).await {
            Ok(_) => panic!("503 must not open a stream"),
            Err(e) => e,
        };
        assert_eq!(err, TransportError::status(503, Some("Service Unavailable")));
        assert_eq!(err.to_string(), "Service Unavailable");
        server.await.unwrap();
    }
}
