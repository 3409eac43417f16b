//! Google Gemini API provider.
//!
//! Calls the `streamGenerateContent` endpoint with `alt=sse` and concatenates
//! the streamed text fragments into one answer. The API key travels in the
//! `x-goog-api-key` header so it never appears in URLs or error text.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use silvia_core::{
    config::GeminiConfig,
    error::SilviaError,
    message::{MessageMetadata, OutgoingMessage},
    traits::Provider,
};
use std::time::Instant;
use tracing::{debug, warn};

use crate::sse::SseAccumulator;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create from config values.
    pub fn from_config(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from the `[provider.gemini]` section.
    pub fn from_section(cfg: &GeminiConfig) -> Self {
        Self::from_config(cfg.api_key.clone(), cfg.model.clone(), cfg.base_url.clone())
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

impl<'a> GeminiRequest<'a> {
    fn single_turn(prompt: &'a str) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "text/plain",
            },
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<OutgoingMessage, SilviaError> {
        let start = Instant::now();
        let body = GeminiRequest::single_turn(prompt);

        debug!(
            "gemini: POST models/{}:streamGenerateContent ({} chars)",
            self.model,
            prompt.len()
        );

        let resp = self
            .client
            .post(self.stream_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SilviaError::Provider(format!("gemini request failed: {}", e.without_url()))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SilviaError::Provider(format!(
                "gemini returned {status}: {text}"
            )));
        }

        let mut acc = SseAccumulator::default();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| {
                SilviaError::Provider(format!("gemini stream read failed: {}", e.without_url()))
            })?;
            acc.push(&bytes)?;
        }
        let (text, chunks) = acc.finish()?;

        if text.trim().is_empty() {
            return Err(SilviaError::Provider(format!(
                "gemini returned no text ({chunks} events)"
            )));
        }

        Ok(OutgoingMessage {
            text,
            metadata: MessageMetadata {
                provider_used: "gemini".to_string(),
                model: Some(self.model.clone()),
                chunks,
                processing_time_ms: start.elapsed().as_millis() as u64,
            },
            reply_target: None,
        })
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("gemini: no API key configured");
            return false;
        }
        let url = format!("{}/models", self.base_url);
        let req = self.client.get(&url).header(API_KEY_HEADER, &self.api_key);
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("gemini not available: {}", e.without_url());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // Read headers, then the JSON body by Content-Length.
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let len = text
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n{body}"
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn sse_event(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
        )
    }

    #[test]
    fn test_gemini_provider_name() {
        let p = GeminiProvider::from_config(
            "AIza-test".into(),
            "gemini-2.0-flash".into(),
            "https://example.com/v1beta/".into(),
        );
        assert_eq!(p.name(), "gemini");
        assert_eq!(
            p.stream_url(),
            "https://example.com/v1beta/models/gemini-2.0-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_gemini_request_serialization() {
        let json = serde_json::to_value(GeminiRequest::single_turn("Hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "Hello"}]}],
                "generationConfig": {"responseMimeType": "text/plain"}
            })
        );
    }

    #[tokio::test]
    async fn test_complete_accumulates_stream() {
        let body = format!("{}{}", sse_event("Our filter "), sse_event("costs less."));
        let (base, server) = serve_once("200 OK", body).await;
        let p = GeminiProvider::from_config("AIza-k".into(), "gemini-2.0-flash".into(), base);

        let out = p.complete("knowledge\n\nprice?").await.unwrap();
        assert_eq!(out.text, "Our filter costs less.");
        assert_eq!(out.metadata.provider_used, "gemini");
        assert_eq!(out.metadata.chunks, 2);

        let request = server.await.unwrap();
        assert!(request
            .starts_with("POST /models/gemini-2.0-flash:streamGenerateContent?alt=sse HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: aiza-k\r\n"));
        assert!(request.contains(r#""text":"knowledge\n\nprice?""#));
    }

    #[tokio::test]
    async fn test_complete_non_success_status_fails() {
        let (base, _server) =
            serve_once("403 Forbidden", r#"{"error":{"message":"bad key"}}"#.into()).await;
        let p = GeminiProvider::from_config("k".into(), "m".into(), base);
        let err = p.complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_complete_stream_error_fails() {
        let body = format!(
            "{}data: {{\"error\":{{\"code\":500,\"message\":\"internal\",\"status\":\"INTERNAL\"}}}}\n\n",
            sse_event("partial")
        );
        let (base, _server) = serve_once("200 OK", body).await;
        let p = GeminiProvider::from_config("k".into(), "m".into(), base);
        assert!(p.complete("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_complete_empty_stream_fails() {
        let (base, _server) = serve_once("200 OK", String::new()).await;
        let p = GeminiProvider::from_config("k".into(), "m".into(), base);
        assert!(p.complete("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let p = GeminiProvider::from_config("k".into(), "m".into(), "http://127.0.0.1:1".into());
        assert!(p.complete("hi").await.is_err());
        assert!(!p.is_available().await);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let key = "AIzaSECRET123";
        let p = GeminiProvider::from_config(key.into(), "m".into(), "http://127.0.0.1:1".into());
        let err = p.complete("hi").await.unwrap_err().to_string();
        assert!(err.contains("gemini request failed"), "{err}");
        assert!(!err.contains(key), "key leaked: {err}");
    }

    #[tokio::test]
    async fn test_is_available_without_key() {
        let p = GeminiProvider::from_config(String::new(), "m".into(), "http://127.0.0.1:1".into());
        assert!(!p.is_available().await);
    }
}
