//! Accumulator for Gemini's `alt=sse` stream.
//!
//! Bytes arrive in arbitrary chunks; lines are only decoded once complete so
//! a fragment split across chunks (or across a UTF-8 sequence) is never lost.

use serde::Deserialize;
use silvia_core::error::SilviaError;

#[derive(Deserialize)]
pub(crate) struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Collects text fragments from SSE `data:` lines in arrival order.
#[derive(Default)]
pub(crate) struct SseAccumulator {
    pending: Vec<u8>,
    text: String,
    events: usize,
}

impl SseAccumulator {
    /// Feed raw bytes; complete lines are decoded immediately.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), SilviaError> {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.line(&line[..pos])?;
        }
        Ok(())
    }

    /// Flush the trailing line and return `(text, data_events)`.
    pub fn finish(mut self) -> Result<(String, usize), SilviaError> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.line(&rest)?;
        }
        Ok((self.text, self.events))
    }

    fn line(&mut self, raw: &[u8]) -> Result<(), SilviaError> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| SilviaError::Provider(format!("gemini: invalid utf-8 in stream: {e}")))?
            .trim_end_matches('\r');

        // Blank separators, comments, and `event:`/`id:` fields carry no text.
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim_start();
        if data.is_empty() || data == "[DONE]" {
            return Ok(());
        }

        let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
            SilviaError::Provider(format!("gemini: malformed stream event: {e}"))
        })?;
        if let Some(err) = chunk.error {
            return Err(SilviaError::Provider(format!(
                "gemini stream error {} {}: {}",
                err.code, err.status, err.message
            )));
        }

        self.events += 1;
        if let Some(content) = chunk.candidates.into_iter().next().and_then(|c| c.content) {
            for part in content.parts {
                if let Some(text) = part.text {
                    self.text.push_str(&text);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
            })
        )
    }

    #[test]
    fn test_concatenates_fragments_in_order() {
        let mut acc = SseAccumulator::default();
        acc.push(event("Silver").as_bytes()).unwrap();
        acc.push(event("Stream ").as_bytes()).unwrap();
        acc.push(event("Sehat").as_bytes()).unwrap();
        let (text, events) = acc.finish().unwrap();
        assert_eq!(text, "SilverStream Sehat");
        assert_eq!(events, 3);
    }

    #[test]
    fn test_fragments_split_across_chunks() {
        let stream = format!("{}{}", event("Halo, "), event("apa kabar? é"));
        let bytes = stream.as_bytes();
        let mut acc = SseAccumulator::default();
        // Feed in 7-byte slices to cut through JSON, CRLF, and the 2-byte 'é'.
        for piece in bytes.chunks(7) {
            acc.push(piece).unwrap();
        }
        assert_eq!(acc.finish().unwrap().0, "Halo, apa kabar? é");
    }

    #[test]
    fn test_multiple_parts_in_one_event() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#;
        let mut acc = SseAccumulator::default();
        acc.push(line.as_bytes()).unwrap();
        assert_eq!(acc.finish().unwrap().0, "ab");
    }

    #[test]
    fn test_only_first_candidate_used() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"one"}]}},{"content":{"parts":[{"text":"two"}]}}]}"#;
        let mut acc = SseAccumulator::default();
        acc.push(format!("{line}\n").as_bytes()).unwrap();
        assert_eq!(acc.finish().unwrap().0, "one");
    }

    #[test]
    fn test_trailing_line_without_newline() {
        let mut acc = SseAccumulator::default();
        acc.push(event("first").as_bytes()).unwrap();
        acc.push(br#"data: {"candidates":[{"content":{"parts":[{"text":" last"}]}}]}"#)
            .unwrap();
        assert_eq!(acc.finish().unwrap().0, "first last");
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut acc = SseAccumulator::default();
        acc.push(b": keep-alive\nevent: message\nid: 1\n\n").unwrap();
        acc.push(event("ok").as_bytes()).unwrap();
        acc.push(b"data: [DONE]\n").unwrap();
        assert_eq!(acc.finish().unwrap(), ("ok".to_string(), 1));
    }

    #[test]
    fn test_candidate_without_content_adds_nothing() {
        let mut acc = SseAccumulator::default();
        acc.push(b"data: {\"candidates\":[{\"finishReason\":\"SAFETY\"}]}\n")
            .unwrap();
        assert_eq!(acc.finish().unwrap(), (String::new(), 1));
    }

    #[test]
    fn test_malformed_data_line_fails() {
        let mut acc = SseAccumulator::default();
        acc.push(event("fine").as_bytes()).unwrap();
        let err = acc.push(b"data: {\"candidates\": [\n").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_error_object_fails() {
        let mut acc = SseAccumulator::default();
        let err = acc
            .push(b"data: {\"error\":{\"code\":429,\"message\":\"quota\",\"status\":\"RESOURCE_EXHAUSTED\"}}\n")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("quota"));
    }
}
