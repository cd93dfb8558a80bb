//! Blocking client for OpenAI-compatible `chat/completions` streaming endpoints
//! (OpenAI, Groq, OpenRouter, Ollama, ...).

use super::{ChatMessage, CompletionClient};
use crate::log_debug;
use crate::relay::CancelToken;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const USER_AGENT: &str = concat!("asktty/", env!("CARGO_PKG_VERSION"));
/// Streaming answers can legitimately take minutes end to end.
const STREAMING_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct OpenAiClient {
    http: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ApiError,
}

/// One classified line of the server-sent event stream.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine {
    Skip,
    Content(String),
    Done,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(STREAMING_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: completions_endpoint(base_url),
        })
    }
}

impl CompletionClient for OpenAiClient {
    fn stream_chat(
        &self,
        messages: &[ChatMessage],
        cancel: &CancelToken,
        on_chunk: &mut dyn FnMut(String) -> ControlFlow<()>,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };
        log_debug(&format!(
            "openai: POST {} model={} messages={}",
            self.endpoint,
            self.model,
            messages.len()
        ));
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("request to completion endpoint failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "API error {}: {}",
                status.as_u16(),
                error_message_from_body(&body)
            );
        }

        let mut reader = BufReader::new(response);
        let mut line = String::new();
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            line.clear();
            let read = reader
                .read_line(&mut line)
                .context("failed to read streaming response")?;
            if read == 0 {
                return Ok(());
            }
            match parse_sse_line(&line)? {
                SseLine::Skip => {}
                SseLine::Done => return Ok(()),
                SseLine::Content(text) => {
                    if on_chunk(text).is_break() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn completions_endpoint(base_url: &str) -> String {
    let base = base_url.trim();
    let base = if base.is_empty() {
        DEFAULT_BASE_URL
    } else {
        base.trim_end_matches('/')
    };
    format!("{base}/chat/completions")
}

/// Classify a single SSE line. Errors only when the server embeds an error object.
pub(crate) fn parse_sse_line(line: &str) -> Result<SseLine> {
    let trimmed = line.trim();
    let Some(data) = trimmed.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    let payload: StreamPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(err) => {
            log_debug(&format!("openai: skipping undecodable SSE payload: {err}"));
            return Ok(SseLine::Skip);
        }
    };
    if let Some(error) = payload.error {
        return Err(anyhow!("API error: {}", error.message));
    }
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();
    if content.is_empty() {
        Ok(SseLine::Skip)
    } else {
        Ok(SseLine::Content(content))
    }
}

fn error_message_from_body(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_and_trims_slash() {
        assert_eq!(
            completions_endpoint(""),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_endpoint("http://localhost:11434/v1/"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn sse_content_and_done() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(
            parse_sse_line(line).unwrap(),
            SseLine::Content("Hel".into())
        );
        assert_eq!(parse_sse_line("data: [DONE]\n").unwrap(), SseLine::Done);
    }

    #[test]
    fn sse_skips_noise() {
        assert_eq!(parse_sse_line("\n").unwrap(), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseLine::Skip);
        assert_eq!(parse_sse_line("event: ping").unwrap(), SseLine::Skip);
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only).unwrap(), SseLine::Skip);
        let empty_choices = r#"data: {"choices":[]}"#;
        assert_eq!(parse_sse_line(empty_choices).unwrap(), SseLine::Skip);
    }

    #[test]
    fn sse_embedded_error_is_surfaced() {
        let line = r#"data: {"error":{"message":"rate limited"}}"#;
        let err = parse_sse_line(line).unwrap_err();
        assert!(format!("{err:#}").contains("rate limited"));
    }

    #[test]
    fn error_body_prefers_api_message() {
        assert_eq!(
            error_message_from_body(r#"{"error":{"message":"Incorrect API key"}}"#),
            "Incorrect API key"
        );
        assert_eq!(error_message_from_body("  bad gateway "), "bad gateway");
        assert_eq!(error_message_from_body(""), "empty response body");
    }
}
