
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ChatMessage, GenerativeService, LineEvent, TextStream, pump_lines};
use crate::config::OpenAiConfig;
use crate::http::{HttpClient, StreamReader};
use crate::{FolioError, Result};

/// Answers from the OpenAI Responses API, streamed as server-sent events
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    api_url: Url,
    api_key: String,
    model: String,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamingEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<serde_json::Value>,
}

impl OpenAiChat {
    #[inline]
    pub fn new(config: &OpenAiConfig, http: HttpClient) -> Result<Self> {
        let api_url = config
            .api_url()
            .map_err(|e| FolioError::Config(e.to_string()))?;
        let api_key = config.api_key().ok_or_else(|| {
            FolioError::Config(format!(
                "Environment variable {} is not set",
                config.api_key_env
            ))
        })?;

        Ok(Self {
            api_url,
            api_key,
            model: config.chat_model.clone(),
            http,
        })
    }

    fn open(&self, messages: &[ChatMessage]) -> Result<StreamReader> {
        let url = self
            .api_url
            .join("responses")
            .map_err(|e| FolioError::Config(format!("Failed to build responses URL: {}", e)))?;
        let request = ResponsesRequest {
            model: &self.model,
            input: messages,
            stream: true,
        };
        let body = serde_json::to_string(&request).map_err(|e| {
            FolioError::Provider(format!("Failed to serialize responses request: {}", e))
        })?;

        debug!(
            "Opening OpenAI response stream with model {} ({} messages)",
            self.model,
            messages.len()
        );
        self.http
            .post_json_streaming(&url, Some(&self.api_key), &body)
    }
}

/// Interpret one line of a Responses API event stream
///
/// Only `data:` lines carry payloads; `event:` names repeat the payload's
/// `type` and are ignored.
pub(crate) fn parse_event_line(line: &str) -> Result<LineEvent> {
    let Some(payload) = line.trim_end().strip_prefix("data:") else {
        return Ok(LineEvent::Skip);
    };
    let payload = payload.trim();

    if payload.is_empty() {
        return Ok(LineEvent::Skip);
    }
    if payload == "[DONE]" {
        return Ok(LineEvent::Done);
    }

    let event: StreamingEvent = serde_json::from_str(payload)
        .map_err(|e| FolioError::Provider(format!("Malformed OpenAI stream event: {}", e)))?;

    match event.kind.as_str() {
        "response.output_text.delta" => Ok(event
            .delta
            .filter(|d| !d.is_empty())
            .map_or(LineEvent::Skip, LineEvent::Fragment)),
        "response.completed" => Ok(LineEvent::Done),
        "response.failed" | "response.incomplete" => {
            let reason = event
                .response
                .as_ref()
                .and_then(|r| {
                    r.pointer("/error/message")
                        .or_else(|| r.pointer("/incomplete_details/reason"))
                })
                .and_then(serde_json::Value::as_str)
                .unwrap_or(event.kind.as_str());
            Err(FolioError::Provider(format!(
                "OpenAI response did not complete: {}",
                reason
            )))
        }
        "error" => Err(FolioError::Provider(format!(
            "OpenAI stream error: {}",
            event.message.as_deref().unwrap_or("unknown error")
        ))),
        other => {
            debug!("Ignoring OpenAI stream event {}", other);
            Ok(LineEvent::Skip)
        }
    }
}

#[async_trait]
impl GenerativeService for OpenAiChat {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream> {
        let client = self.clone();

        let reader = tokio::task::spawn_blocking(move || client.open(&messages))
            .await
            .map_err(|e| FolioError::Provider(format!("Chat task failed: {}", e)))??;

        Ok(pump_lines("openai", reader, parse_event_line))
    }

    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<()> {
        let client = self.clone();

        tokio::task::spawn_blocking(move || {
            let url = client
                .api_url
                .join("models")
                .map_err(|e| FolioError::Config(format!("Failed to build models URL: {}", e)))?;
            client.http.get_text(&url, Some(&client.api_key)).map(|_| ())
        })
        .await
        .map_err(|e| FolioError::Provider(format!("Health check task failed: {}", e)))?
    }
}
