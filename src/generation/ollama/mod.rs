
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ChatMessage, GenerativeService, LineEvent, TextStream, pump_lines};
use crate::config::OllamaConfig;
use crate::http::{HttpClient, StreamReader};
use crate::{FolioError, Result};

/// Chat completions from Ollama's `/api/chat`, streamed as NDJSON
#[derive(Debug, Clone)]
pub struct OllamaChat {
    base_url: Url,
    model: String,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChat {
    #[inline]
    pub fn new(config: &OllamaConfig, http: HttpClient) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .map_err(|e| FolioError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            model: config.chat_model.clone(),
            http,
        })
    }

    fn open(&self, messages: &[ChatMessage]) -> Result<StreamReader> {
        let url = self
            .base_url
            .join("/api/chat")
            .map_err(|e| FolioError::Config(format!("Failed to build chat URL: {}", e)))?;
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| FolioError::Provider(format!("Failed to serialize chat request: {}", e)))?;

        debug!(
            "Opening Ollama chat stream with model {} ({} messages)",
            self.model,
            messages.len()
        );
        self.http.post_json_streaming(&url, None, &body)
    }
}

/// Interpret one NDJSON line of an Ollama chat stream
pub(crate) fn parse_chat_line(line: &str) -> Result<LineEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineEvent::Skip);
    }

    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| FolioError::Provider(format!("Malformed Ollama stream line: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(FolioError::Provider(format!("Ollama error: {}", error)));
    }

    if chunk.done {
        return Ok(LineEvent::Done);
    }

    match chunk.message {
        Some(message) if !message.content.is_empty() => Ok(LineEvent::Fragment(message.content)),
        _ => Ok(LineEvent::Skip),
    }
}

#[async_trait]
impl GenerativeService for OllamaChat {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream> {
        let client = self.clone();

        let reader = tokio::task::spawn_blocking(move || client.open(&messages))
            .await
            .map_err(|e| FolioError::Provider(format!("Chat task failed: {}", e)))??;

        Ok(pump_lines("ollama", reader, parse_chat_line))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<()> {
        let client = self.clone();

        tokio::task::spawn_blocking(move || {
            let url = client
                .base_url
                .join("/api/version")
                .map_err(|e| FolioError::Config(format!("Failed to build version URL: {}", e)))?;
            client.http.get_text(&url, None).map(|_| ())
        })
        .await
        .map_err(|e| FolioError::Provider(format!("Health check task failed: {}", e)))?
    }
}
