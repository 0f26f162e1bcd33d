// Generation module
// Streams answers from a chat model as text fragments

pub mod ollama;
pub mod openai;


use std::io::BufRead;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{Config, GenerationProviderKind};
use crate::http::HttpClient;
use crate::{FolioError, Result};

pub use ollama::OllamaChat;
pub use openai::OpenAiChat;

const STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Ordered text fragments of one generated answer
///
/// Ends after the provider's completion marker. A transport or protocol
/// failure mid-stream arrives as a final `Err` item.
#[derive(Debug)]
pub struct TextStream {
    receiver: mpsc::Receiver<Result<String>>,
}

impl TextStream {
    #[inline]
    pub fn new(receiver: mpsc::Receiver<Result<String>>) -> Self {
        Self { receiver }
    }

    /// A finished stream over already known fragments
    #[inline]
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let fragments: Vec<String> = fragments.into_iter().collect();
        let (sender, receiver) = mpsc::channel(fragments.len().max(1));
        for fragment in fragments {
            // Capacity covers every fragment, so this cannot fill up
            let _ = sender.try_send(Ok(fragment));
        }
        Self { receiver }
    }

    #[inline]
    pub async fn next(&mut self) -> Option<Result<String>> {
        self.receiver.recv().await
    }

    /// Drain the stream into one string
    #[inline]
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// Produces a streamed answer for a list of role-tagged messages
#[async_trait]
pub trait GenerativeService: Send + Sync {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream>;

    fn name(&self) -> &str;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// What one line of a streaming response means
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineEvent {
    Fragment(String),
    Done,
    Skip,
}

/// Read a line-oriented response on the blocking pool and forward fragments
pub(crate) fn pump_lines<R>(
    provider: &'static str,
    reader: R,
    parse: fn(&str) -> Result<LineEvent>,
) -> TextStream
where
    R: BufRead + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(STREAM_BUFFER);

    tokio::task::spawn_blocking(move || {
        let mut fragments = 0_usize;

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(
                        "{} stream read failed after {} fragments: {}",
                        provider, fragments, e
                    );
                    let _ = sender.blocking_send(Err(FolioError::Provider(format!(
                        "{} stream read failed: {}",
                        provider, e
                    ))));
                    return;
                }
            };

            match parse(&line) {
                Ok(LineEvent::Fragment(text)) => {
                    fragments += 1;
                    if sender.blocking_send(Ok(text)).is_err() {
                        debug!("{} stream receiver dropped, stopping", provider);
                        return;
                    }
                }
                Ok(LineEvent::Done) => {
                    debug!("{} stream completed with {} fragments", provider, fragments);
                    return;
                }
                Ok(LineEvent::Skip) => {}
                Err(e) => {
                    let _ = sender.blocking_send(Err(e));
                    return;
                }
            }
        }

        warn!("{} stream ended without a completion marker", provider);
        let _ = sender.blocking_send(Err(FolioError::Provider(format!(
            "{} stream ended before completion",
            provider
        ))));
    });

    TextStream::new(receiver)
}

/// Build the generative service selected in the configuration
#[inline]
pub fn build_generative_service(config: &Config) -> Result<Arc<dyn GenerativeService>> {
    let http = HttpClient::new(&config.http);

    let service: Arc<dyn GenerativeService> = match config.generation.provider {
        GenerationProviderKind::OpenAi => Arc::new(OpenAiChat::new(&config.openai, http)?),
        GenerationProviderKind::Ollama => Arc::new(OllamaChat::new(&config.ollama, http)?),
    };

    Ok(service)
}
