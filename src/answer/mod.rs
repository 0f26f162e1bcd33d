// Answer module
// Grounds a chat model's answer in the chunks retrieved for the user's question

pub mod transcript;


use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::Result;
use crate::config::{DEFAULT_RESULT_LIMIT, DEFAULT_SIMILARITY_THRESHOLD, RetrievalConfig};
use crate::generation::{ChatMessage, GenerativeService};
use crate::retrieval::{SimilarityResult, SimilarityRetriever};

pub use transcript::Transcript;

const CONTEXT_PREAMBLE: &str = "Here is some information you can use in your response:\n";

/// A generated answer together with the chunks that grounded it
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub text: String,
    pub sources: Vec<SimilarityResult>,
    pub retrieval_time: Duration,
    pub generation_time: Duration,
}

/// Chat messages for `query`: a context message when anything was retrieved, then the question
#[inline]
pub fn build_messages(query: &str, sources: &[SimilarityResult]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);

    if !sources.is_empty() {
        let context = sources
            .iter()
            .map(|source| source.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        messages.push(ChatMessage::system(format!("{}{}", CONTEXT_PREAMBLE, context)));
    }

    messages.push(ChatMessage::user(query));
    messages
}

pub struct AnswerComposer {
    retriever: SimilarityRetriever,
    generator: Arc<dyn GenerativeService>,
    threshold: f32,
    limit: usize,
}

impl AnswerComposer {
    #[inline]
    pub fn new(retriever: SimilarityRetriever, generator: Arc<dyn GenerativeService>) -> Self {
        Self {
            retriever,
            generator,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            limit: DEFAULT_RESULT_LIMIT as usize,
        }
    }

    /// Use the configured retrieval defaults instead of the built-in ones
    #[inline]
    pub fn with_retrieval_defaults(mut self, retrieval: &RetrievalConfig) -> Self {
        self.threshold = retrieval.threshold;
        self.limit = retrieval.limit as usize;
        self
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Retrieve context for `query`, then stream the model's answer into `sink`
    ///
    /// Each fragment is written and flushed as it arrives. `threshold` and
    /// `limit` fall back to the composer's defaults when `None`.
    #[inline]
    pub async fn answer<W>(
        &self,
        query: &str,
        threshold: Option<f32>,
        limit: Option<usize>,
        sink: &mut W,
    ) -> Result<Answer>
    where
        W: Write + Send + ?Sized,
    {
        let threshold = threshold.unwrap_or(self.threshold);
        let limit = limit.unwrap_or(self.limit);

        let started = Instant::now();
        let sources = self.retriever.search(query, threshold, limit).await?;
        let retrieval_time = started.elapsed();
        info!(
            "Retrieved {} chunks in {:.2?} (threshold: {}, limit: {})",
            sources.len(),
            retrieval_time,
            threshold,
            limit
        );

        let messages = build_messages(query, &sources);
        debug!(
            "Prompting {} with {} messages",
            self.generator.name(),
            messages.len()
        );

        let started = Instant::now();
        let mut stream = self.generator.stream(messages).await?;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            sink.write_all(fragment.as_bytes())?;
            sink.flush()?;
            text.push_str(&fragment);
        }
        let generation_time = started.elapsed();
        info!(
            "Generated {} characters in {:.2?}",
            text.len(),
            generation_time
        );

        Ok(Answer {
            query: query.to_string(),
            text,
            sources,
            retrieval_time,
            generation_time,
        })
    }
}
