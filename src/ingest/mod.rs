// Ingestion module
// Turns a document into page chunks, embedding and storing each page concurrently

pub mod source;


use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::database::ChunkStore;
use crate::database::sqlite::models::Document;
use crate::embeddings::EmbeddingProvider;
use crate::{FolioError, Result};

pub use source::{DocumentSource, PdfSource, TextSource, source_for_path};

/// Page number to page text, in page order
pub type PageMap = BTreeMap<u32, String>;

/// Everything a source got out of one file
///
/// A page is either in `pages` or, when its text could not be extracted, in
/// `unreadable` with the extraction error. Never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePages {
    pub pages: PageMap,
    pub unreadable: BTreeMap<u32, String>,
}

impl SourcePages {
    #[inline]
    pub fn len(&self) -> usize {
        self.pages.len() + self.unreadable.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.unreadable.is_empty()
    }
}

impl From<PageMap> for SourcePages {
    #[inline]
    fn from(pages: PageMap) -> Self {
        Self {
            pages,
            unreadable: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredChunk {
    pub chunk_id: i64,
    pub position: u32,
}

#[derive(Debug)]
pub struct PageFailure {
    pub position: u32,
    pub error: FolioError,
}

/// Settled outcome of one page, reported as pages finish
#[derive(Debug)]
pub enum PageOutcome<'a> {
    Stored(&'a StoredChunk),
    Failed(&'a PageFailure),
}

/// Result of ingesting one document
///
/// Pages succeed or fail independently. `stored` and `failed` are sorted by
/// position; `skipped` lists pages that were blank after whitespace
/// normalization.
#[derive(Debug)]
pub struct IngestReport {
    pub document_id: i64,
    pub stored: Vec<StoredChunk>,
    pub failed: Vec<PageFailure>,
    pub skipped: Vec<u32>,
}

impl IngestReport {
    #[inline]
    pub fn attempted(&self) -> usize {
        self.stored.len() + self.failed.len()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fails only when pages were attempted and none of them could be stored
    #[inline]
    pub fn into_result(self) -> Result<Self> {
        if self.stored.is_empty() && !self.failed.is_empty() {
            let first = &self.failed[0];
            return Err(FolioError::Ingestion(format!(
                "None of the {} pages of document {} could be stored (page {}: {})",
                self.failed.len(),
                self.document_id,
                first.position,
                first.error
            )));
        }
        Ok(self)
    }
}

/// Collapse runs of whitespace to single spaces and trim the ends
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Clone)]
pub struct ChunkingPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ChunkStore>,
    max_concurrency: usize,
}

impl ChunkingPipeline {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn ChunkStore>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Extract pages from `path`, then create the document and ingest them
    ///
    /// A source failure is returned before any document row exists. Pages the
    /// source could not read are reported as failures, not as blank pages.
    #[inline]
    pub async fn ingest_path<F>(
        &self,
        source: &dyn DocumentSource,
        path: &Path,
        mut on_page: F,
    ) -> Result<(Document, IngestReport)>
    where
        F: FnMut(PageOutcome<'_>) + Send,
    {
        let SourcePages { pages, unreadable } = source.pages(path).await?;
        info!(
            "Extracted {} pages from {} with the {} source ({} unreadable)",
            pages.len() + unreadable.len(),
            path.display(),
            source.name(),
            unreadable.len()
        );

        let document = self
            .store
            .create_document(&path.to_string_lossy())
            .await?;

        let mut unreadable_failures = Vec::with_capacity(unreadable.len());
        for (position, reason) in unreadable {
            warn!("Page {} has no extractable text: {}", position, reason);
            let entry = PageFailure {
                position,
                error: FolioError::Ingestion(format!(
                    "Failed to extract text from page {}: {}",
                    position, reason
                )),
            };
            on_page(PageOutcome::Failed(&entry));
            unreadable_failures.push(entry);
        }

        let mut report = self.ingest_with(document.id, pages, &mut on_page).await;
        if !unreadable_failures.is_empty() {
            report.failed.extend(unreadable_failures);
            report.failed.sort_by_key(|f| f.position);
        }

        Ok((document, report))
    }

    #[inline]
    pub async fn ingest(&self, document_id: i64, pages: PageMap) -> IngestReport {
        self.ingest_with(document_id, pages, |_| {}).await
    }

    /// Embed and store every non-blank page, calling `on_page` as each one settles
    #[inline]
    pub async fn ingest_with<F>(
        &self,
        document_id: i64,
        pages: PageMap,
        mut on_page: F,
    ) -> IngestReport
    where
        F: FnMut(PageOutcome<'_>) + Send,
    {
        let mut skipped = Vec::new();
        let mut work = Vec::with_capacity(pages.len());
        for (position, text) in pages {
            if normalize_whitespace(&text).is_empty() {
                debug!("Skipping blank page {}", position);
                skipped.push(position);
            } else {
                work.push((position, text));
            }
        }

        debug!(
            "Ingesting {} pages of document {} ({} blank, concurrency {})",
            work.len(),
            document_id,
            skipped.len(),
            self.max_concurrency
        );

        let mut outcomes = futures::stream::iter(work.into_iter().map(|(position, text)| {
            let embedder = Arc::clone(&self.embedder);
            let store = Arc::clone(&self.store);
            async move {
                let result = async {
                    let vector = embedder.embed(&text).await?;
                    store
                        .insert_chunk(document_id, i64::from(position), &text, &vector)
                        .await
                }
                .await;
                (position, result)
            }
        }))
        .buffer_unordered(self.max_concurrency);

        let mut stored = Vec::new();
        let mut failed = Vec::new();
        while let Some((position, result)) = outcomes.next().await {
            match result {
                Ok(chunk) => {
                    let entry = StoredChunk {
                        chunk_id: chunk.id,
                        position,
                    };
                    on_page(PageOutcome::Stored(&entry));
                    stored.push(entry);
                }
                Err(error) => {
                    warn!("Failed to store page {}: {}", position, error);
                    let entry = PageFailure { position, error };
                    on_page(PageOutcome::Failed(&entry));
                    failed.push(entry);
                }
            }
        }

        stored.sort_by_key(|s| s.position);
        failed.sort_by_key(|f| f.position);

        info!(
            "Document {} ingested: {} stored, {} failed, {} skipped",
            document_id,
            stored.len(),
            failed.len(),
            skipped.len()
        );

        IngestReport {
            document_id,
            stored,
            failed,
            skipped,
        }
    }
}
