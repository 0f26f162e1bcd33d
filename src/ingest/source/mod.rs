#[cfg(test)]
mod tests;

use std::path::Path;

use async_trait::async_trait;
use lopdf::Document;
use tracing::{debug, warn};

use super::{PageMap, SourcePages};
use crate::{FolioError, Result};

/// Splits a file into numbered pages of text
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn pages(&self, path: &Path) -> Result<SourcePages>;

    fn name(&self) -> &str;
}

/// One entry per PDF page, numbered from 1
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfSource;

/// Plain text and markdown; form feeds separate pages
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSource;

const PAGE_BREAK: char = '\x0c';

/// Choose a source from the file extension
#[inline]
pub fn source_for_path(path: &Path) -> Result<Box<dyn DocumentSource>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => Ok(Box::new(PdfSource)),
        "txt" | "md" | "markdown" | "text" => Ok(Box::new(TextSource)),
        _ => Err(FolioError::Ingestion(format!(
            "Unsupported file type: {} (expected .pdf, .txt or .md)",
            path.display()
        ))),
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        FolioError::Ingestion(format!("Failed to read {}: {}", path.display(), e))
    })
}

/// Extract per-page text from an in-memory PDF
///
/// A page whose text cannot be extracted lands in `unreadable`; only a file
/// that cannot be parsed at all is an error.
#[inline]
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<SourcePages> {
    let document = Document::load_mem(bytes)
        .map_err(|e| FolioError::Ingestion(format!("Failed to parse PDF: {}", e)))?;

    if document.is_encrypted() {
        return Err(FolioError::Ingestion(
            "Encrypted PDFs are not supported".to_string(),
        ));
    }

    let mut extracted = SourcePages::default();
    for page_number in document.get_pages().into_keys() {
        match document.extract_text(&[page_number]) {
            Ok(text) => {
                extracted.pages.insert(page_number, text);
            }
            Err(e) => {
                warn!("Failed to extract text from page {}: {}", page_number, e);
                extracted.unreadable.insert(page_number, e.to_string());
            }
        }
    }

    debug!(
        "Extracted text from {} of {} PDF pages",
        extracted.pages.len(),
        extracted.len()
    );
    Ok(extracted)
}

/// Split text into pages at form feeds
#[inline]
pub fn split_text_pages(text: &str) -> PageMap {
    text.split(PAGE_BREAK)
        .enumerate()
        .map(|(index, page)| (index as u32 + 1, page.to_string()))
        .collect()
}

#[async_trait]
impl DocumentSource for PdfSource {
    async fn pages(&self, path: &Path) -> Result<SourcePages> {
        debug!("Extracting PDF: {:?}", path);
        let bytes = read_file(path).await?;

        tokio::task::spawn_blocking(move || extract_pdf_pages(&bytes))
            .await
            .map_err(|e| FolioError::Ingestion(format!("PDF extraction task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

#[async_trait]
impl DocumentSource for TextSource {
    async fn pages(&self, path: &Path) -> Result<SourcePages> {
        let bytes = read_file(path).await?;
        let text = String::from_utf8(bytes).map_err(|e| {
            FolioError::Ingestion(format!("{} is not valid UTF-8: {}", path.display(), e))
        })?;

        Ok(split_text_pages(&text).into())
    }

    fn name(&self) -> &str {
        "text"
    }
}
