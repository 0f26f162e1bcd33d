//! Markdown record of one question and its answer.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::Answer;
use crate::{FolioError, Result};

#[derive(Debug, Clone)]
pub struct Transcript<'a> {
    answer: &'a Answer,
    created_at: DateTime<Utc>,
}

impl<'a> Transcript<'a> {
    #[inline]
    pub fn new(answer: &'a Answer) -> Self {
        Self {
            answer,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn with_timestamp(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    #[inline]
    pub fn render(&self) -> String {
        let answer = self.answer;
        let mut out = String::new();

        // Writing to a String cannot fail
        let _ = writeln!(out, "# {}", answer.query.trim());
        let _ = writeln!(out);
        let _ = writeln!(out, "_Asked {}_", self.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out);
        let _ = writeln!(out, "## Answer");
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", answer.text.trim_end());
        let _ = writeln!(out);
        let _ = writeln!(out, "## Sources");
        let _ = writeln!(out);

        if answer.sources.is_empty() {
            let _ = writeln!(out, "No chunks passed the similarity threshold.");
        } else {
            for source in &answer.sources {
                let _ = writeln!(
                    out,
                    "- Chunk {} (document {}, page {}, similarity {:.4})",
                    source.chunk_id, source.document_id, source.position, source.similarity
                );
                let _ = writeln!(out);
                for line in source.content.lines() {
                    if line.trim().is_empty() {
                        let _ = writeln!(out, "  >");
                    } else {
                        let _ = writeln!(out, "  > {}", line);
                    }
                }
                let _ = writeln!(out);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Retrieval took {:.2}s, generation took {:.2}s.",
            answer.retrieval_time.as_secs_f64(),
            answer.generation_time.as_secs_f64()
        );

        out
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()).map_err(|e| {
            FolioError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write transcript to {}: {}", path.display(), e),
            ))
        })
    }
}
