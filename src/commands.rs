use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::answer::{AnswerComposer, Transcript};
use crate::config::Config;
use crate::database::DocumentStore;
use crate::embeddings::build_embedding_provider;
use crate::generation::build_generative_service;
use crate::ingest::{ChunkingPipeline, PageOutcome, source_for_path};
use crate::retrieval::SimilarityRetriever;

async fn open_store(config: &Config) -> Result<Arc<DocumentStore>> {
    let store = DocumentStore::open(config)
        .await
        .context("Failed to open document store")?;
    Ok(Arc::new(store))
}

fn page_progress_bar() -> Result<ProgressBar> {
    if !console::user_attended_stderr() {
        return Ok(ProgressBar::hidden());
    }

    let style = ProgressStyle::with_template("{spinner} [{pos}] Embedding pages {msg}")
        .context("Invalid progress bar template")?;
    Ok(ProgressBar::new_spinner().with_style(style))
}

/// Extract, embed and store a PDF or text document
#[inline]
pub async fn load_document(path: &Path) -> Result<()> {
    let config = Config::load_default()?;
    let source = source_for_path(path)?;
    let store = open_store(&config).await?;
    let embedder = build_embedding_provider(&config)?;

    info!(
        "Loading {} with the {} embedder ({} pages at a time)",
        path.display(),
        embedder.name(),
        config.ingest.max_concurrency
    );
    println!("Loading {}...", path.display());

    let pipeline = ChunkingPipeline::new(embedder, store, config.ingest.max_concurrency);
    let bar = page_progress_bar()?;

    let (document, report) = pipeline
        .ingest_path(source.as_ref(), path, |outcome| {
            bar.inc(1);
            if let PageOutcome::Failed(failure) = outcome {
                bar.println(format!(
                    "Page {} failed: {}",
                    failure.position, failure.error
                ));
            }
        })
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    bar.finish_and_clear();

    println!("Created document: {} (ID: {})", document.name, document.id);
    println!("  Pages stored: {}", report.stored.len());
    if !report.skipped.is_empty() {
        println!("  Blank pages skipped: {}", report.skipped.len());
    }
    if !report.failed.is_empty() {
        println!("  Pages failed: {}", report.failed.len());
        for failure in &report.failed {
            println!("    - page {}: {}", failure.position, failure.error);
        }
    }

    report.into_result()?;
    Ok(())
}

/// Print the chunks most similar to `query`
#[inline]
pub async fn search(query: &str) -> Result<()> {
    let config = Config::load_default()?;
    let store = open_store(&config).await?;
    let retriever = SimilarityRetriever::new(build_embedding_provider(&config)?, store);

    let threshold = config.retrieval.threshold;
    let limit = config.retrieval.limit as usize;
    println!(
        "Searching for similar chunks... (limit: {}; similarity threshold: {})",
        limit, threshold
    );

    let started = Instant::now();
    let results = retriever
        .search(query, threshold, limit)
        .await
        .context("Search failed")?;
    let took = started.elapsed();

    if results.is_empty() {
        println!("No similar chunks found.");
        return Ok(());
    }

    println!(
        "Found {} similar chunk(s) in {:.2}s:\n",
        results.len(),
        took.as_secs_f64()
    );
    for result in &results {
        println!(
            "Chunk {} (document: {}; page: {}; similarity: {:.4})\n",
            result.chunk_id, result.document_id, result.position, result.similarity
        );
        println!("{}\n", result.content);
    }

    Ok(())
}

/// Answer `query` from the stored documents, streaming the reply to stdout
#[inline]
pub async fn ask(
    query: &str,
    threshold: Option<f32>,
    limit: Option<usize>,
    save: Option<&Path>,
) -> Result<()> {
    let config = Config::load_default()?;
    let store = open_store(&config).await?;
    let retriever = SimilarityRetriever::new(build_embedding_provider(&config)?, store);
    let generator = build_generative_service(&config)?;
    let composer =
        AnswerComposer::new(retriever, generator).with_retrieval_defaults(&config.retrieval);

    println!(
        "Searching for similar chunks... (limit: {}; similarity threshold: {})",
        limit.unwrap_or(composer.limit()),
        threshold.unwrap_or(composer.threshold())
    );
    println!("Response:\n");

    let mut stdout = std::io::stdout();
    let answer = composer
        .answer(query, threshold, limit, &mut stdout)
        .await
        .context("Failed to answer the question")?;
    println!("\n");

    println!(
        "Document search took: {:.2}s",
        answer.retrieval_time.as_secs_f64()
    );
    println!(
        "Response generation took: {:.2}s",
        answer.generation_time.as_secs_f64()
    );

    if answer.sources.is_empty() {
        println!("No similar chunks were found; the model answered without context.");
    } else {
        println!("Chunk(s) used to prompt the model:");
        for source in &answer.sources {
            println!(
                "\t- Chunk {}: document {}; page {}; similarity {:.4}",
                source.chunk_id, source.document_id, source.position, source.similarity
            );
        }
    }

    if let Some(path) = save {
        Transcript::new(&answer).save(path)?;
        println!("Transcript saved to {}", path.display());
    }

    Ok(())
}

/// List loaded documents with their chunk counts
#[inline]
pub async fn list_documents() -> Result<()> {
    let config = Config::load_default()?;
    let store = open_store(&config).await?;

    let documents = store
        .list_documents()
        .await
        .context("Failed to list documents")?;

    if documents.is_empty() {
        println!("No documents have been loaded yet.");
        println!("Use 'folio load -p <path>' to load one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();

    for document in &documents {
        println!("📄 {} (ID: {})", document.name, document.id);
        println!("   Chunks: {}", document.chunk_count);
        println!(
            "   Loaded: {}",
            document.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!();
    }

    let total_chunks: i64 = documents.iter().map(|d| d.chunk_count).sum();
    println!("Total chunks: {}", total_chunks);

    Ok(())
}

/// Report store connectivity, provider health and store consistency
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default()?;

    println!("📊 Folio Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Storage:");
    let store = match DocumentStore::open(&config).await {
        Ok(store) => {
            println!("   ✅ SQLite: {}", config.database_path().display());
            println!("   ✅ LanceDB: {}", config.vector_database_path().display());
            println!("   🔢 Dimensions: {}", store.dimensions());
            match store.vectors().validate_integrity().await {
                Ok(true) => println!("   ✅ Vector table: Readable"),
                Ok(false) => println!("   ⚠️  Vector table: Missing or unreadable"),
                Err(e) => println!("   ❌ Vector table: {}", e),
            }
            Some(store)
        }
        Err(e) => {
            println!("   ❌ Failed to open document store - {}", e);
            None
        }
    };

    println!();
    println!("🧮 Embedding provider ({}):", config.embedding.provider);
    match build_embedding_provider(&config) {
        Ok(embedder) => match embedder.health_check().await {
            Ok(()) => println!("   ✅ {}: Healthy", embedder.name()),
            Err(e) => {
                warn!("Embedding provider health check failed: {}", e);
                println!("   ⚠️  {}: Unhealthy - {}", embedder.name(), e);
            }
        },
        Err(e) => println!("   ❌ Not configured - {}", e),
    }

    println!();
    println!("🤖 Generation provider ({}):", config.generation.provider);
    match build_generative_service(&config) {
        Ok(generator) => match generator.health_check().await {
            Ok(()) => println!("   ✅ {}: Healthy", generator.name()),
            Err(e) => {
                warn!("Generation provider health check failed: {}", e);
                println!("   ⚠️  {}: Unhealthy - {}", generator.name(), e);
            }
        },
        Err(e) => println!("   ❌ Not configured - {}", e),
    }

    let Some(store) = store else {
        return Ok(());
    };

    println!();
    println!("🔍 Consistency:");
    let report = store
        .consistency_report()
        .await
        .context("Failed to check store consistency")?;
    println!("   Chunk rows: {}", report.sqlite_chunks);
    println!("   Embedding rows: {}", report.vector_rows);

    if report.is_consistent {
        println!("   ✅ Every chunk has exactly one embedding");
    } else {
        if !report.missing_embeddings.is_empty() {
            println!(
                "   ⚠️  Chunks without embeddings: {:?}",
                report.missing_embeddings
            );
        }
        if !report.orphaned_embeddings.is_empty() {
            println!(
                "   ⚠️  Embeddings without chunks: {:?}",
                report.orphaned_embeddings
            );
        }
    }

    Ok(())
}

/// Join the arguments with single spaces
#[inline]
pub fn echo(args: &[String]) -> String {
    args.join(" ")
}
