use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use folio::commands::{ask, echo, list_documents, load_document, search, show_status};
use folio::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Ask questions about your documents with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure providers, retrieval defaults and storage
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load a PDF, text or markdown document
    Load {
        /// Path of the document to load
        #[arg(short, long)]
        path: PathBuf,
    },
    /// Show the stored chunks most similar to a query
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Answer a question using the most similar stored chunks as context
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Minimum similarity (exclusive) for a chunk to be used, between 0 and 1
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f32>,
        /// Maximum number of chunks to use
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        limit: Option<u32>,
        /// Write a markdown transcript of the answer to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// List loaded documents
    List,
    /// Show storage, provider and consistency status
    Status,
    /// Print the arguments back
    Echo {
        #[arg(num_args = 0.., trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn parse_threshold(value: &str) -> Result<f32, String> {
    let threshold: f32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;

    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(format!("threshold must be between 0 and 1, got {}", threshold))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Load { path } => {
            load_document(&path).await?;
        }
        Commands::Search { query } => {
            search(&query.join(" ")).await?;
        }
        Commands::Ask {
            query,
            threshold,
            limit,
            save,
        } => {
            ask(
                &query.join(" "),
                threshold,
                limit.map(|l| l as usize),
                save.as_deref(),
            )
            .await?;
        }
        Commands::List => {
            list_documents().await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Echo { args } => {
            println!("{}", echo(&args));
        }
    }

    Ok(())
}
