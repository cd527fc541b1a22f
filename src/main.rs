//! # Document QA CLI (`docqa`)
//!
//! Runs the question-answering HTTP service, or answers a single question
//! from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa serve` | Start the HTTP server |
//! | `docqa ask "<question>"` | Answer one question, optionally grounded in PDFs |
//!
//! ## Examples
//!
//! ```bash
//! # Serve on the configured bind address
//! docqa serve
//!
//! # General question
//! docqa ask "What is photosynthesis?"
//!
//! # Grounded in local documents, asked and answered in Nepali
//! docqa ask "नेपालको राजधानी कहाँ हो?" --language ne --pdf report.pdf
//! ```
//!
//! API keys are read from the environment (`GEMINI_API_KEY`,
//! `OPENAI_API_KEY`); a `.env` file in the working directory is loaded first.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_qa::config;
use doc_qa::models::{Language, Mode, Query, UploadedFile};
use doc_qa::server;
use doc_qa::service::QaService;

/// Document-grounded question answering with English/Nepali translation.
#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// A missing file is not an error: built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Answer one question and print the response.
    ///
    /// With `--pdf`, the files are ingested first and the answer is grounded
    /// in them; without it the question is answered in general mode.
    Ask {
        /// The question text.
        query: String,

        /// Language of the question and the answer: `en` or `ne`.
        #[arg(long, default_value = "en", value_parser = parse_language)]
        language: Language,

        /// PDF files to ground the answer in. Repeatable.
        #[arg(long)]
        pdf: Vec<PathBuf>,
    },
}

fn parse_language(s: &str) -> Result<Language, String> {
    match s {
        "en" => Ok(Language::En),
        "ne" => Ok(Language::Ne),
        other => Err(format!("unsupported language '{}': expected en or ne", other)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask {
            query,
            language,
            pdf,
        } => {
            let service = QaService::from_config(&cfg)?;

            if !pdf.is_empty() {
                let mut files = Vec::with_capacity(pdf.len());
                for path in &pdf {
                    let bytes = tokio::fs::read(path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    files.push(UploadedFile::new(path.to_string_lossy(), bytes));
                }
                let report = service.ingest(files).await?;
                println!(
                    "Indexed {} files ({} pages, {} chunks)",
                    report.files, report.pages, report.chunks
                );
            }

            let answer = service.answer(&Query { query, language }).await?;
            let mode = match answer.mode {
                Mode::General => "general",
                Mode::Document => "document",
            };
            println!("[{} mode]", mode);
            println!("{}", answer.response);
            if !answer.complete || answer.truncated {
                println!("(response may be incomplete)");
            }

            // The scratch upload directory is not kept between CLI runs.
            if !pdf.is_empty() {
                service.clear().await;
            }
        }
    }

    Ok(())
}
