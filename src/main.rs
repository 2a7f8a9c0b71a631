use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

use pdf_qa::answer::AnswerExtractor;
use pdf_qa::confidence::ConfidenceGate;
use pdf_qa::config::PipelineConfig;
use pdf_qa::embeddings::Embedder;
use pdf_qa::huggingface::{HuggingFaceClient, HuggingFaceConfig};
use pdf_qa::rag::{run_batch, RagEngine};
use pdf_qa::server;

/// Question answering over a single PDF using retrieval-augmented generation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a list of questions about a document and print the results as JSON
    Ask {
        /// Path to the document to process (supports text and PDF)
        #[arg(index = 1)]
        file_path: PathBuf,
        /// Question to answer; repeat for several
        #[arg(short, long = "question", required = true)]
        questions: Vec<String>,
    },
    /// Index one document and answer questions over HTTP
    Serve {
        /// Document to index; defaults to FILE_PATH
        #[arg(long)]
        file: Option<PathBuf>,
        /// Address to listen on; defaults to BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration from environment
    let config = PipelineConfig::from_env()?;
    let hf_config = HuggingFaceConfig::from_env()?;
    let client = HuggingFaceClient::new(hf_config)?;

    // One embedding handle serves both indexing and queries
    let embedder: Arc<dyn Embedder> = Arc::new(client.embedder());
    let extractor = AnswerExtractor::new(Box::new(client.chat_model()))
        .with_timeout(config.llm_timeout)
        .with_max_context_chars(config.max_context_chars);
    let gate = ConfidenceGate::default().with_min_confidence(config.min_confidence);

    match args.command {
        Command::Ask {
            file_path,
            questions,
        } => {
            info!("Processing file: {}", file_path.display());
            let results = run_batch(
                &file_path,
                &questions,
                &config.chunk,
                embedder,
                extractor,
                gate,
                config.engine_options(),
            )
            .await
            .context("Failed to process document")?;

            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Serve { file, bind } => {
            let Some(file_path) = file.or_else(|| config.file_path.clone()) else {
                error!("No document given: pass --file or set FILE_PATH");
                return Err(anyhow::anyhow!("No document to serve"));
            };
            let bind = bind.unwrap_or_else(|| config.bind_addr.clone());

            info!("Indexing {}", file_path.display());
            let engine = RagEngine::from_file(
                &file_path,
                &config.chunk,
                embedder,
                extractor,
                gate,
                config.engine_options(),
            )
            .await
            .context("Failed to index document")?;

            server::serve(Arc::new(engine), &bind)
                .await
                .context("Server error")?;
        }
    }

    Ok(())
}
