mod chat;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use roadcode_rag_core::config::{
    DEFAULT_CHAT_MODEL, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_MODEL, DEFAULT_HISTORY_PATH,
    DEFAULT_INDEX_DIR, DEFAULT_OLLAMA_URL,
};
use roadcode_rag_core::{
    build_index, ingest_document, read_test_cases, run_evaluation, write_results,
    CharacterNgramEmbedder, ChatSession, Embedder, IngestionOptions, OllamaClient,
    OllamaEmbedder, OllamaGenerator, RagConfig, RagError, SimilarityMetric, VectorIndex,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_PDF: &str = "road_users_code_2020_eng.pdf";
const DEFAULT_CASES: &str = "test_case.csv";
const DEFAULT_RESULTS: &str = "rag_test_results.csv";

#[derive(Parser)]
#[command(name = "roadcode-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding the vector index
    #[arg(long, env = "ROADCODE_INDEX_DIR", default_value = DEFAULT_INDEX_DIR, global = true)]
    index_dir: PathBuf,

    /// Vector index collection name
    #[arg(long, env = "ROADCODE_COLLECTION", default_value = DEFAULT_COLLECTION, global = true)]
    collection: String,

    /// Chat history file
    #[arg(long, env = "ROADCODE_HISTORY", default_value = DEFAULT_HISTORY_PATH, global = true)]
    history: PathBuf,

    /// Ollama base URL
    #[arg(long, env = "ROADCODE_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL, global = true)]
    ollama_url: String,

    /// Embedding model served by Ollama
    #[arg(long, env = "ROADCODE_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    embedding_model: String,

    /// Chat model served by Ollama
    #[arg(long, env = "ROADCODE_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL, global = true)]
    chat_model: String,

    /// Chunks fetched per query variant
    #[arg(long, env = "ROADCODE_TOP_K", default_value = "4", global = true)]
    top_k: usize,

    /// Similarity metric used when building the index (cosine, dot, euclidean)
    #[arg(long, env = "ROADCODE_METRIC", default_value = "cosine", global = true)]
    metric: SimilarityMetric,

    /// Number of paraphrases requested per question
    #[arg(long, env = "ROADCODE_VARIANTS", default_value = "5", global = true)]
    variants: usize,

    /// Also search with the question as typed
    #[arg(long, env = "ROADCODE_INCLUDE_ORIGINAL", default_value_t = false, global = true)]
    include_original: bool,

    /// Conversation turns included in the prompt
    #[arg(long, env = "ROADCODE_HISTORY_WINDOW", default_value = "10", global = true)]
    history_window: usize,

    /// Seconds to wait for one generation
    #[arg(long, env = "ROADCODE_TIMEOUT_SECS", default_value = "120", global = true)]
    timeout_secs: u64,

    /// Embed with the offline trigram embedder instead of Ollama
    #[arg(long, default_value_t = false, global = true)]
    offline_embeddings: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Split the PDF into chunks and build the vector index.
    Train {
        /// Source PDF
        #[arg(long, default_value = DEFAULT_PDF)]
        pdf: PathBuf,
        /// Characters per chunk
        #[arg(long, default_value = "500")]
        chunk_size: usize,
        /// Characters shared by neighbouring chunks
        #[arg(long, default_value = "100")]
        chunk_overlap: usize,
        /// Do not ask Ollama to pull the models first.
        #[arg(long, default_value_t = false)]
        skip_pull: bool,
    },
    /// Ask questions interactively.
    Chat,
    /// Answer every question of a CSV file and write a results table.
    Test {
        /// Headerless question,expected_answer file
        #[arg(long, default_value = DEFAULT_CASES)]
        cases: PathBuf,
        /// Where to write the results table
        #[arg(long, default_value = DEFAULT_RESULTS)]
        output: PathBuf,
    },
}

impl Cli {
    fn rag_config(&self) -> RagConfig {
        RagConfig {
            index_dir: self.index_dir.clone(),
            collection: self.collection.clone(),
            history_path: self.history.clone(),
            ollama_url: self.ollama_url.clone(),
            embedding_model: self.embedding_model.clone(),
            chat_model: self.chat_model.clone(),
            top_k: self.top_k,
            metric: self.metric,
            expansion_variants: self.variants,
            include_original_query: self.include_original,
            history_window: self.history_window,
            generation_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.rag_config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "roadcode-rag boot"
    );

    let client = OllamaClient::new(&config.ollama_url)?;
    match cli.command {
        Some(command) => dispatch(command, &config, &client, cli.offline_embeddings).await,
        None => menu(&config, &client, cli.offline_embeddings).await,
    }
}

async fn dispatch(
    command: Command,
    config: &RagConfig,
    client: &OllamaClient,
    offline_embeddings: bool,
) -> anyhow::Result<()> {
    if offline_embeddings {
        let embedder = CharacterNgramEmbedder::default();
        run_command(command, config, client, embedder).await
    } else {
        let embedder = OllamaEmbedder::new(client.clone(), config.embedding_model.clone());
        run_command(command, config, client, embedder).await
    }
}

async fn run_command<E>(
    command: Command,
    config: &RagConfig,
    client: &OllamaClient,
    embedder: E,
) -> anyhow::Result<()>
where
    E: Embedder + Send + Sync,
{
    match command {
        Command::Train {
            pdf,
            chunk_size,
            chunk_overlap,
            skip_pull,
        } => {
            let options = IngestionOptions {
                chunk_size,
                chunk_overlap,
            };
            let mut models = Vec::new();
            if !skip_pull {
                if embedder.model_name() == config.embedding_model {
                    models.push(config.embedding_model.as_str());
                }
                models.push(config.chat_model.as_str());
            }
            train(config, client, &embedder, &pdf, &options, &models).await
        }
        Command::Chat => {
            let generator = OllamaGenerator::new(client.clone(), config.chat_model.clone());
            let mut session = ChatSession::open(config, embedder, generator).await?;
            chat::run(&mut session).await
        }
        Command::Test { cases, output } => {
            let generator = OllamaGenerator::new(client.clone(), config.chat_model.clone());
            evaluate(config, embedder, generator, &cases, &output).await
        }
    }
}

async fn train<E>(
    config: &RagConfig,
    client: &OllamaClient,
    embedder: &E,
    pdf: &Path,
    options: &IngestionOptions,
    models_to_pull: &[&str],
) -> anyhow::Result<()>
where
    E: Embedder + Sync,
{
    println!("Loading PDF document...");
    let chunks = ingest_document(pdf, options)
        .with_context(|| format!("could not ingest {}", pdf.display()))?;
    println!("Split document into {} chunks", chunks.len());

    if !models_to_pull.is_empty() {
        println!("Pulling necessary models from ollama...");
        for model in models_to_pull {
            client
                .pull(model)
                .await
                .with_context(|| format!("could not pull {model}"))?;
        }
    }

    println!("Creating vector database...");
    let store = build_index(chunks, embedder, config).await?;
    println!(
        "Vector database with {} chunks saved to '{}' at {}",
        store.len(),
        config.index_dir.display(),
        Utc::now().to_rfc3339()
    );
    Ok(())
}

async fn evaluate<E>(
    config: &RagConfig,
    embedder: E,
    generator: OllamaGenerator,
    cases_path: &Path,
    output: &Path,
) -> anyhow::Result<()>
where
    E: Embedder + Send + Sync,
{
    println!("Initializing RAG model...");
    let mut session = ChatSession::open(config, embedder, generator).await?;

    println!("Loading test cases...");
    let cases = read_test_cases(cases_path)?;
    println!("Testing {} questions...", cases.len());

    let report = run_evaluation(&mut session, &cases, |done, total| {
        let percent = done * 100 / total.max(1);
        print!("\rTesting questions: {done}/{total} [{percent}%]");
        let _ = io::stdout().flush();
    })
    .await;
    println!();

    let average = report.average_response_time();
    println!("\nAverage response time: {average:.2} seconds");

    write_results(output, &report.rows)?;
    println!("Detailed results saved to '{}'", output.display());

    let rule = "=".repeat(80);
    println!("\n{rule}\n{:^80}\n{rule}\n", "MANUAL COMPARISON");
    println!("OVERVIEW OF ALL TEST QUESTIONS:");
    for row in &report.rows {
        println!("{}. {}", row.question_id, row.question);
    }

    println!("\n{rule}\n{:^80}\n{rule}", "DETAILED COMPARISON RESULTS");
    for row in &report.rows {
        println!("\nQUESTION {}: {}", row.question_id, row.question);
        println!("\nEXPECTED ANSWER:\n   {}", row.expected_answer);
        println!("\nACTUAL ANSWER:\n   {}", row.actual_answer);
        println!("\nRESPONSE TIME: {:.2} seconds", row.response_time_seconds);
        println!("\n{}", "-".repeat(80));
    }

    println!("\n{rule}");
    println!(
        "TESTING COMPLETE: {} questions evaluated, {} failed",
        report.rows.len(),
        report.failures()
    );
    println!("Average response time: {average:.2} seconds");
    println!("{rule}");

    match session.clear_history() {
        Ok(()) => println!("\nChat history cleared."),
        Err(error) => warn!(%error, "could not clear history after testing"),
    }
    Ok(())
}

async fn menu(
    config: &RagConfig,
    client: &OllamaClient,
    offline_embeddings: bool,
) -> anyhow::Result<()> {
    let stdin = io::stdin();
    loop {
        println!("\n=== RAG LLM Application ===");
        println!("1. Train / Create Vector Database");
        println!("2. Chat with RAG LLM");
        println!("3. Run Tests");
        println!("q. Quit");
        print!("Enter your choice: ");
        io::stdout().flush()?;

        let mut selection = String::new();
        if stdin.lock().read_line(&mut selection)? == 0 {
            return Ok(());
        }

        let command = match selection.trim().to_lowercase().as_str() {
            "1" => Command::Train {
                pdf: PathBuf::from(DEFAULT_PDF),
                chunk_size: IngestionOptions::default().chunk_size,
                chunk_overlap: IngestionOptions::default().chunk_overlap,
                skip_pull: false,
            },
            "2" => Command::Chat,
            "3" => Command::Test {
                cases: PathBuf::from(DEFAULT_CASES),
                output: PathBuf::from(DEFAULT_RESULTS),
            },
            "q" | "quit" | "exit" => {
                println!("\nExiting application. Goodbye!");
                return Ok(());
            }
            _ => {
                println!("Invalid choice. Please try again.");
                continue;
            }
        };

        if let Err(error) = dispatch(command, config, client, offline_embeddings).await {
            println!("{}", failure_message(&error));
        }
    }
}

/// Menu text for a failed action. A missing index points at training.
fn failure_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<RagError>() {
        Some(rag) if rag.is_fatal() => {
            format!("{rag}\nChoose option 1 to build the vector database first.")
        }
        _ => format!("An error occurred: {error:#}"),
    }
}
