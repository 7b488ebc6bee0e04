//! Ragnar - Retrieval-augmented question answering with evaluator-driven
//! answer refinement.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragnar::config::RagnarConfig;
use ragnar::evaluate::LlmEvaluator;
use ragnar::generate::LlmGenerator;
use ragnar::ingest::{ingest_file, IngestConfig};
use ragnar::llm::create_llm_client;
use ragnar::pipeline::{AnswerPipeline, AnswerPipelineConfig};
use ragnar::retrieval::{EmbeddingClient, OpenAiEmbeddings, StoreRetriever, VectorStore};
use ragnar::session::ChatSession;

#[derive(Parser)]
#[command(name = "ragnar")]
#[command(version = "0.1.0")]
#[command(about = "Question answering over an ingested corpus with answer refinement", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        /// The question to answer
        question: String,

        /// Maximum evaluation/regeneration attempts
        #[arg(short, long)]
        max_attempts: Option<u32>,

        /// LLM model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Interactive chat with conversation memory
    Chat {
        /// Maximum evaluation/regeneration attempts per question
        #[arg(short, long)]
        max_attempts: Option<u32>,

        /// LLM model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Ingest a text corpus into the document store
    Ingest {
        /// Corpus file (UTF-8 text)
        source: PathBuf,

        /// Section delimiter token
        #[arg(short, long)]
        delimiter: Option<String>,

        /// Store path override
        #[arg(short, long)]
        store: Option<PathBuf>,
    },

    /// Show document store statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "ragnar=debug,info"
    } else {
        "ragnar=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(1);
    }

    let mut config = match RagnarConfig::load(&project_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red().bold());
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Ask {
            question,
            max_attempts,
            model,
        } => {
            apply_overrides(&mut config, max_attempts, model);
            let pipeline = build_pipeline(&config, &project_path)?;

            match pipeline.run(&question, &[]).await {
                Ok(answer) => println!("{answer}"),
                Err(e) => {
                    eprintln!("{} {e}", "Error:".red().bold());
                    std::process::exit(1);
                }
            }
        }

        Commands::Chat {
            max_attempts,
            model,
        } => {
            apply_overrides(&mut config, max_attempts, model);
            let pipeline = build_pipeline(&config, &project_path)?;
            run_chat(&pipeline).await?;
        }

        Commands::Ingest {
            source,
            delimiter,
            store,
        } => {
            let store_path = store.unwrap_or_else(|| config.store_path(&project_path));
            let mut ingest_config = IngestConfig::new(&source, &store_path).with_progress();
            if let Some(ref d) = delimiter {
                ingest_config = ingest_config.with_delimiter(d);
            }

            let embedder = build_embedder(&config);
            match ingest_file(&ingest_config, embedder).await {
                Ok(report) => {
                    println!(
                        "{} Ingested {} sections ({} dims, {}) into {}",
                        "Done:".green().bold(),
                        report.sections,
                        report.dimension,
                        report.embedding_model,
                        store_path.display()
                    );
                }
                Err(e) => {
                    eprintln!("{} {e}", "Error:".red().bold());
                    std::process::exit(1);
                }
            }
        }

        Commands::Stats => {
            let store_path = config.store_path(&project_path);
            match VectorStore::load(&store_path) {
                Ok(store) => {
                    println!("{}", "Document store".bold());
                    println!("  path:      {}", store_path.display());
                    println!("  records:   {}", store.len());
                    println!("  dimension: {}", store.metadata.dimension);
                    println!("  model:     {}", store.metadata.embedding_model);
                    println!("  source:    {}", store.metadata.source);
                    println!("  built:     {}", store.metadata.built_at);
                }
                Err(e) => {
                    eprintln!(
                        "{} {e}\nRun '{}' to build the store.",
                        "Error:".red().bold(),
                        "ragnar ingest <corpus>".cyan()
                    );
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Fold CLI overrides into the loaded configuration.
fn apply_overrides(config: &mut RagnarConfig, max_attempts: Option<u32>, model: Option<String>) {
    if let Some(attempts) = max_attempts {
        config.pipeline.max_attempts = attempts;
    }
    if let Some(model) = model {
        config.llm.model = model;
    }
}

/// Build the embedding client from configuration.
fn build_embedder(config: &RagnarConfig) -> Arc<dyn EmbeddingClient> {
    Arc::new(
        OpenAiEmbeddings::new()
            .with_model(&config.retrieval.embedding_model)
            .with_api_key_env(&config.llm.api_key_env),
    )
}

/// Assemble the answer pipeline from configuration.
///
/// A missing store is not fatal here: the retriever runs over an empty
/// store and the pipeline degrades to its no-evidence behavior.
fn build_pipeline(config: &RagnarConfig, project_path: &Path) -> anyhow::Result<AnswerPipeline> {
    if let Err(e) = config.validate() {
        anyhow::bail!("invalid configuration: {e}");
    }

    let client = create_llm_client(&config.llm)
        .map_err(|e| ragnar::RagnarError::llm(&config.llm.backend, e.to_string()))?;
    let embedder = build_embedder(config);

    let store_path = config.store_path(project_path);
    let store = match VectorStore::load(&store_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!(
                "{} {e}\nAnswering without document context; run '{}' to build the store.",
                "Warning:".yellow().bold(),
                "ragnar ingest <corpus>".cyan()
            );
            VectorStore::empty()
        }
    };

    let retriever = StoreRetriever::new(store, embedder).with_top_k(config.retrieval.top_k);

    Ok(AnswerPipeline::new(
        Arc::new(retriever),
        Arc::new(LlmGenerator::new(Arc::clone(&client))),
        Arc::new(LlmEvaluator::new(client)),
    )
    .with_config(AnswerPipelineConfig::new(config.pipeline.max_attempts)))
}

/// Interactive chat loop with rolling conversation memory.
async fn run_chat(pipeline: &AnswerPipeline) -> anyhow::Result<()> {
    println!(
        "{} (type {} to leave)",
        "Ragnar chat".bold(),
        "exit".cyan()
    );

    let mut session = ChatSession::new();
    let stdin = std::io::stdin();

    loop {
        print!("{} ", "you>".green().bold());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match pipeline.run(question, session.history()).await {
            Ok(answer) => {
                println!("{} {answer}\n", "ragnar>".blue().bold());
                session.record(question, &answer);
            }
            Err(e) => {
                eprintln!("{} {e}\n", "Error:".red().bold());
            }
        }
    }

    println!("Bye.");
    Ok(())
}
