use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use bookrec::catalog::postgres::PostgresCatalogStore;
use bookrec::config::Config;
use bookrec::embedding::openai::OpenAIEmbeddingProvider;
use bookrec::embedding::EmbeddingProvider;
use bookrec::engine::RecommendationEngine;
use bookrec::generation::openai::OpenAITextGenerator;
use bookrec::generation::TextGenerator;
use bookrec::logging;
use bookrec::server::RecommendationService;
use bookrec::vector::pgvector::PgVectorIndex;
use rmcp::ServiceExt;

#[derive(Parser)]
#[command(name = "bookrec", version, about = "Personalized book recommendation MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Skip automatic database migration on startup
    #[arg(long)]
    skip_migrate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations and exit
    Migrate,
}

/// Create the embedding provider based on configuration. None when disabled;
/// the query path then relies on keyword matching alone.
fn create_embedding_provider(config: &Config) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    match config.embedding.provider.as_str() {
        "openai" => {
            let api_key = config.embedding.api_key.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "OpenAI API key required when embedding provider is 'openai'. \
                     Set BOOKREC_EMBEDDING__API_KEY or embedding.api_key in bookrec.toml"
                )
            })?;
            let provider = OpenAIEmbeddingProvider::new(
                config.embedding.base_url.clone(),
                api_key,
                config.embedding.model.clone(),
                config.embedding.dimension,
            )
            .map_err(|e| anyhow::anyhow!("{}", e))?;
            Ok(Some(Arc::new(provider)))
        }
        _ => Ok(None),
    }
}

/// Create the text generation provider based on configuration. None when
/// disabled; every reason then uses the deterministic template fallback.
fn create_text_generator(config: &Config) -> Result<Option<Arc<dyn TextGenerator>>> {
    match config.generation.provider.as_str() {
        "openai" => {
            let api_key = config.generation.api_key.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "OpenAI API key required when generation provider is 'openai'. \
                     Set BOOKREC_GENERATION__API_KEY or generation.api_key in bookrec.toml"
                )
            })?;
            let generator = OpenAITextGenerator::new(
                config.generation.base_url.clone(),
                api_key,
                config.generation.model.clone(),
            )
            .map_err(|e| anyhow::anyhow!("{}", e))?;
            Ok(Some(Arc::new(generator)))
        }
        _ => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });

    // 3. Initialize logging FIRST (before any other output)
    // CRITICAL: logging goes to stderr only — stdout is reserved for JSON-RPC
    logging::init_logging(&config);

    match cli.command {
        Some(Commands::Migrate) => {
            tracing::info!("Running database migrations...");
            let _store = PostgresCatalogStore::connect(&config.database_url, true).await?;
            println!("Migrations completed successfully.");
            return Ok(());
        }

        None => {
            // Default: start the MCP server
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                "bookrec server starting"
            );

            let run_migrations = !cli.skip_migrate;
            let catalog =
                Arc::new(PostgresCatalogStore::connect(&config.database_url, run_migrations).await?);
            tracing::info!(database_url = %config.database_url, "PostgreSQL catalog initialized");

            // The vector index reads book_embeddings from the same instance
            let index = Arc::new(PgVectorIndex::new(catalog.pool()));

            let embedder = create_embedding_provider(&config)?;
            match &embedder {
                Some(p) => tracing::info!(model = p.model_name(), "Query embedding enabled"),
                None => tracing::info!("Embedding disabled via config (embedding.provider=disabled)"),
            }

            let generator = create_text_generator(&config)?;
            match &generator {
                Some(g) => tracing::info!(model = g.model_name(), "Reason generation enabled"),
                None => tracing::info!(
                    "Generation disabled via config (generation.provider=disabled) — template reasons only"
                ),
            }

            let engine = Arc::new(RecommendationEngine::new(
                catalog,
                index,
                embedder,
                generator,
                config.engine.clone(),
                config.generation.clone(),
            ));

            let service = RecommendationService::new(engine);

            // Serve via stdio transport
            let (stdin, stdout) = rmcp::transport::io::stdio();
            let server = service.serve((stdin, stdout)).await?;

            tracing::info!("bookrec server running — awaiting tool calls via stdio");

            server.waiting().await?;

            tracing::info!("bookrec server stopped");
        }
    }

    Ok(())
}
