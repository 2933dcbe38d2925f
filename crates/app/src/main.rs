mod document;
mod generation;
mod prompt;
mod sqlite;

use catalog_query_core::{EngineConfig, ResolutionCoordinator};
use chrono::Utc;
use clap::{Parser, Subcommand};
use document::load_document_text;
use generation::{GenerationClient, GenerationError, DEFAULT_GENERATION_ENDPOINT};
use prompt::{build_prompt, format_reply, ProductImage, NO_INFORMATION_REPLY};
use serde::Serialize;
use sqlite::SqliteConnector;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "catalog-query", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite inventory database
    #[arg(long, env = "CATALOG_DB", default_value = "catalogo.db")]
    database: PathBuf,

    /// Catalog document (.pdf or plain text)
    #[arg(long, env = "CATALOG_DOCUMENT", default_value = "catalogo.pdf")]
    document: PathBuf,

    /// JSON file overriding engine constants
    #[arg(long, env = "CATALOG_ENGINE_CONFIG")]
    engine_config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the structured intent read from a query.
    Analyze {
        #[arg(long)]
        query: String,
    },
    /// Run the inventory search cascade only.
    Search {
        #[arg(long)]
        query: String,
    },
    /// Rank catalog document passages only.
    Passages {
        #[arg(long)]
        query: String,
    },
    /// Resolve a query against both sources and answer it.
    Ask {
        #[arg(long)]
        query: String,
        /// Print the evidence bundle instead of calling the generation service.
        #[arg(long, default_value_t = false)]
        no_generate: bool,
        /// Text generation endpoint
        #[arg(long, env = "GENERATION_ENDPOINT", default_value = DEFAULT_GENERATION_ENDPOINT)]
        generation_endpoint: String,
        /// API key appended to the endpoint as `key`
        #[arg(long, env = "GENERATION_API_KEY", hide_env_values = true)]
        generation_api_key: Option<String>,
        /// Request timeout in seconds.
        #[arg(long, default_value = "30")]
        generation_timeout_secs: u64,
        /// Products included in the prompt.
        #[arg(long, default_value = "5")]
        max_products: usize,
    },
}

#[derive(Serialize)]
struct Answer {
    text: String,
    images: Vec<ProductImage>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.engine_config {
        Some(path) => load_engine_config(path)?,
        None => EngineConfig::default(),
    };
    let coordinator =
        ResolutionCoordinator::new(config).map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let store = SqliteConnector::new(&cli.database);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        database = %cli.database.display(),
        "catalog-query boot"
    );

    match cli.command {
        Command::Analyze { query } => {
            print_json(&coordinator.analyze(&query))?;
        }
        Command::Search { query } => {
            let result = coordinator
                .search_store(&query, &store)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            print_json(&result)?;
        }
        Command::Passages { query } => {
            let text = read_document(&cli.document);
            print_json(&coordinator.search_document(&query, &text))?;
        }
        Command::Ask {
            query,
            no_generate,
            generation_endpoint,
            generation_api_key,
            generation_timeout_secs,
            max_products,
        } => {
            let text = read_document(&cli.document);
            let bundle = coordinator
                .resolve(&query, &store, &text)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if no_generate {
                print_json(&bundle)?;
                return Ok(());
            }

            let Some(prepared) = build_prompt(&bundle, max_products) else {
                println!("{NO_INFORMATION_REPLY}");
                return Ok(());
            };

            let client = GenerationClient::new(
                &generation_endpoint,
                generation_api_key.as_deref(),
                Duration::from_secs(generation_timeout_secs),
            )
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let text = match client.generate(&prepared.text).await {
                Ok(reply) => format_reply(&reply),
                Err(GenerationError::Timeout(after)) => {
                    warn!(?after, "generation timed out");
                    "❌ Se agotó el tiempo de espera al consultar el servidor de IA.".to_string()
                }
                Err(error) => {
                    warn!(%error, "generation failed");
                    format!("❌ Error al consultar el servidor de IA: {error}")
                }
            };

            print_json(&Answer {
                text,
                images: prepared.images,
            })?;
        }
    }

    Ok(())
}

fn load_engine_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|error| anyhow::anyhow!("reading {}: {error}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|error| anyhow::anyhow!("parsing {}: {error}", path.display()))
}

/// An unreadable document degrades to empty text, which the engine reports
/// as unavailable.
fn read_document(path: &Path) -> String {
    match load_document_text(path) {
        Ok(text) => text,
        Err(error) => {
            warn!(path = %path.display(), %error, "catalog document unavailable");
            String::new()
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
