use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use imgsearch_core::config::{expand_path, Config, IndexBackend, Settings};
use imgsearch_core::types::Namespace;
use imgsearch_embed::EmbeddingEngine;
use imgsearch_pipeline::{IndexingPipeline, SearchPipeline};
use imgsearch_source::load_from_folder;
use imgsearch_vector::{HttpIndexService, IndexService, LanceIndexService, VectorIndexClient};

#[derive(Parser)]
#[command(name = "imgsearch")]
#[command(about = "Index image folders and search them with natural-language queries")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configured vector index
    CreateIndex {
        /// Index name (defaults to index.name)
        #[arg(long)]
        name: Option<String>,
        /// Vector dimension (defaults to index.dimension)
        #[arg(long)]
        dimension: Option<usize>,
    },
    /// Embed every image under a folder and upsert it
    IndexFolder {
        dir: PathBuf,
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Rank indexed images against a text query
    Search {
        query: String,
        #[arg(short, default_value_t = 5)]
        k: usize,
        #[arg(long)]
        namespace: Option<String>,
    },
}

async fn open_service(settings: &Settings) -> Result<Box<dyn IndexService>> {
    Ok(match settings.index.backend {
        IndexBackend::Lance => {
            let dir = expand_path(&settings.index.lance_dir);
            std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            Box::new(LanceIndexService::open(&dir.to_string_lossy()).await?)
        }
        IndexBackend::Http => Box::new(HttpIndexService::from_settings(&settings.index)?),
    })
}

fn namespace(flag: Option<String>, settings: &Settings) -> Result<Namespace> {
    Ok(Namespace::new(flag.unwrap_or_else(|| settings.index.namespace.clone()))?)
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} batches {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;

    match cli.command {
        Commands::CreateIndex { name, dimension } => {
            let service = open_service(&settings).await?;
            let name = name.unwrap_or_else(|| settings.index.name.clone());
            let dimension = dimension.unwrap_or(settings.index.dimension);
            let spec = VectorIndexClient::create_index(&service, &name, dimension, settings.index.metric).await?;
            println!("Created index '{}' ({} dims, {})", spec.name, spec.dimension, spec.metric);
        }
        Commands::IndexFolder { dir, namespace: ns, batch_size } => {
            let ns = namespace(ns, &settings)?;
            let engine = EmbeddingEngine::from_settings(&settings.embedding)?;
            let client = VectorIndexClient::connect(open_service(&settings).await?, &settings.index.name).await?;
            let batches = load_from_folder(&dir, batch_size.unwrap_or(settings.source.batch_size))?;

            let pb = spinner();
            let tracked = batches.inspect(|batch| {
                pb.inc(1);
                if let Ok(b) = batch {
                    pb.set_message(b.origin.clone());
                }
            });
            let report = IndexingPipeline::new(&engine, &client).index_all(tracked, &ns).await;
            pb.finish_and_clear();
            let report = report?;
            info!(namespace = %ns, "done");
            println!(
                "Indexed {} images in {} batches ({} skipped, {} upsert calls)",
                report.indexed, report.batches, report.rejected, report.upsert_calls
            );
        }
        Commands::Search { query, k, namespace: ns } => {
            let ns = namespace(ns, &settings)?;
            let engine = EmbeddingEngine::from_settings(&settings.embedding)?;
            let client = VectorIndexClient::connect(open_service(&settings).await?, &settings.index.name).await?;
            let matches = SearchPipeline::new(&engine, &client).search(&query, k, &ns).await?;
            if matches.is_empty() {
                println!("No matches in namespace '{ns}'");
            }
            for (rank, m) in matches.iter().enumerate() {
                let location = m
                    .metadata
                    .get("local_file_path")
                    .or_else(|| m.metadata.get("external_ref"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("");
                println!("{:>2}. {:.4}  {}  {}", rank + 1, m.score, m.id, location);
            }
        }
    }
    Ok(())
}
