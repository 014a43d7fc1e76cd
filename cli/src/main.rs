//! defectgraph CLI - query and maintain the defect knowledge graph snapshot

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use defectgraph_core::config::AppConfig;
use defectgraph_core::ingest::ImageObservation;
use ingestion::{DatasetOptions, GraphBuilder, IngestionSummary, OfflineAnalyzer};
use query::{AnalyticsEngine, QueryEngine, ScanStrategy, SimilarityEngine};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use storage::{GraphStore, SharedGraph};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "defectgraph")]
#[command(author, version, about = "Manufacturing defect knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Snapshot file (overrides storage.snapshot_path)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Pair scan used by similar, insights and report
    #[arg(long, global = true, default_value = "buckets")]
    scan: ScanMode,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum ScanMode {
    Exhaustive,
    #[default]
    Buckets,
}

impl From<ScanMode> for ScanStrategy {
    fn from(mode: ScanMode) -> Self {
        match mode {
            ScanMode::Exhaustive => ScanStrategy::Exhaustive,
            ScanMode::Buckets => ScanStrategy::KeywordBuckets,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Node and relationship counts
    Stats,

    /// Products with image and defect counts
    Products,

    /// Defects recorded for a product (case-insensitive substring match)
    Defects {
        product: String,
    },

    /// Defects whose name contains a term
    Search {
        term: String,
    },

    /// Similar defect pairs across different products
    Similar,

    /// Equipment recommendations per defect type and usage counts
    Equipment,

    /// Product x severity defect counts
    Heatmap,

    /// Human-readable findings
    Insights,

    /// Every aggregate in one document
    Report,

    /// Append analyzer observations (a JSON array) to the snapshot
    Ingest {
        observations: PathBuf,
        /// Skip equipment and standards linking
        #[arg(long)]
        no_domain_knowledge: bool,
    },

    /// Build the snapshot from a dataset directory unless one is cached
    Build {
        /// Dataset root (overrides ingestion.dataset_dir)
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Discard the cached snapshot first
        #[arg(long)]
        rebuild: bool,
    },

    /// Delete the snapshot file
    Clear,
}

#[derive(Serialize)]
struct EquipmentView {
    recommendations: BTreeMap<String, Vec<String>>,
    usage: Vec<query::EquipmentUsage>,
}

#[derive(Serialize)]
struct BuildOutcome {
    from_cache: bool,
    stats: storage::GraphStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    defectgraph_core::init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::load().unwrap_or_else(|err| {
        warn!("Falling back to default configuration: {}", err);
        AppConfig::default()
    });
    let snapshot = cli
        .snapshot
        .unwrap_or_else(|| PathBuf::from(&config.storage.snapshot_path));

    let strategy = ScanStrategy::from(cli.scan);

    match cli.command {
        Commands::Stats => {
            let store = load_store(&snapshot).await;
            print_json(&store.stats())
        }
        Commands::Products => {
            let store = load_store(&snapshot).await;
            print_json(&QueryEngine::new(&store).product_catalog())
        }
        Commands::Defects { product } => {
            let store = load_store(&snapshot).await;
            print_json(&QueryEngine::new(&store).defects_by_product(&product))
        }
        Commands::Search { term } => {
            let store = load_store(&snapshot).await;
            print_json(&QueryEngine::new(&store).search_defects(&term))
        }
        Commands::Similar => {
            let store = load_store(&snapshot).await;
            let similarity = SimilarityEngine::new(&store).with_strategy(strategy);
            print_json(&similarity.find_similar_defects_across_products())
        }
        Commands::Equipment => {
            let store = load_store(&snapshot).await;
            print_json(&EquipmentView {
                recommendations: QueryEngine::new(&store).equipment_recommendations(),
                usage: AnalyticsEngine::new(&store).equipment_usage(),
            })
        }
        Commands::Heatmap => {
            let store = load_store(&snapshot).await;
            print_json(&AnalyticsEngine::new(&store).quality_heatmap())
        }
        Commands::Insights => {
            let store = load_store(&snapshot).await;
            print_json(&analytics(&store, strategy).generate_insights())
        }
        Commands::Report => {
            let store = load_store(&snapshot).await;
            print_json(&analytics(&store, strategy).report())
        }
        Commands::Ingest {
            observations,
            no_domain_knowledge,
        } => {
            let summary = ingest(&snapshot, &observations, !no_domain_knowledge).await?;
            print_json(&summary)
        }
        Commands::Build { dataset, rebuild } => {
            let dataset =
                dataset.unwrap_or_else(|| PathBuf::from(&config.ingestion.dataset_dir));
            let options = DatasetOptions::from(&config.ingestion);
            let outcome = build(&snapshot, &dataset, &options, rebuild).await?;
            print_json(&outcome)
        }
        Commands::Clear => {
            let deleted = storage::delete_cache(&snapshot)
                .await
                .with_context(|| format!("failed to delete {}", snapshot.display()))?;
            print_json(&serde_json::json!({ "deleted": deleted }))
        }
    }
}

fn analytics(store: &GraphStore, strategy: ScanStrategy) -> AnalyticsEngine<'_> {
    AnalyticsEngine::new(store).with_similarity(SimilarityEngine::new(store).with_strategy(strategy))
}

/// A missing or unreadable snapshot reads as an empty graph.
async fn load_store(path: &Path) -> GraphStore {
    match storage::load_from_file(path).await {
        Some(store) => store,
        None => {
            warn!("No usable snapshot at {}, using an empty graph", path.display());
            GraphStore::new()
        }
    }
}

/// Like [`load_store`], but a snapshot that exists and cannot be read is an
/// error, so a write-back never replaces it with a smaller graph.
async fn load_existing(path: &Path) -> Result<GraphStore> {
    if !storage::cache_exists(path) {
        return Ok(GraphStore::new());
    }
    match storage::load_from_file(path).await {
        Some(store) => Ok(store),
        None => anyhow::bail!(
            "snapshot {} exists but could not be loaded; refusing to overwrite it",
            path.display()
        ),
    }
}

async fn ingest(snapshot: &Path, observations: &Path, link_domain_knowledge: bool) -> Result<IngestionSummary> {
    let raw = tokio::fs::read(observations)
        .await
        .with_context(|| format!("failed to read {}", observations.display()))?;
    let observations: Vec<ImageObservation> =
        serde_json::from_slice(&raw).context("observations must be a JSON array")?;

    let builder = GraphBuilder::new(SharedGraph::new(load_existing(snapshot).await?));
    let mut summary = IngestionSummary::default();
    let mut products = BTreeSet::new();
    for observation in &observations {
        builder.ingest_observation(observation).await;
        products.insert(observation.product.as_str());
        summary.images_ingested += 1;
    }
    summary.products = products.len();
    if link_domain_knowledge {
        summary.equipment_links = builder.add_domain_knowledge().await;
    }

    builder
        .graph()
        .save_to_file(snapshot)
        .await
        .with_context(|| format!("failed to save {}", snapshot.display()))?;
    info!("Ingested {} observations", summary.images_ingested);
    Ok(summary)
}

async fn build(snapshot: &Path, dataset: &Path, options: &DatasetOptions, rebuild: bool) -> Result<BuildOutcome> {
    if rebuild {
        storage::delete_cache(snapshot).await?;
    }

    let graph = SharedGraph::default();
    let from_cache = graph
        .load_or_rebuild(snapshot, |graph| async move {
            GraphBuilder::new(graph)
                .process_dataset(dataset, &OfflineAnalyzer::default(), options)
                .await
                .map(|_| ())
        })
        .await
        .with_context(|| format!("failed to build graph from {}", dataset.display()))?;

    Ok(BuildOutcome {
        from_cache,
        stats: graph.stats().await,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
