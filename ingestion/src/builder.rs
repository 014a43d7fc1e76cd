use crate::analyzer::ImageAnalyzer;
use crate::knowledge::{equipment_nodes, standard_nodes, EQUIPMENT_RULES};
use defectgraph_core::config::IngestionConfig;
use defectgraph_core::error::{DefectGraphError, ErrorCode};
use defectgraph_core::ingest::{ImageObservation, IngestionUnit};
use defectgraph_core::model::{NodeType, Relationship, RelationType};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storage::SharedGraph;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Dataset directory not found: {0}")]
    DatasetNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Analyzer error: {0}")]
    Analyzer(String),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] storage::SnapshotError),
}

impl DefectGraphError for IngestionError {
    fn error_code(&self) -> ErrorCode {
        match self {
            IngestionError::DatasetNotFound(_) => ErrorCode::NotFound,
            IngestionError::Io(_) => ErrorCode::Internal,
            IngestionError::Analyzer(_) => ErrorCode::Unavailable,
            IngestionError::Snapshot(err) => err.error_code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub max_images_per_category: usize,
    pub request_interval: Duration,
    pub link_domain_knowledge: bool,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            max_images_per_category: 3,
            request_interval: Duration::from_millis(3500),
            link_domain_knowledge: true,
        }
    }
}

impl From<&IngestionConfig> for DatasetOptions {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            max_images_per_category: config.max_images_per_category,
            request_interval: Duration::from_millis(config.request_interval_ms),
            link_domain_knowledge: config.link_domain_knowledge,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    pub products: usize,
    pub images_ingested: usize,
    pub failures: usize,
    pub equipment_links: usize,
}

/// Feeds analyzer output into a shared graph, one ingestion unit per image.
pub struct GraphBuilder {
    graph: SharedGraph,
}

impl GraphBuilder {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Adds the image node, defect node and `has_defect` edge under one write
    /// lock so readers never see half a unit.
    pub async fn ingest(&self, unit: IngestionUnit) {
        let mut store = self.graph.write().await;
        store.add_node(unit.image);
        store.add_node(unit.defect);
        store.add_relationship(unit.relationship);
    }

    pub async fn ingest_observation(&self, observation: &ImageObservation) -> IngestionUnit {
        let unit = IngestionUnit::from_observation(observation);
        self.ingest(unit.clone()).await;
        unit
    }

    /// Adds the equipment catalog and standards, then links every defect to
    /// the equipment its name calls for. Links that already exist are not
    /// added again. Returns the number of new links.
    pub async fn add_domain_knowledge(&self) -> usize {
        let mut store = self.graph.write().await;
        for node in equipment_nodes().into_iter().chain(standard_nodes()) {
            store.add_node(node);
        }

        let existing: HashSet<(String, String)> = store
            .relationships_of(&RelationType::RequiresEquipment)
            .map(|r| (r.from_node_id.clone(), r.to_node_id.clone()))
            .collect();

        let mut links = Vec::new();
        for defect in store.nodes_by_type(&NodeType::Defect) {
            let name = match defect.text_property("name") {
                Ok(name) => name,
                Err(err) => {
                    debug!("Skipping defect in equipment linking: {}", err);
                    continue;
                }
            };
            for rule in EQUIPMENT_RULES.iter().filter(|rule| rule.matches(&name)) {
                let key = (defect.id.clone(), rule.equipment_id.to_string());
                if existing.contains(&key) {
                    continue;
                }
                links.push(Relationship::new(
                    key.0,
                    key.1,
                    RelationType::RequiresEquipment,
                    rule.confidence,
                ));
            }
        }

        let added = links.len();
        for link in links {
            store.add_relationship(link);
        }
        info!("Added domain knowledge ({} equipment links)", added);
        added
    }

    /// Walks `<root>/<product>/test/<category>/*.png`, skipping `good`
    /// categories. A failed image is logged and skipped; the walk continues.
    pub async fn process_dataset(
        &self,
        root: impl AsRef<Path>,
        analyzer: &dyn ImageAnalyzer,
        options: &DatasetOptions,
    ) -> Result<IngestionSummary, IngestionError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(IngestionError::DatasetNotFound(root.to_path_buf()));
        }

        let mut summary = IngestionSummary::default();
        let product_dirs = sorted_entries(root, |p| p.is_dir()).await?;
        info!("Found {} product categories in {}", product_dirs.len(), root.display());

        for product_dir in product_dirs {
            let Some(product) = file_name(&product_dir) else {
                continue;
            };
            let test_dir = product_dir.join("test");
            if !test_dir.is_dir() {
                warn!("No test folder for product {}, skipping", product);
                continue;
            }
            summary.products += 1;

            let categories = sorted_entries(&test_dir, |p| p.is_dir()).await?;
            for category_dir in categories {
                let Some(category) = file_name(&category_dir) else {
                    continue;
                };
                if category.ends_with("good") {
                    continue;
                }

                let images = sorted_entries(&category_dir, is_png).await?;
                for image_path in images.into_iter().take(options.max_images_per_category) {
                    match analyzer.analyze(&image_path).await {
                        Ok(analysis) => {
                            let observation = ImageObservation::new(
                                image_path.to_string_lossy(),
                                product.as_str(),
                                category.as_str(),
                                analysis.caption,
                            )
                            .with_tags(analysis.tags);
                            self.ingest_observation(&observation).await;
                            summary.images_ingested += 1;
                        }
                        Err(err) => {
                            warn!("Error processing {}: {}", image_path.display(), err);
                            summary.failures += 1;
                        }
                    }

                    if !options.request_interval.is_zero() {
                        tokio::time::sleep(options.request_interval).await;
                    }
                }
                debug!("Processed category {}/{}", product, category);
            }
        }

        if options.link_domain_knowledge {
            summary.equipment_links = self.add_domain_knowledge().await;
        }

        info!(
            "Dataset processing complete: {} images from {} products ({} failed)",
            summary.images_ingested, summary.products, summary.failures
        );
        Ok(summary)
    }
}

async fn sorted_entries(dir: &Path, keep: fn(&Path) -> bool) -> Result<Vec<PathBuf>, IngestionError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut out = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if keep(&path) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn is_png(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}
