use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub snapshot_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    pub dataset_dir: String,
    pub max_images_per_category: usize,
    /// Pause between analyzer calls; the upstream API is rate limited.
    pub request_interval_ms: u64,
    pub link_domain_knowledge: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub ingestion: IngestionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("DEFECTGRAPH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("storage.snapshot_path", "knowledge_graph.json")?
            .set_default("ingestion.dataset_dir", "./mvtec")?
            .set_default("ingestion.max_images_per_category", 3_i64)?
            .set_default("ingestion.request_interval_ms", 3500_i64)?
            .set_default("ingestion.link_domain_knowledge", true)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                snapshot_path: "knowledge_graph.json".to_string(),
            },
            ingestion: IngestionConfig {
                dataset_dir: "./mvtec".to_string(),
                max_images_per_category: 3,
                request_interval_ms: 3500,
                link_domain_knowledge: true,
            },
        }
    }
}
