pub mod analyzer;
pub mod builder;
pub mod knowledge;

pub use analyzer::{ImageAnalysis, ImageAnalyzer, OfflineAnalyzer};
pub use builder::{DatasetOptions, GraphBuilder, IngestionError, IngestionSummary};
