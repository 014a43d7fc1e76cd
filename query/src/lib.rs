pub mod analytics;
pub mod engine;
pub mod similarity;

pub use analytics::{AnalyticsEngine, AnalyticsReport, EquipmentUsage, Insight, InsightKind, QualityHeatmap};
pub use engine::{ProductSummary, QueryEngine};
pub use similarity::{ScanStrategy, SimilarDefectPair, SimilarityEngine, DEFECT_KEYWORDS};
