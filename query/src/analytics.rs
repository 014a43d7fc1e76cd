use crate::engine::{ProductSummary, QueryEngine};
use crate::similarity::{SimilarDefectPair, SimilarityEngine};
use defectgraph_core::model::{NodeType, RelationType};
use defectgraph_core::record::{EquipmentRecord, Severity};
use serde::Serialize;
use std::collections::BTreeMap;
use storage::{GraphStats, GraphStore};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquipmentUsage {
    pub name: String,
    pub count: usize,
}

/// Product x {Low, Medium, High} defect counts. Rows follow `products`,
/// which is sorted alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityHeatmap {
    pub products: Vec<String>,
    pub severities: [Severity; 3],
    pub counts: Vec<[usize; 3]>,
}

impl QualityHeatmap {
    pub fn count(&self, product: &str, severity: Severity) -> usize {
        self.products
            .iter()
            .position(|p| p == product)
            .map(|row| self.counts[row][severity.index()])
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    MostCommonDefect,
    CrossProductPatterns,
    HighSeverityProduct,
    CriticalEquipment,
    DefectTypesPerProduct,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, message: String) -> Self {
        Self { kind, message }
    }
}

/// Every aggregate computed against one view of the store.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport<'a> {
    pub stats: GraphStats,
    pub defect_frequency: BTreeMap<String, usize>,
    pub severity_distribution: BTreeMap<String, usize>,
    pub product_defect_counts: BTreeMap<String, usize>,
    pub product_catalog: Vec<ProductSummary>,
    pub equipment_usage: Vec<EquipmentUsage>,
    pub equipment_recommendations: BTreeMap<String, Vec<String>>,
    pub quality_heatmap: QualityHeatmap,
    pub similar_defects: Vec<SimilarDefectPair<'a>>,
    pub insights: Vec<Insight>,
}

/// Read-only aggregations. Nodes missing a property an aggregate keys on
/// are left out of that aggregate only.
#[derive(Clone, Copy)]
pub struct AnalyticsEngine<'a> {
    store: &'a GraphStore,
    query: QueryEngine<'a>,
    similarity: SimilarityEngine<'a>,
}

impl<'a> AnalyticsEngine<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self {
            store,
            query: QueryEngine::new(store),
            similarity: SimilarityEngine::new(store),
        }
    }

    pub fn with_similarity(mut self, similarity: SimilarityEngine<'a>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn defect_frequency(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for defect in self.store.nodes_by_type(&NodeType::Defect) {
            match defect.text_property("name") {
                Ok(name) => *counts.entry(name.into_owned()).or_insert(0) += 1,
                Err(err) => debug!("Skipping defect in frequency: {}", err),
            }
        }
        counts
    }

    /// Keys are the raw severity with its first letter upper-cased and
    /// `" Severity"` appended, so `"high"` counts toward `"High Severity"`.
    pub fn severity_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for defect in self.store.nodes_by_type(&NodeType::Defect) {
            let severity = match defect.text_property("severity") {
                Ok(s) if !s.is_empty() => s,
                Ok(_) => {
                    debug!("Skipping defect {} with empty severity", defect.id);
                    continue;
                }
                Err(err) => {
                    debug!("Skipping defect in severity distribution: {}", err);
                    continue;
                }
            };
            *counts.entry(severity_label(&severity)).or_insert(0) += 1;
        }
        counts
    }

    pub fn product_defect_counts(&self) -> BTreeMap<String, usize> {
        self.query
            .products()
            .into_iter()
            .map(|product| {
                let count = self.query.defects_by_product(&product).len();
                (product, count)
            })
            .collect()
    }

    /// `requires_equipment` edges into each equipment node, most used first.
    /// Equipment sharing a name is reported once with the summed count.
    pub fn equipment_usage(&self) -> Vec<EquipmentUsage> {
        let mut usage: Vec<EquipmentUsage> = Vec::new();
        for node in self.store.nodes_by_type(&NodeType::Equipment) {
            let equipment = match EquipmentRecord::try_from(node) {
                Ok(record) => record,
                Err(err) => {
                    debug!("Skipping equipment in usage: {}", err);
                    continue;
                }
            };
            let count = self
                .store
                .relationships_of(&RelationType::RequiresEquipment)
                .filter(|r| r.to_node_id == equipment.id)
                .count();
            match usage.iter_mut().find(|u| u.name == equipment.name) {
                Some(existing) => existing.count += count,
                None => usage.push(EquipmentUsage {
                    name: equipment.name,
                    count,
                }),
            }
        }
        // Stable: ties keep node insertion order.
        usage.sort_by(|a, b| b.count.cmp(&a.count));
        usage
    }

    /// Severities outside Low/Medium/High are not counted anywhere.
    pub fn quality_heatmap(&self) -> QualityHeatmap {
        let products = self.query.products();
        let counts = products
            .iter()
            .map(|product| {
                let mut row = [0usize; 3];
                for defect in self.query.defects_by_product(product) {
                    let bucket = defect
                        .text_property("severity")
                        .ok()
                        .and_then(|s| Severity::parse(&s));
                    if let Some(severity) = bucket {
                        row[severity.index()] += 1;
                    }
                }
                row
            })
            .collect();

        QualityHeatmap {
            products,
            severities: Severity::ALL,
            counts,
        }
    }

    pub fn generate_insights(&self) -> Vec<Insight> {
        let frequency = self.defect_frequency();
        let pair_count = self.similarity.find_similar_defects_across_products().len();
        let heatmap = self.quality_heatmap();
        let usage = self.equipment_usage();
        self.insights_from(&frequency, pair_count, &heatmap, &usage)
    }

    pub fn report(&self) -> AnalyticsReport<'a> {
        let defect_frequency = self.defect_frequency();
        let similar_defects = self.similarity.find_similar_defects_across_products();
        let quality_heatmap = self.quality_heatmap();
        let equipment_usage = self.equipment_usage();
        let insights = self.insights_from(
            &defect_frequency,
            similar_defects.len(),
            &quality_heatmap,
            &equipment_usage,
        );

        AnalyticsReport {
            stats: self.store.stats(),
            defect_frequency,
            severity_distribution: self.severity_distribution(),
            product_defect_counts: self.product_defect_counts(),
            product_catalog: self.query.product_catalog(),
            equipment_usage,
            equipment_recommendations: self.query.equipment_recommendations(),
            quality_heatmap,
            similar_defects,
            insights,
        }
    }

    fn insights_from(
        &self,
        frequency: &BTreeMap<String, usize>,
        pair_count: usize,
        heatmap: &QualityHeatmap,
        usage: &[EquipmentUsage],
    ) -> Vec<Insight> {
        let mut insights = Vec::new();

        if let Some((name, count)) = most_common(frequency) {
            insights.push(Insight::new(
                InsightKind::MostCommonDefect,
                format!("Most common defect: '{}' found in {} instances", name, count),
            ));
        }

        if pair_count > 0 {
            insights.push(Insight::new(
                InsightKind::CrossProductPatterns,
                format!(
                    "Found {} cross-product defect patterns - enabling knowledge transfer!",
                    pair_count
                ),
            ));
        }

        let high = Severity::High.index();
        let mut critical: Option<(&str, usize)> = None;
        for (product, row) in heatmap.products.iter().zip(&heatmap.counts) {
            if row[high] > critical.map_or(0, |(_, c)| c) {
                critical = Some((product.as_str(), row[high]));
            }
        }
        if let Some((product, count)) = critical {
            insights.push(Insight::new(
                InsightKind::HighSeverityProduct,
                format!(
                    "Product '{}' has {} high-severity defects - needs priority review",
                    product, count
                ),
            ));
        }

        let defect_total = self.store.nodes_by_type(&NodeType::Defect).count();
        if let Some(top) = usage.first().filter(|u| u.count > 0 && defect_total > 0) {
            let percentage = top.count as f64 / defect_total as f64 * 100.0;
            insights.push(Insight::new(
                InsightKind::CriticalEquipment,
                format!(
                    "{} required for {:.0}% of defects - critical investment",
                    top.name, percentage
                ),
            ));
        }

        if !heatmap.products.is_empty() {
            let average = frequency.len() as f64 / heatmap.products.len() as f64;
            insights.push(Insight::new(
                InsightKind::DefectTypesPerProduct,
                format!(
                    "Average {:.1} defect types per product - standardization opportunities exist",
                    average
                ),
            ));
        }

        insights
    }
}

fn severity_label(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => format!("{}{} Severity", first.to_uppercase(), chars.as_str()),
        None => "Severity".to_string(),
    }
}

/// Highest count; ties go to the alphabetically first name.
fn most_common(frequency: &BTreeMap<String, usize>) -> Option<(&str, usize)> {
    let mut best: Option<(&str, usize)> = None;
    for (name, &count) in frequency {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((name.as_str(), count));
        }
    }
    best
}
