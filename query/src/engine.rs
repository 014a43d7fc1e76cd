use defectgraph_core::model::{Node, NodeType, RelationType};
use defectgraph_core::record::{DefectRecord, EquipmentRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use storage::GraphStore;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product: String,
    pub image_count: usize,
    pub defect_count: usize,
}

/// Lookups over a borrowed store. Every scan is linear.
#[derive(Clone, Copy)]
pub struct QueryEngine<'a> {
    store: &'a GraphStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Defects reached through `has_defect` from every image whose product
    /// contains `product_name`, ignoring case, so `"nut"` also selects
    /// `"metal_nut"` images.
    pub fn defects_by_product(&self, product_name: &str) -> Vec<&'a Node> {
        let needle = product_name.to_lowercase();
        let images: HashSet<&str> = self
            .store
            .nodes_by_type(&NodeType::Image)
            .filter(|img| {
                img.text_property("product")
                    .map(|p| p.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .map(|img| img.id.as_str())
            .collect();
        if images.is_empty() {
            return Vec::new();
        }

        let defect_ids: HashSet<&str> = self
            .store
            .relationships_of(&RelationType::HasDefect)
            .filter(|r| images.contains(r.from_node_id.as_str()))
            .map(|r| r.to_node_id.as_str())
            .collect();

        self.store
            .nodes_by_type(&NodeType::Defect)
            .filter(|d| defect_ids.contains(d.id.as_str()))
            .collect()
    }

    /// Defect name -> names of equipment linked by `requires_equipment`.
    /// Defects without equipment do not appear. Defects sharing a name have
    /// their equipment lists concatenated.
    pub fn equipment_recommendations(&self) -> BTreeMap<String, Vec<String>> {
        let mut recommendations: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for defect in self.store.nodes_by_type(&NodeType::Defect) {
            let equipment: Vec<String> = self
                .store
                .related_nodes(&defect.id, &RelationType::RequiresEquipment)
                .into_iter()
                .filter_map(|eq| match EquipmentRecord::try_from(eq) {
                    Ok(record) => Some(record.name),
                    Err(err) => {
                        debug!("Skipping equipment in recommendations: {}", err);
                        None
                    }
                })
                .collect();
            if equipment.is_empty() {
                continue;
            }

            let name = match defect.text_property("name") {
                Ok(name) => name.into_owned(),
                Err(err) => {
                    debug!("Skipping defect in recommendations: {}", err);
                    continue;
                }
            };
            recommendations.entry(name).or_default().extend(equipment);
        }

        recommendations
    }

    /// Defects whose name contains `term`, ignoring case.
    pub fn search_defects(&self, term: &str) -> Vec<DefectRecord> {
        let needle = term.to_lowercase();
        self.store
            .nodes_by_type(&NodeType::Defect)
            .filter_map(|node| match DefectRecord::try_from(node) {
                Ok(record) => Some(record),
                Err(err) => {
                    debug!("Skipping defect in search: {}", err);
                    None
                }
            })
            .filter(|record| record.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Distinct image products in alphabetical order.
    pub fn products(&self) -> Vec<String> {
        let products: BTreeSet<String> = self
            .store
            .nodes_by_type(&NodeType::Image)
            .filter_map(|img| img.text_property("product").ok())
            .map(|p| p.into_owned())
            .collect();
        products.into_iter().collect()
    }

    pub fn product_catalog(&self) -> Vec<ProductSummary> {
        self.products()
            .into_iter()
            .map(|product| {
                let image_count = self
                    .store
                    .nodes_by_type(&NodeType::Image)
                    .filter(|img| {
                        img.text_property("product")
                            .map(|p| p == product.as_str())
                            .unwrap_or(false)
                    })
                    .count();
                let defect_count = self.defects_by_product(&product).len();
                ProductSummary {
                    product,
                    image_count,
                    defect_count,
                }
            })
            .collect()
    }
}
