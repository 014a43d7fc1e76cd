//! Static domain knowledge layered on top of ingested defects.

use defectgraph_core::model::{Node, NodeType};

pub const EQUIPMENT_CATALOG: [(&str, &str); 5] = [
    ("eq_microscope", "High-resolution microscope"),
    ("eq_backlight", "Backlight illumination"),
    ("eq_xray", "X-ray scanner"),
    ("eq_camera", "High-speed camera"),
    ("eq_laser", "3D Laser scanner"),
];

/// A defect whose lower-cased name contains any of `keywords` needs
/// `equipment_id`.
pub struct EquipmentRule {
    pub keywords: &'static [&'static str],
    pub equipment_id: &'static str,
    pub confidence: f64,
}

pub const EQUIPMENT_RULES: [EquipmentRule; 3] = [
    EquipmentRule {
        keywords: &["crack", "scratch"],
        equipment_id: "eq_microscope",
        confidence: 0.9,
    },
    EquipmentRule {
        keywords: &["hole", "contamination", "broken"],
        equipment_id: "eq_backlight",
        confidence: 0.85,
    },
    EquipmentRule {
        keywords: &["bent", "color"],
        equipment_id: "eq_camera",
        confidence: 0.8,
    },
];

impl EquipmentRule {
    pub fn matches(&self, defect_name: &str) -> bool {
        let lowered = defect_name.to_lowercase();
        self.keywords.iter().any(|kw| lowered.contains(kw))
    }
}

pub fn equipment_nodes() -> Vec<Node> {
    EQUIPMENT_CATALOG
        .iter()
        .map(|(id, name)| Node::new(*id, NodeType::Equipment).with_property("name", *name))
        .collect()
}

pub fn standard_nodes() -> Vec<Node> {
    vec![Node::new("standard_iso9001", NodeType::Standard)
        .with_property("name", "ISO 9001")
        .with_property("section", "8.5 - Production and service provision")]
}
