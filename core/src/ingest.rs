use crate::model::{Node, NodeType, Relationship, RelationType};
use crate::record::Severity;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const HAS_DEFECT_CONFIDENCE: f64 = 0.85;

/// What the external vision analyzer reports for one processed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageObservation {
    pub image_path: String,
    pub product: String,
    /// Dataset folder the image was found under, e.g. `broken_large`.
    pub defect_category: String,
    pub caption: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ImageObservation {
    pub fn new(
        image_path: impl Into<String>,
        product: impl Into<String>,
        defect_category: impl Into<String>,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            product: product.into(),
            defect_category: defect_category.into(),
            caption: caption.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Folder name wins unless the caption or tags name a recognisable defect.
pub fn refine_defect_type(defect_category: &str, caption: &str, tags: &[String]) -> String {
    let tagged = |needle: &str| tags.iter().any(|t| t.contains(needle));

    let refined = if caption.contains("crack") || tagged("crack") {
        "crack"
    } else if caption.contains("scratch") || tagged("scratch") {
        "scratch"
    } else if caption.contains("hole") || caption.contains("missing") {
        "hole"
    } else if caption.contains("bent") || caption.contains("deformed") {
        "bent"
    } else if caption.contains("contamination") || caption.contains("dirty") {
        "contamination"
    } else {
        return defect_category.to_string();
    };
    refined.to_string()
}

pub fn classify_severity(defect_category: &str) -> Severity {
    let category = defect_category.to_lowercase();
    if category.contains("large") || category.contains("severe") {
        Severity::High
    } else if category.contains("small") || category.contains("minor") {
        Severity::Low
    } else {
        Severity::Medium
    }
}

/// One image node, one defect node and the `has_defect` edge between them.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionUnit {
    pub image: Node,
    pub defect: Node,
    pub relationship: Relationship,
}

impl IngestionUnit {
    pub fn from_observation(observation: &ImageObservation) -> Self {
        let stem = Path::new(&observation.image_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&observation.image_path);
        let defect_type = refine_defect_type(
            &observation.defect_category,
            &observation.caption,
            &observation.tags,
        );
        let severity = classify_severity(&observation.defect_category);

        let image = Node::new(
            format!("img_{}_{}", observation.product, stem),
            NodeType::Image,
        )
        .with_property("path", observation.image_path.as_str())
        .with_property("product", observation.product.as_str())
        .with_property("defect_category", observation.defect_category.as_str())
        .with_property("caption", observation.caption.as_str());

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let defect = Node::new(
            format!("defect_{}_{}_{}", observation.product, defect_type, &suffix[..8]),
            NodeType::Defect,
        )
        .with_property("name", defect_type)
        .with_property("product", observation.product.as_str())
        .with_property("severity", severity.label().to_lowercase());

        let relationship = Relationship::new(
            image.id.clone(),
            defect.id.clone(),
            RelationType::HasDefect,
            HAS_DEFECT_CONFIDENCE,
        );

        Self {
            image,
            defect,
            relationship,
        }
    }
}
