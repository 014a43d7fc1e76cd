use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Free-form property bag carried by every node.
pub type Properties = BTreeMap<String, Value>;

/// Node category. Unknown strings survive a snapshot round trip as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Image,
    Defect,
    Equipment,
    Standard,
    Other(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Image => "image",
            NodeType::Defect => "defect",
            NodeType::Equipment => "equipment",
            NodeType::Standard => "standard",
            NodeType::Other(s) => s,
        }
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "image" => NodeType::Image,
            "defect" => NodeType::Defect,
            "equipment" => NodeType::Equipment,
            "standard" => NodeType::Standard,
            _ => NodeType::Other(value),
        }
    }
}

impl From<&str> for NodeType {
    fn from(value: &str) -> Self {
        NodeType::from(value.to_string())
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge tag. `has_defect` runs image -> defect, `requires_equipment` runs
/// defect -> equipment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationType {
    HasDefect,
    RequiresEquipment,
    SimilarDefectType,
    SpecifiedIn,
    Other(String),
}

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            RelationType::HasDefect => "has_defect",
            RelationType::RequiresEquipment => "requires_equipment",
            RelationType::SimilarDefectType => "similar_defect_type",
            RelationType::SpecifiedIn => "specified_in",
            RelationType::Other(s) => s,
        }
    }
}

impl From<String> for RelationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "has_defect" => RelationType::HasDefect,
            "requires_equipment" => RelationType::RequiresEquipment,
            "similar_defect_type" => RelationType::SimilarDefectType,
            "specified_in" => RelationType::SpecifiedIn,
            _ => RelationType::Other(value),
        }
    }
}

impl From<&str> for RelationType {
    fn from(value: &str) -> Self {
        RelationType::from(value.to_string())
    }
}

impl From<RelationType> for String {
    fn from(value: RelationType) -> Self {
        match value {
            RelationType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_node_id: String,
    pub to_node_id: String,
    pub relation_type: RelationType,
    /// Advisory score in [0, 1]; never used in computation.
    #[serde(default)]
    pub confidence: f64,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn is(&self, node_type: &NodeType) -> bool {
        &self.node_type == node_type
    }
}

impl Relationship {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: RelationType,
        confidence: f64,
    ) -> Self {
        Self {
            from_node_id: from.into(),
            to_node_id: to.into(),
            relation_type,
            confidence,
        }
    }
}
