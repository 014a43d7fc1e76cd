//! Typed views over the untyped node property bag.
//!
//! Ingestion does not guarantee every node carries every key its type
//! conventionally needs, so reads go through these records and surface an
//! absent key as [`PropertyError::Missing`] instead of faulting.

use crate::error::{DefectGraphError, ErrorCode};
use crate::model::{Node, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("node {node_id} has no '{field}' property")]
    Missing { node_id: String, field: String },
    #[error("node {node_id} property '{field}' is not a scalar value")]
    NotText { node_id: String, field: String },
    #[error("node {node_id} is a {actual} node, expected {expected}")]
    WrongType {
        node_id: String,
        expected: NodeType,
        actual: NodeType,
    },
}

impl DefectGraphError for PropertyError {
    fn error_code(&self) -> ErrorCode {
        match self {
            PropertyError::Missing { .. } => ErrorCode::MissingProperty,
            PropertyError::NotText { .. } | PropertyError::WrongType { .. } => {
                ErrorCode::InvalidArgument
            }
        }
    }
}

impl Node {
    /// Reads a property as text. Strings are borrowed; numbers and booleans
    /// are rendered. Absent keys and JSON `null` are both `Missing`.
    pub fn text_property(&self, field: &str) -> Result<Cow<'_, str>, PropertyError> {
        match self.properties.get(field) {
            None | Some(Value::Null) => Err(PropertyError::Missing {
                node_id: self.id.clone(),
                field: field.to_string(),
            }),
            Some(Value::String(s)) => Ok(Cow::Borrowed(s.as_str())),
            Some(Value::Number(n)) => Ok(Cow::Owned(n.to_string())),
            Some(Value::Bool(b)) => Ok(Cow::Owned(b.to_string())),
            Some(_) => Err(PropertyError::NotText {
                node_id: self.id.clone(),
                field: field.to_string(),
            }),
        }
    }

    fn expect_type(&self, expected: NodeType) -> Result<(), PropertyError> {
        if self.node_type == expected {
            Ok(())
        } else {
            Err(PropertyError::WrongType {
                node_id: self.id.clone(),
                expected,
                actual: self.node_type.clone(),
            })
        }
    }
}

/// One of the three heatmap buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }

    /// Case-insensitive exact match against the three labels.
    pub fn parse(raw: &str) -> Option<Severity> {
        Severity::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(raw))
    }

    pub fn index(&self) -> usize {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectRecord {
    pub id: String,
    pub name: String,
    /// Raw severity string as ingested; see [`DefectRecord::severity_bucket`].
    pub severity: String,
    pub product: String,
}

impl DefectRecord {
    pub fn severity_bucket(&self) -> Option<Severity> {
        Severity::parse(&self.severity)
    }
}

impl TryFrom<&Node> for DefectRecord {
    type Error = PropertyError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        node.expect_type(NodeType::Defect)?;
        Ok(Self {
            id: node.id.clone(),
            name: node.text_property("name")?.into_owned(),
            severity: node.text_property("severity")?.into_owned(),
            product: node.text_property("product")?.into_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub product: String,
    pub caption: String,
    pub path: Option<String>,
    pub defect_category: Option<String>,
}

impl TryFrom<&Node> for ImageRecord {
    type Error = PropertyError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        node.expect_type(NodeType::Image)?;
        Ok(Self {
            id: node.id.clone(),
            product: node.text_property("product")?.into_owned(),
            caption: node.text_property("caption")?.into_owned(),
            path: node.text_property("path").ok().map(Cow::into_owned),
            defect_category: node
                .text_property("defect_category")
                .ok()
                .map(Cow::into_owned),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub id: String,
    pub name: String,
}

impl TryFrom<&Node> for EquipmentRecord {
    type Error = PropertyError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        node.expect_type(NodeType::Equipment)?;
        Ok(Self {
            id: node.id.clone(),
            name: node.text_property("name")?.into_owned(),
        })
    }
}
