//! Cross-product defect matching without embeddings.
//!
//! Two defects pair up when they belong to different products and both names
//! contain the same keyword from [`DEFECT_KEYWORDS`] (case-insensitive
//! substring). Names that merely share a substring over-match, and synonyms
//! phrased without a shared keyword are missed.

use defectgraph_core::model::{Node, NodeType, RelationType};
use serde::Serialize;
use std::collections::HashMap;
use storage::GraphStore;
use tracing::debug;

pub const DEFECT_KEYWORDS: [&str; 8] = [
    "scratch",
    "crack",
    "dent",
    "hole",
    "contamination",
    "bent",
    "broken",
    "color",
];

pub const UNKNOWN_PRODUCT: &str = "unknown";

/// Bit `k` set when the name contains `DEFECT_KEYWORDS[k]`.
pub fn keyword_mask(name: &str) -> u8 {
    let lowered = name.to_lowercase();
    DEFECT_KEYWORDS
        .iter()
        .enumerate()
        .filter(|(_, kw)| lowered.contains(*kw))
        .fold(0u8, |mask, (idx, _)| mask | (1u8 << idx))
}

pub fn is_similar_defect(a: &str, b: &str) -> bool {
    keyword_mask(a) & keyword_mask(b) != 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStrategy {
    /// Every unordered pair is tested.
    Exhaustive,
    /// Only pairs sharing a keyword bucket are tested. Same output, same order.
    #[default]
    KeywordBuckets,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarDefectPair<'a> {
    pub first: &'a Node,
    pub second: &'a Node,
    pub relation: RelationType,
}

struct Candidate<'a> {
    node: &'a Node,
    product: String,
    mask: u8,
}

#[derive(Clone, Copy)]
pub struct SimilarityEngine<'a> {
    store: &'a GraphStore,
    strategy: ScanStrategy,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self {
            store,
            strategy: ScanStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Product of the image on the first `has_defect` edge into the defect,
    /// or [`UNKNOWN_PRODUCT`] when there is no such edge, image, or property.
    pub fn product_for_defect(&self, defect_id: &str) -> String {
        self.store
            .relationships_of(&RelationType::HasDefect)
            .find(|r| r.to_node_id == defect_id)
            .and_then(|r| self.store.node(&r.from_node_id))
            .and_then(|img| img.text_property("product").ok())
            .map(|p| p.into_owned())
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string())
    }

    /// Pairs `(i, j)` with `i < j` over defects in insertion order, emitted in
    /// that enumeration order.
    pub fn find_similar_defects_across_products(&self) -> Vec<SimilarDefectPair<'a>> {
        let candidates = self.candidates();
        let qualifies = |i: usize, j: usize| {
            let (a, b) = (&candidates[i], &candidates[j]);
            a.mask & b.mask != 0 && a.product != b.product
        };

        let mut pairs = Vec::new();
        match self.strategy {
            ScanStrategy::Exhaustive => {
                for i in 0..candidates.len() {
                    for j in (i + 1)..candidates.len() {
                        if qualifies(i, j) {
                            pairs.push(self.pair(&candidates[i], &candidates[j]));
                        }
                    }
                }
            }
            ScanStrategy::KeywordBuckets => {
                let mut buckets: HashMap<usize, Vec<usize>> = HashMap::new();
                for (idx, candidate) in candidates.iter().enumerate() {
                    for bit in 0..DEFECT_KEYWORDS.len() {
                        if candidate.mask & (1u8 << bit) != 0 {
                            buckets.entry(bit).or_default().push(idx);
                        }
                    }
                }

                for i in 0..candidates.len() {
                    let mut partners: Vec<usize> = (0..DEFECT_KEYWORDS.len())
                        .filter(|&bit| candidates[i].mask & (1u8 << bit) != 0)
                        .filter_map(|bit| buckets.get(&bit))
                        .flat_map(|bucket| bucket.iter().copied().filter(|&j| j > i))
                        .collect();
                    partners.sort_unstable();
                    partners.dedup();
                    for j in partners {
                        if qualifies(i, j) {
                            pairs.push(self.pair(&candidates[i], &candidates[j]));
                        }
                    }
                }
            }
        }
        pairs
    }

    fn pair(&self, a: &Candidate<'a>, b: &Candidate<'a>) -> SimilarDefectPair<'a> {
        SimilarDefectPair {
            first: a.node,
            second: b.node,
            relation: RelationType::SimilarDefectType,
        }
    }

    fn candidates(&self) -> Vec<Candidate<'a>> {
        self.store
            .nodes_by_type(&NodeType::Defect)
            .filter_map(|node| match node.text_property("name") {
                Ok(name) => Some(Candidate {
                    node,
                    product: self.product_for_defect(&node.id),
                    mask: keyword_mask(&name),
                }),
                Err(err) => {
                    debug!("Skipping defect in similarity scan: {}", err);
                    None
                }
            })
            .collect()
    }
}
