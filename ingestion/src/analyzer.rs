use crate::builder::IngestionError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Caption and tags returned by a vision service for one image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub caption: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Boundary to the remote vision service. Implementations own transport,
/// authentication and retries; the builder only sees the result.
pub trait ImageAnalyzer: Send + Sync {
    fn analyze<'a>(&'a self, image_path: &'a Path) -> BoxFuture<'a, Result<ImageAnalysis, IngestionError>>;
}

/// Analyzer that never leaves the process: every image gets the same caption
/// and no tags, so defect types fall back to the dataset folder name.
pub struct OfflineAnalyzer {
    caption: String,
}

impl OfflineAnalyzer {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
        }
    }
}

impl Default for OfflineAnalyzer {
    fn default() -> Self {
        Self::new("unknown")
    }
}

impl ImageAnalyzer for OfflineAnalyzer {
    fn analyze<'a>(&'a self, _image_path: &'a Path) -> BoxFuture<'a, Result<ImageAnalysis, IngestionError>> {
        let caption = self.caption.clone();
        Box::pin(async move {
            Ok(ImageAnalysis {
                caption,
                tags: Vec::new(),
            })
        })
    }
}
