use defectgraph_core::model::NodeType;
use defectgraph_core::record::DefectRecord;
use ingestion::analyzer::BoxFuture;
use ingestion::{DatasetOptions, GraphBuilder, ImageAnalysis, ImageAnalyzer, IngestionError, OfflineAnalyzer};
use query::{AnalyticsEngine, QueryEngine, SimilarityEngine};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storage::SharedGraph;
use tempfile::TempDir;

/// Captions keyed off the file name; `fail_*.png` simulates an API error.
struct ScriptedAnalyzer {
    calls: AtomicUsize,
}

impl ImageAnalyzer for ScriptedAnalyzer {
    fn analyze<'a>(&'a self, image_path: &'a Path) -> BoxFuture<'a, Result<ImageAnalysis, IngestionError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Box::pin(async move {
            if stem.starts_with("fail") {
                return Err(IngestionError::Analyzer("rate limited".to_string()));
            }
            Ok(ImageAnalysis {
                caption: format!("a close-up photo showing a {stem}"),
                tags: vec!["metal".to_string()],
            })
        })
    }
}

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"\x89PNG").unwrap();
}

fn mvtec_layout() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(root, "bottle/test/broken_large/crack.png");
    touch(root, "bottle/test/broken_large/fail_000.png");
    touch(root, "bottle/test/good/000.png");
    touch(root, "bottle/train/good/000.png");
    touch(root, "metal_nut/test/scratch/scratch.png");
    touch(root, "metal_nut/test/color/000.png");
    touch(root, "metal_nut/test/color/notes.txt");
    touch(root, "screw/test/thread_side/crack.png");
    touch(root, "screw/test/thread_side/extra.png");
    touch(root, "screw/test/thread_side/more.png");
    std::fs::create_dir_all(root.join("no_test_folder/train")).unwrap();
    dir
}

fn fast_options(limit: usize) -> DatasetOptions {
    DatasetOptions {
        max_images_per_category: limit,
        request_interval: Duration::ZERO,
        link_domain_knowledge: true,
    }
}

#[tokio::test]
async fn test_dataset_walk_builds_queryable_graph() {
    let dataset = mvtec_layout();
    let graph = SharedGraph::default();
    let builder = GraphBuilder::new(graph.clone());
    let analyzer = ScriptedAnalyzer {
        calls: AtomicUsize::new(0),
    };

    let summary = builder
        .process_dataset(dataset.path(), &analyzer, &fast_options(2))
        .await
        .unwrap();

    assert_eq!(summary.products, 3);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.images_ingested, 5);
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 6);

    let store = graph.read().await;
    assert_eq!(store.nodes_by_type(&NodeType::Image).count(), 5);
    assert_eq!(store.nodes_by_type(&NodeType::Defect).count(), 5);
    assert_eq!(store.stats().dangling_relationships, 0);

    let query = QueryEngine::new(&store);
    let bottle: Vec<DefectRecord> = query
        .defects_by_product("BOTTLE")
        .into_iter()
        .map(|n| DefectRecord::try_from(n).unwrap())
        .collect();
    assert_eq!(bottle.len(), 1);
    assert_eq!(bottle[0].name, "crack");
    assert_eq!(bottle[0].severity, "high");

    let recommendations = query.equipment_recommendations();
    assert_eq!(
        recommendations["crack"],
        vec!["High-resolution microscope", "High-resolution microscope"]
    );

    let pairs = SimilarityEngine::new(&store).find_similar_defects_across_products();
    assert_eq!(pairs.len(), 1, "bottle crack pairs with screw crack");

    let insights = AnalyticsEngine::new(&store).generate_insights();
    assert_eq!(insights.len(), 5);
}

#[tokio::test]
async fn test_offline_analyzer_uses_folder_names() {
    let dataset = mvtec_layout();
    let builder = GraphBuilder::new(SharedGraph::default());
    let mut options = fast_options(1);
    options.link_domain_knowledge = false;

    let summary = builder
        .process_dataset(dataset.path(), &OfflineAnalyzer::default(), &options)
        .await
        .unwrap();
    assert_eq!(summary.images_ingested, 4);
    assert_eq!(summary.equipment_links, 0);

    let store = builder.graph().read().await;
    let freq = AnalyticsEngine::new(&store).defect_frequency();
    let names: Vec<&str> = freq.keys().map(|k| k.as_str()).collect();
    assert_eq!(names, vec!["broken_large", "color", "scratch", "thread_side"]);
    assert_eq!(store.stats().equipment, 0);
}

#[tokio::test]
async fn test_missing_dataset_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let builder = GraphBuilder::new(SharedGraph::default());
    let err = builder
        .process_dataset(dir.path().join("absent"), &OfflineAnalyzer::default(), &fast_options(1))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestionError::DatasetNotFound(_)));
}

#[tokio::test]
async fn test_rebuild_then_reload_from_cache() {
    let dataset = mvtec_layout();
    let cache = tempfile::tempdir().unwrap();
    let cache_path = cache.path().join("knowledge_graph.json");

    let graph = SharedGraph::default();
    let root = dataset.path().to_path_buf();
    let loaded = graph
        .load_or_rebuild(&cache_path, |g| async move {
            GraphBuilder::new(g)
                .process_dataset(&root, &OfflineAnalyzer::default(), &fast_options(1))
                .await
                .map(|_| ())
        })
        .await
        .unwrap();
    assert!(!loaded);

    let reloaded = SharedGraph::default();
    assert!(reloaded.load_from_file(&cache_path).await);
    assert_eq!(reloaded.stats().await, graph.stats().await);
}
