use defectgraph_core::model::{Node, NodeType, Relationship, RelationType};
use serde_json::json;
use storage::{load_from_file, save_to_file, GraphSnapshot, GraphStore, SharedGraph};
use tempfile::tempdir;

fn populated_store() -> GraphStore {
    let mut store = GraphStore::new();
    for (idx, product) in ["bottle", "cable", "metal_nut"].iter().enumerate() {
        let img = format!("img_{product}_{idx:03}");
        let defect = format!("defect_{product}_crack_{idx}");
        store.add_node(
            Node::new(img.as_str(), NodeType::Image)
                .with_property("product", *product)
                .with_property("caption", "close-up")
                .with_property("tags", json!(["metal", "surface"])),
        );
        store.add_node(
            Node::new(defect.as_str(), NodeType::Defect)
                .with_property("name", "crack")
                .with_property("severity", "high")
                .with_property("product", *product)
                .with_property("area_px", 1024 + idx as u64),
        );
        store.add_relationship(Relationship::new(img, defect.as_str(), RelationType::HasDefect, 0.85));
        store.add_relationship(Relationship::new(defect, "eq_microscope", RelationType::RequiresEquipment, 0.9));
    }
    store.add_node(Node::new("eq_microscope", NodeType::Equipment).with_property("name", "microscope"));
    store.add_node(
        Node::new("standard_iso9001", NodeType::Standard)
            .with_property("name", "ISO 9001")
            .with_property("section", "8.5 - Production and service provision"),
    );
    store.add_relationship(Relationship::new("a", "b", RelationType::Other("ad_hoc".into()), 0.1));
    store
}

fn sorted_json<T: serde::Serialize>(items: &[T]) -> Vec<String> {
    let mut out: Vec<String> = items
        .iter()
        .map(|item| serde_json::to_string(item).unwrap())
        .collect();
    out.sort();
    out
}

#[tokio::test]
async fn test_round_trip_preserves_nodes_and_relationships() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("knowledge_graph.json");
    let store = populated_store();

    save_to_file(&store, &path).await.unwrap();
    let restored = load_from_file(&path).await.unwrap();

    assert_eq!(restored.nodes(), store.nodes());
    assert_eq!(restored.relationships(), store.relationships());
    assert_eq!(restored.stats(), store.stats());
}

#[tokio::test]
async fn test_round_trip_is_independent_of_serialized_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reordered.json");
    let store = populated_store();

    let mut snapshot = GraphSnapshot::capture(&store);
    snapshot.nodes.reverse();
    snapshot.relationships.reverse();
    std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    let restored = load_from_file(&path).await.unwrap();
    assert_eq!(sorted_json(restored.nodes()), sorted_json(store.nodes()));
    assert_eq!(
        sorted_json(restored.relationships()),
        sorted_json(store.relationships())
    );
}

#[tokio::test]
async fn test_shared_graph_save_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.json");

    let graph = SharedGraph::new(populated_store());
    graph.save_to_file(&path).await.unwrap();

    let reloaded = SharedGraph::default();
    assert!(reloaded.load_from_file(&path).await);
    assert_eq!(reloaded.stats().await, graph.stats().await);
}

#[tokio::test]
async fn test_save_to_unwritable_location_is_a_hard_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"file").unwrap();

    let result = save_to_file(&populated_store(), blocker.join("graph.json")).await;
    assert!(result.is_err());
}
