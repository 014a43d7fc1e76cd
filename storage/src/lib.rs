pub mod graph;
pub mod shared;
pub mod snapshot;

pub use graph::{GraphStats, GraphStore};
pub use shared::SharedGraph;
pub use snapshot::{cache_exists, delete_cache, load_from_file, save_to_file, GraphSnapshot, SnapshotError};
