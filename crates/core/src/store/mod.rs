//! Graph storage: the `GraphStore` capability, table layout, and adapters.
//!
//! The engine reads the graph through [`GraphStore`], a deliberately narrow
//! async contract: node count, one random node, batched neighbor lookup, and
//! document text by row offset. Everything else (file formats, caching,
//! remoteness) is the adapter's business. [`LocalGraphStore`] serves datasets
//! persisted as bincode table files with CRC32 footers.

/// Local dataset adapter: file loading, integrity checks, adjacency buckets.
pub mod local;
/// Columnar node/edge/doc tables and their structural invariants.
pub mod tables;

pub use local::{save_dataset, DatasetVariant, LocalGraphStore};
pub use tables::{DocTable, EdgeTable, GraphTables, NodeTable, VectorArena};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::quantization::VectorData;

/// Node identifier. Node ids are dense row offsets, so the same value
/// addresses the node's row in the docs table.
pub type NodeId = u32;

/// A node fetched from storage: its id and stored vector payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: NodeId,
    pub vector: VectorData,
}

/// Narrow async capability the search engine needs from graph storage.
///
/// A store instance is bound to one dataset and one encoding variant, so no
/// operation takes table parameters.
///
/// Contract notes:
/// - Node ids are dense row offsets `0..count`, and the docs-table row at
///   offset `id` holds the text for node `id`. Adapters must verify this
///   alignment when loading; silent misalignment corrupts every text lookup
///   without ever raising an error.
/// - `neighbors` returns one entry per matching edge, so the same target may
///   appear several times in one response. Targets listed in `exclude_ids`
///   should be filtered out, but the engine tolerates stores that let a few
///   through; it deduplicates against its own cache.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Total number of nodes in the graph.
    async fn count(&self) -> Result<u64, StoreError>;

    /// One node chosen uniformly at random. Only called on non-empty stores.
    async fn random_node(&self) -> Result<GraphNode, StoreError>;

    /// Targets of edges at `layer` whose source is in `source_ids`, minus
    /// targets in `exclude_ids`.
    async fn neighbors(
        &self,
        source_ids: &[NodeId],
        layer: u32,
        exclude_ids: &[NodeId],
    ) -> Result<Vec<GraphNode>, StoreError>;

    /// Document text stored at `row_offset`.
    async fn fetch_text(&self, row_offset: NodeId) -> Result<String, StoreError>;
}
