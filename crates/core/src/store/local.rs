//! Local dataset adapter serving persisted graph tables.
//!
//! Datasets are directories of bincode table files (`nodes.bin`,
//! `edges.bin`, `docs.bin`, or their `_quantized` siblings). Writes use
//! atomic temp-file + rename to prevent corruption on crash, and a CRC32
//! checksum is appended as a footer for integrity verification. Loading
//! verifies the checksum, validates the structural invariants, and builds
//! per-node adjacency buckets; queries then never touch the filesystem.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::store::tables::{DocTable, EdgeTable, GraphTables, NodeTable};
use crate::store::{GraphNode, GraphStore, NodeId};

/// Magic bytes appended before the CRC32 footer of every table file.
const TABLE_CRC_MAGIC: &[u8; 4] = b"SGT1";

/// File naming variant inside a dataset directory. Plain and quantized
/// tables live side by side so one directory can serve both strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetVariant {
    /// `nodes.bin` / `edges.bin` / `docs.bin`, float32 vectors.
    Plain,
    /// `nodes_quantized.bin` / ..., fixed-width integer vectors.
    Quantized,
}

impl DatasetVariant {
    fn file_name(&self, table: &str) -> String {
        match self {
            DatasetVariant::Plain => format!("{table}.bin"),
            DatasetVariant::Quantized => format!("{table}_quantized.bin"),
        }
    }
}

/// Graph store serving one loaded dataset from memory.
#[derive(Debug)]
pub struct LocalGraphStore {
    tables: GraphTables,
    /// `adjacency[node][layer]` holds edge targets; a node's bucket list
    /// only reaches its highest populated layer.
    adjacency: Vec<Vec<Vec<NodeId>>>,
    rng: Mutex<StdRng>,
}

impl LocalGraphStore {
    /// Open the dataset at `dir` with the given naming variant.
    pub fn open(dir: impl AsRef<Path>, variant: DatasetVariant) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let nodes: NodeTable = read_table(&dir.join(variant.file_name("nodes")))?;
        let edges: EdgeTable = read_table(&dir.join(variant.file_name("edges")))?;
        let docs: DocTable = read_table(&dir.join(variant.file_name("docs")))?;
        let store = Self::from_tables(GraphTables { nodes, edges, docs })?;
        tracing::info!(
            "Loaded dataset from '{}' ({} nodes, {} edges, {} vectors)",
            dir.display(),
            store.node_count(),
            store.edge_count(),
            store.encoding()
        );
        Ok(store)
    }

    /// Build a store from in-memory tables. Validation runs here, so every
    /// store the engine sees holds the dense-id and aligned-docs invariants.
    pub fn from_tables(tables: GraphTables) -> Result<Self, StoreError> {
        tables.validate().map_err(StoreError::Misaligned)?;
        let adjacency = build_adjacency(tables.nodes.ids.len(), &tables.edges);
        Ok(Self {
            tables,
            adjacency,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Replace the entry-point RNG with a seeded one, for reproducible
    /// searches in tests and benchmarks.
    pub fn with_entropy(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn node_count(&self) -> usize {
        self.tables.nodes.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.tables.edges.len()
    }

    /// Vector dimensionality of the stored nodes.
    pub fn dim(&self) -> usize {
        self.tables.nodes.vectors.dim()
    }

    /// Component encoding of the stored vectors.
    pub fn encoding(&self) -> &'static str {
        self.tables.nodes.vectors.kind()
    }

    fn node_at(&self, row: usize) -> GraphNode {
        GraphNode {
            id: self.tables.nodes.ids[row],
            vector: self.tables.nodes.vectors.vector(row),
        }
    }
}

#[async_trait]
impl GraphStore for LocalGraphStore {
    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.nodes.ids.len() as u64)
    }

    async fn random_node(&self) -> Result<GraphNode, StoreError> {
        let count = self.tables.nodes.ids.len();
        if count == 0 {
            return Err(StoreError::Backend(
                "random_node called on an empty store".to_string(),
            ));
        }
        let row = self.rng.lock().gen_range(0..count);
        Ok(self.node_at(row))
    }

    async fn neighbors(
        &self,
        source_ids: &[NodeId],
        layer: u32,
        exclude_ids: &[NodeId],
    ) -> Result<Vec<GraphNode>, StoreError> {
        let exclude: HashSet<NodeId> = exclude_ids.iter().copied().collect();
        let mut out = Vec::new();
        for &source in source_ids {
            let buckets = match self.adjacency.get(source as usize) {
                Some(buckets) => buckets,
                None => continue,
            };
            let targets = match buckets.get(layer as usize) {
                Some(targets) => targets,
                None => continue,
            };
            for &target in targets {
                if !exclude.contains(&target) {
                    out.push(self.node_at(target as usize));
                }
            }
        }
        Ok(out)
    }

    async fn fetch_text(&self, row_offset: NodeId) -> Result<String, StoreError> {
        self.tables
            .docs
            .texts
            .get(row_offset as usize)
            .cloned()
            .ok_or(StoreError::RowOutOfRange {
                row: row_offset,
                count: self.tables.docs.texts.len() as u64,
            })
    }
}

fn build_adjacency(count: usize, edges: &EdgeTable) -> Vec<Vec<Vec<NodeId>>> {
    let mut adjacency: Vec<Vec<Vec<NodeId>>> = vec![Vec::new(); count];
    for i in 0..edges.len() {
        let source = edges.sources[i] as usize;
        let layer = edges.layers[i] as usize;
        let buckets = &mut adjacency[source];
        if buckets.len() <= layer {
            buckets.resize(layer + 1, Vec::new());
        }
        buckets[layer].push(edges.targets[i]);
    }
    adjacency
}

/// Write the three tables of a dataset under `dir` with the given variant
/// naming. Search never writes; this is for packing tools and tests.
pub fn save_dataset(
    dir: impl AsRef<Path>,
    variant: DatasetVariant,
    tables: &GraphTables,
) -> Result<(), StoreError> {
    tables.validate().map_err(StoreError::Misaligned)?;
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    write_table(&dir.join(variant.file_name("nodes")), &tables.nodes)?;
    write_table(&dir.join(variant.file_name("edges")), &tables.edges)?;
    write_table(&dir.join(variant.file_name("docs")), &tables.docs)?;
    tracing::info!(
        "Saved dataset to '{}' ({} nodes, {} edges)",
        dir.display(),
        tables.nodes.ids.len(),
        tables.edges.len()
    );
    Ok(())
}

/// Serialize one table: [bincode payload][magic 4 bytes][CRC32 4 bytes BE],
/// written to a temp file and renamed into place.
fn write_table<T: Serialize>(path: &Path, table: &T) -> Result<(), StoreError> {
    let bytes = bincode::serialize(table).map_err(|e| StoreError::Backend(e.to_string()))?;
    let crc = crc32fast::hash(&bytes);

    let mut output = Vec::with_capacity(bytes.len() + 8);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(TABLE_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    let tmp_path = path.with_extension("bin.tmp");
    fs::write(&tmp_path, &output)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read one table, verifying the magic footer and CRC32 checksum.
fn read_table<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read(path)?;

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != TABLE_CRC_MAGIC {
        return Err(StoreError::Corrupted {
            path: path.to_path_buf(),
            detail: "missing integrity footer".to_string(),
        });
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(StoreError::Corrupted {
            path: path.to_path_buf(),
            detail: format!(
                "CRC32 mismatch: expected {:#010x}, got {:#010x}",
                stored_crc, computed_crc
            ),
        });
    }

    bincode::deserialize(payload).map_err(|e| StoreError::Corrupted {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tables::VectorArena;

    fn sample_tables() -> GraphTables {
        GraphTables {
            nodes: NodeTable {
                ids: vec![0, 1, 2],
                vectors: VectorArena::F32 {
                    dim: 2,
                    data: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
                },
            },
            edges: EdgeTable {
                sources: vec![0, 0, 1, 2, 0],
                targets: vec![1, 2, 0, 0, 1],
                layers: vec![0, 0, 0, 1, 1],
            },
            docs: DocTable {
                texts: vec!["first".to_string(), "second".to_string(), "third".to_string()],
            },
        }
    }

    #[tokio::test]
    async fn test_save_and_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        save_dataset(dir.path(), DatasetVariant::Plain, &sample_tables()).unwrap();

        let store = LocalGraphStore::open(dir.path(), DatasetVariant::Plain).unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.dim(), 2);
        assert_eq!(store.encoding(), "f32");
        assert_eq!(store.fetch_text(2).await.unwrap(), "third");
    }

    #[tokio::test]
    async fn test_variant_file_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        save_dataset(dir.path(), DatasetVariant::Quantized, &sample_tables()).unwrap();

        assert!(dir.path().join("nodes_quantized.bin").exists());
        assert!(!dir.path().join("nodes.bin").exists());
        // The plain variant was never written, so opening it fails with io.
        let err = LocalGraphStore::open(dir.path(), DatasetVariant::Plain).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        save_dataset(dir.path(), DatasetVariant::Plain, &sample_tables()).unwrap();

        let nodes = dir.path().join("nodes.bin");
        fs::write(&nodes, b"SG").unwrap();
        let err = LocalGraphStore::open(dir.path(), DatasetVariant::Plain).unwrap_err();
        match err {
            StoreError::Corrupted { detail, .. } => {
                assert!(detail.contains("footer"), "unexpected detail: {detail}")
            }
            other => panic!("expected Corrupted, got {other:?}"),
        }
    }

    #[test]
    fn test_bit_flip_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        save_dataset(dir.path(), DatasetVariant::Plain, &sample_tables()).unwrap();

        let edges = dir.path().join("edges.bin");
        let mut raw = fs::read(&edges).unwrap();
        raw[4] ^= 0xFF;
        fs::write(&edges, &raw).unwrap();

        let err = LocalGraphStore::open(dir.path(), DatasetVariant::Plain).unwrap_err();
        match err {
            StoreError::Corrupted { detail, .. } => {
                assert!(detail.contains("CRC32"), "unexpected detail: {detail}")
            }
            other => panic!("expected Corrupted, got {other:?}"),
        }
    }

    #[test]
    fn test_store_formats_with_debug() {
        // Error assertions on Result<LocalGraphStore, _> need the Ok side
        // to be Debug, so the impl is part of the public surface.
        let store = LocalGraphStore::from_tables(sample_tables()).unwrap();
        let rendered = format!("{store:?}");
        assert!(
            rendered.contains("LocalGraphStore"),
            "unexpected debug output: {rendered}"
        );
    }

    #[test]
    fn test_misaligned_tables_do_not_load() {
        let mut tables = sample_tables();
        tables.docs.texts.pop();
        let err = LocalGraphStore::from_tables(tables).unwrap_err();
        assert!(matches!(err, StoreError::Misaligned(_)));
    }

    #[tokio::test]
    async fn test_neighbors_filter_by_layer_and_exclusion() {
        let store = LocalGraphStore::from_tables(sample_tables()).unwrap();

        let at_layer0 = store.neighbors(&[0], 0, &[]).await.unwrap();
        let ids: Vec<NodeId> = at_layer0.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let at_layer1 = store.neighbors(&[0], 1, &[]).await.unwrap();
        let ids: Vec<NodeId> = at_layer1.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1]);

        let excluded = store.neighbors(&[0], 0, &[2]).await.unwrap();
        let ids: Vec<NodeId> = excluded.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1]);

        // Layer 5 has no edges anywhere.
        assert!(store.neighbors(&[0, 1, 2], 5, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_neighbors_keep_one_entry_per_edge() {
        // Nodes 0 and 1 both point at node 2, so querying both sources
        // returns node 2 twice.
        let tables = GraphTables {
            nodes: NodeTable {
                ids: vec![0, 1, 2],
                vectors: VectorArena::F32 {
                    dim: 1,
                    data: vec![0.0, 1.0, 2.0],
                },
            },
            edges: EdgeTable {
                sources: vec![0, 1],
                targets: vec![2, 2],
                layers: vec![0, 0],
            },
            docs: DocTable {
                texts: vec!["a".into(), "b".into(), "c".into()],
            },
        };
        let store = LocalGraphStore::from_tables(tables).unwrap();
        let fetched = store.neighbors(&[0, 1], 0, &[]).await.unwrap();
        let ids: Vec<NodeId> = fetched.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 2]);
    }

    #[tokio::test]
    async fn test_random_node_sequence_is_reproducible() {
        let a = LocalGraphStore::from_tables(sample_tables())
            .unwrap()
            .with_entropy(42);
        let b = LocalGraphStore::from_tables(sample_tables())
            .unwrap()
            .with_entropy(42);
        for _ in 0..8 {
            assert_eq!(
                a.random_node().await.unwrap().id,
                b.random_node().await.unwrap().id
            );
        }
    }

    #[tokio::test]
    async fn test_random_node_on_empty_store_errors() {
        let tables = GraphTables {
            nodes: NodeTable {
                ids: Vec::new(),
                vectors: VectorArena::F32 {
                    dim: 0,
                    data: Vec::new(),
                },
            },
            edges: EdgeTable::default(),
            docs: DocTable::default(),
        };
        let store = LocalGraphStore::from_tables(tables).unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.random_node().await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_text_out_of_range() {
        let store = LocalGraphStore::from_tables(sample_tables()).unwrap();
        let err = store.fetch_text(9).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::RowOutOfRange { row: 9, count: 3 }
        ));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        save_dataset(dir.path(), DatasetVariant::Plain, &sample_tables()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files not cleaned up: {leftovers:?}");
    }
}
