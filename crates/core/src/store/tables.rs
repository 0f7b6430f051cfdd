//! Columnar graph tables and their structural invariants.
//!
//! A dataset is three tables: nodes (dense ids plus a vector arena), edges
//! (source/target/layer columns, one row per directed edge), and docs (text
//! rows aligned with node ids). The layout mirrors the persisted form, so
//! loading is deserialize-and-validate with no reshaping.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::quantization::{ScalarCodec, VectorData};
use crate::store::NodeId;

/// Node vectors stored contiguously with a fixed dimension, one variant per
/// component encoding. Struct-of-arrays keeps a million small vectors from
/// becoming a million allocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VectorArena {
    F32 { dim: usize, data: Vec<f32> },
    I8 { dim: usize, data: Vec<i8> },
    I16 { dim: usize, data: Vec<i16> },
    I32 { dim: usize, data: Vec<i32> },
}

impl VectorArena {
    /// Component count per vector.
    pub fn dim(&self) -> usize {
        match self {
            VectorArena::F32 { dim, .. } => *dim,
            VectorArena::I8 { dim, .. } => *dim,
            VectorArena::I16 { dim, .. } => *dim,
            VectorArena::I32 { dim, .. } => *dim,
        }
    }

    /// Number of vectors held.
    pub fn len(&self) -> usize {
        let dim = self.dim();
        if dim == 0 {
            0
        } else {
            self.raw_len() / dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encoding name, matching [`VectorData::kind`].
    pub fn kind(&self) -> &'static str {
        match self {
            VectorArena::F32 { .. } => "f32",
            VectorArena::I8 { .. } => "i8",
            VectorArena::I16 { .. } => "i16",
            VectorArena::I32 { .. } => "i32",
        }
    }

    /// Total component count across all vectors.
    pub fn raw_len(&self) -> usize {
        match self {
            VectorArena::F32 { data, .. } => data.len(),
            VectorArena::I8 { data, .. } => data.len(),
            VectorArena::I16 { data, .. } => data.len(),
            VectorArena::I32 { data, .. } => data.len(),
        }
    }

    /// Owned copy of the vector at `row`. Panics if `row` is out of range;
    /// stores only call this with validated ids.
    pub fn vector(&self, row: usize) -> VectorData {
        let dim = self.dim();
        let span = row * dim..(row + 1) * dim;
        match self {
            VectorArena::F32 { data, .. } => VectorData::F32(data[span].to_vec()),
            VectorArena::I8 { data, .. } => VectorData::I8(data[span].to_vec()),
            VectorArena::I16 { data, .. } => VectorData::I16(data[span].to_vec()),
            VectorArena::I32 { data, .. } => VectorData::I32(data[span].to_vec()),
        }
    }

    /// Quantize a float arena row by row into the codec's integer width.
    pub fn quantize(&self, codec: &ScalarCodec) -> Result<VectorArena, StoreError> {
        let (dim, data) = match self {
            VectorArena::F32 { dim, data } => (*dim, data.as_slice()),
            other => {
                return Err(StoreError::Backend(format!(
                    "cannot quantize {} vectors, expected f32",
                    other.kind()
                )))
            }
        };
        let rows = data.chunks(dim.max(1));
        Ok(if codec.bits() <= 8 {
            let mut out = Vec::with_capacity(data.len());
            for row in rows {
                if let VectorData::I8(q) = codec.encode(row) {
                    out.extend_from_slice(&q);
                }
            }
            VectorArena::I8 { dim, data: out }
        } else if codec.bits() <= 16 {
            let mut out = Vec::with_capacity(data.len());
            for row in rows {
                if let VectorData::I16(q) = codec.encode(row) {
                    out.extend_from_slice(&q);
                }
            }
            VectorArena::I16 { dim, data: out }
        } else {
            let mut out = Vec::with_capacity(data.len());
            for row in rows {
                if let VectorData::I32(q) = codec.encode(row) {
                    out.extend_from_slice(&q);
                }
            }
            VectorArena::I32 { dim, data: out }
        })
    }
}

/// Node rows: dense ids plus the vector arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTable {
    pub ids: Vec<NodeId>,
    pub vectors: VectorArena,
}

/// Directed layered edges in column form, one row per edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeTable {
    pub sources: Vec<NodeId>,
    pub targets: Vec<NodeId>,
    pub layers: Vec<u32>,
}

impl EdgeTable {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Document texts; row order is aligned with node ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocTable {
    pub texts: Vec<String>,
}

/// The three tables of one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphTables {
    pub nodes: NodeTable,
    pub edges: EdgeTable,
    pub docs: DocTable,
}

impl GraphTables {
    /// Check the structural invariants the search relies on. Returns a
    /// description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let count = self.nodes.ids.len();
        let dim = self.nodes.vectors.dim();

        if count > 0 && dim == 0 {
            return Err(format!("{count} nodes declared with vector dimension 0"));
        }
        if self.nodes.vectors.raw_len() != count * dim {
            return Err(format!(
                "vector arena holds {} components, expected {} ({} nodes x {} dims)",
                self.nodes.vectors.raw_len(),
                count * dim,
                count,
                dim
            ));
        }
        for (row, &id) in self.nodes.ids.iter().enumerate() {
            if id as usize != row {
                return Err(format!(
                    "node ids must be dense row offsets: row {row} carries id {id}"
                ));
            }
        }

        if self.edges.targets.len() != self.edges.sources.len()
            || self.edges.layers.len() != self.edges.sources.len()
        {
            return Err(format!(
                "edge columns disagree on length: {} sources, {} targets, {} layers",
                self.edges.sources.len(),
                self.edges.targets.len(),
                self.edges.layers.len()
            ));
        }
        for i in 0..self.edges.len() {
            let source = self.edges.sources[i];
            let target = self.edges.targets[i];
            if source as usize >= count || target as usize >= count {
                return Err(format!(
                    "edge {i} references a node outside 0..{count}: {source} -> {target}"
                ));
            }
            let layer = self.edges.layers[i];
            if layer > 63 {
                return Err(format!(
                    "edge {i} sits at layer {layer}, above the deepest reachable layer 63"
                ));
            }
        }

        if self.docs.texts.len() != count {
            return Err(format!(
                "docs table holds {} rows but the graph has {count} nodes; \
                 text lookups by node id would silently misalign",
                self.docs.texts.len()
            ));
        }

        Ok(())
    }
}
