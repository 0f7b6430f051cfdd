//! Per-search candidate memo.
//!
//! One `CandidateCache` lives for exactly one search call. It remembers every
//! node the search has touched: the decoded vector, the computed distance,
//! and a per-layer bitmask of where the node's neighbors were already
//! expanded. Its key set doubles as the engine's exclusion list, so storage
//! never returns a node the search has already ranked.

use std::collections::HashMap;

use crate::store::NodeId;

#[derive(Debug)]
struct CacheEntry {
    vector: Vec<f32>,
    distance: f32,
    /// Bit `i` set means this node was expanded at layer `i`. Layers above
    /// 63 cannot occur: the layer count is the log2 of a 64-bit node count.
    expanded_layers: u64,
}

/// Memo of fetched vectors, computed distances, and expansion marks, keyed
/// by node id. First write wins; a node's data never changes within a search.
#[derive(Debug, Default)]
pub struct CandidateCache {
    entries: HashMap<NodeId, CacheEntry>,
}

impl CandidateCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Cached vector and distance for `id`, if this search has seen it.
    pub fn get(&self, id: NodeId) -> Option<(&[f32], f32)> {
        self.entries
            .get(&id)
            .map(|e| (e.vector.as_slice(), e.distance))
    }

    pub fn put(&mut self, id: NodeId, vector: Vec<f32>, distance: f32) {
        self.entries.entry(id).or_insert_with(|| CacheEntry {
            vector,
            distance,
            expanded_layers: 0,
        });
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Every node id this search has touched, in arbitrary order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }

    pub fn mark_expanded(&mut self, id: NodeId, layer: u32) {
        if let Some(e) = self.entries.get_mut(&id) {
            e.expanded_layers |= 1u64 << layer;
        }
    }

    pub fn was_expanded(&self, id: NodeId, layer: u32) -> bool {
        self.entries
            .get(&id)
            .map_or(false, |e| e.expanded_layers & (1u64 << layer) != 0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
