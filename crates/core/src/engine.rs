//! Layer-descending beam search over an externally stored proximity graph.
//!
//! The engine never holds the graph: each expansion round issues one batched
//! neighbor query through [`GraphStore`] and folds the returned nodes into a
//! bounded best-list. Starting from a random entry point at the top layer,
//! rounds repeat at each layer until the best-list stops improving, then the
//! search drops one layer and continues from the same best-list.
//!
//! Distances are computed in either raw f32 space or dequantized integer
//! space, selected by [`DistanceStrategy`].

use std::collections::HashSet;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use tracing::{debug, trace};

use crate::cache::CandidateCache;
use crate::config;
use crate::distance::squared_l2;
use crate::error::{Result, SearchError};
use crate::quantization::{ScalarCodec, VectorData};
use crate::store::{GraphStore, NodeId};

/// Distance space the engine operates in.
///
/// `Raw` expects float32 node data and compares the query against it as-is.
/// `Quantized` expects fixed-width integer node data; the query is quantized
/// once per search and both operands are mapped back through the shared
/// `2^bits - 1` scale, so query and corpus distances stay comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceStrategy {
    Raw,
    Quantized { bits: u32 },
}

/// One entry of the working best-list: a node id and its distance to the
/// query. Kept sorted ascending between expansion rounds.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: OrderedFloat<f32>,
    id: NodeId,
}

/// Beam search engine bound to one graph store and one distance strategy.
/// The strategy is folded into `codec` at construction: `None` compares
/// raw floats, `Some` rounds both operands through the quantizer.
pub struct SearchEngine<S> {
    store: Arc<S>,
    codec: Option<ScalarCodec>,
}

impl<S: GraphStore> SearchEngine<S> {
    /// Build an engine. Fails if the strategy's bit precision is outside the
    /// codec's 1..=31 domain.
    pub fn new(store: Arc<S>, strategy: DistanceStrategy) -> Result<Self> {
        let codec = match strategy {
            DistanceStrategy::Raw => None,
            DistanceStrategy::Quantized { bits } => Some(ScalarCodec::new(bits)?),
        };
        Ok(Self { store, codec })
    }

    /// Map the caller's query into the engine's distance space. Quantized
    /// engines round the query through the codec so it carries the same
    /// quantization error as the stored vectors.
    fn prepare_query(&self, query: &[f32]) -> Result<Vec<f32>> {
        match &self.codec {
            None => Ok(query.to_vec()),
            Some(codec) => codec.decode(&codec.encode(query)),
        }
    }

    /// Map a stored vector into the engine's distance space.
    fn decode_stored(&self, data: &VectorData) -> Result<Vec<f32>> {
        match &self.codec {
            None => match data {
                VectorData::F32(v) => Ok(v.clone()),
                other => Err(SearchError::VectorEncoding {
                    expected: "f32",
                    found: other.kind(),
                }),
            },
            Some(codec) => codec.decode(data),
        }
    }

    /// Find the `k` approximate nearest neighbors of `query`.
    ///
    /// Returns at most `min(k, ef, node count)` ids ordered closest first.
    /// `ef` bounds the working best-list at every layer; the layer count is
    /// recomputed from the store as `floor(log2(count))`, so a dataset swap
    /// behind the store changes the descent depth on the next call.
    ///
    /// `k == 0` runs the full descent and returns nothing; callers use it
    /// to warm storage before the first real query.
    pub async fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<NodeId>> {
        if ef == 0 || ef > config::MAX_EF {
            return Err(SearchError::InvalidParameter(format!(
                "ef must be between 1 and {}, got {}",
                config::MAX_EF,
                ef
            )));
        }
        if k > config::MAX_K {
            return Err(SearchError::InvalidParameter(format!(
                "k must be at most {}, got {}",
                config::MAX_K,
                k
            )));
        }
        if query.len() > config::MAX_DIMENSION {
            return Err(SearchError::InvalidParameter(format!(
                "query dimension {} exceeds the maximum of {}",
                query.len(),
                config::MAX_DIMENSION
            )));
        }
        let count = self.store.count().await?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let max_layer = count.ilog2();

        let query = self.prepare_query(query)?;
        let mut cache = CandidateCache::new();
        let mut best: Vec<Candidate> = Vec::with_capacity(ef + 1);

        // Uniform random entry; the graph carries no stored entry point.
        let entry = self.store.random_node().await?;
        let entry_vector = self.decode_stored(&entry.vector)?;
        let entry_distance = squared_l2(&query, &entry_vector)?;
        cache.put(entry.id, entry_vector, entry_distance);
        best.push(Candidate {
            distance: OrderedFloat(entry_distance),
            id: entry.id,
        });

        let mut rounds = 0usize;
        for layer in (0..=max_layer).rev() {
            self.layer_pass(&query, layer, ef, &mut best, &mut cache, &mut rounds)
                .await?;
        }

        debug!(
            "search done: {} nodes, {} layers, {} rounds, {} candidates seen, returning {}",
            count,
            max_layer + 1,
            rounds,
            cache.len(),
            best.len().min(k)
        );

        Ok(best.iter().take(k).map(|c| c.id).collect())
    }

    /// Expansion rounds at one layer. Each round expands every best-list
    /// node not yet expanded here, fetches their unseen neighbors in one
    /// batched store call, and re-ranks. Rounds stop when nothing new was
    /// admitted (or nothing was left to expand).
    async fn layer_pass(
        &self,
        query: &[f32],
        layer: u32,
        ef: usize,
        best: &mut Vec<Candidate>,
        cache: &mut CandidateCache,
        rounds: &mut usize,
    ) -> Result<()> {
        let rounds_before = *rounds;
        loop {
            let expansion: Vec<NodeId> = best
                .iter()
                .map(|c| c.id)
                .filter(|&id| !cache.was_expanded(id, layer))
                .collect();
            if expansion.is_empty() {
                break;
            }
            for &id in &expansion {
                cache.mark_expanded(id, layer);
            }
            *rounds += 1;

            // Everything this search has touched is excluded: already ranked
            // or already ruled out, either way not worth fetching again.
            let exclude: Vec<NodeId> = cache.node_ids().collect();
            let fetched = self.store.neighbors(&expansion, layer, &exclude).await?;

            let mut improved = false;
            let mut seen_this_round: HashSet<NodeId> = HashSet::new();
            // Admission bar: the worst distance currently held, tracked as a
            // running max while this round pushes new candidates.
            let mut worst = best
                .last()
                .map_or(OrderedFloat(f32::INFINITY), |c| c.distance);

            let fetched_count = fetched.len();
            for node in fetched {
                // Stores may return the same target once per matching edge.
                if !seen_this_round.insert(node.id) {
                    continue;
                }
                let distance = match cache.get(node.id) {
                    Some((_, d)) => d,
                    None => {
                        let vector = self.decode_stored(&node.vector)?;
                        let d = squared_l2(query, &vector)?;
                        cache.put(node.id, vector, d);
                        d
                    }
                };
                let distance = OrderedFloat(distance);
                if best.len() < ef || distance < worst {
                    best.push(Candidate {
                        distance,
                        id: node.id,
                    });
                    worst = worst.max(distance);
                    improved = true;
                }
            }

            // Stable sort: ties keep their admission order.
            best.sort_by(|a, b| a.distance.cmp(&b.distance));
            best.truncate(ef);

            trace!(
                "layer {} round: expanded {}, fetched {}, best-list {}",
                layer,
                expansion.len(),
                fetched_count,
                best.len()
            );

            if !improved {
                break;
            }
        }
        debug!(
            "layer {} pass: {} rounds, best-list {}, {} candidates seen",
            layer,
            *rounds - rounds_before,
            best.len(),
            cache.len()
        );
        Ok(())
    }
}
