//! Query sessions: encoder, engine, and document resolution under one
//! generation counter.
//!
//! A session owns the long-lived handles for repeated queries against one
//! dataset. Each `search` call claims the next generation number before its
//! future first runs; after every await the claim is rechecked against the
//! counter, so issuing a newer query makes older in-flight calls resolve to
//! [`SearchOutcome::Superseded`] instead of racing to deliver stale hits.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::config;
use crate::encoder::QueryEncoder;
use crate::engine::{DistanceStrategy, SearchEngine};
use crate::error::Result;
use crate::store::{GraphStore, NodeId};

/// Per-session search parameters.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Results returned per query.
    pub k: usize,
    /// Beam width at every layer of the descent.
    pub ef: usize,
    /// Distance space: raw floats or dequantized integers.
    pub strategy: DistanceStrategy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            k: config::DEFAULT_K,
            ef: config::DEFAULT_EF,
            strategy: DistanceStrategy::Raw,
        }
    }
}

/// One matched document: the node id (which is also the docs-table row) and
/// its text.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub node_id: NodeId,
    pub text: String,
}

/// What became of one search call.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The call stayed the latest generation throughout. Hits are ordered
    /// closest first.
    Completed(Vec<Hit>),
    /// A newer search was issued while this one was in flight; its partial
    /// work was discarded.
    Superseded,
}

/// Binds an encoder, a search engine, and document retrieval for repeated
/// queries against one dataset.
pub struct SearchSession<S, E> {
    engine: SearchEngine<S>,
    store: Arc<S>,
    encoder: Arc<E>,
    config: SessionConfig,
    generation: AtomicU64,
}

impl<S: GraphStore, E: QueryEncoder> SearchSession<S, E> {
    /// Build a session. Fails if the configured strategy is invalid.
    pub fn new(store: Arc<S>, encoder: Arc<E>, config: SessionConfig) -> Result<Self> {
        let engine = SearchEngine::new(Arc::clone(&store), config.strategy)?;
        Ok(Self {
            engine,
            store,
            encoder,
            config,
            generation: AtomicU64::new(0),
        })
    }

    /// Generation of the most recently issued search, 0 before the first.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Issue a search for `text`.
    ///
    /// The generation is claimed here, not on first poll, so the order of
    /// `search` calls decides which one is the latest regardless of how the
    /// returned futures are scheduled.
    pub fn search<'a>(&'a self, text: &str) -> impl Future<Output = Result<SearchOutcome>> + 'a {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let text = text.to_owned();
        async move { self.run(generation, &text).await }
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run(&self, generation: u64, text: &str) -> Result<SearchOutcome> {
        let query = self.encoder.embed(text).await?;
        if !self.is_latest(generation) {
            debug!("search generation {} superseded during encoding", generation);
            return Ok(SearchOutcome::Superseded);
        }

        let ids = self
            .engine
            .search(&query, self.config.k, self.config.ef)
            .await?;
        if !self.is_latest(generation) {
            debug!("search generation {} superseded during traversal", generation);
            return Ok(SearchOutcome::Superseded);
        }

        let mut hits = Vec::with_capacity(ids.len());
        for id in ids {
            if !self.is_latest(generation) {
                debug!(
                    "search generation {} superseded during document fetch",
                    generation
                );
                return Ok(SearchOutcome::Superseded);
            }
            let text = self.store.fetch_text(id).await?;
            hits.push(Hit { node_id: id, text });
        }

        Ok(SearchOutcome::Completed(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::store::{
        DocTable, EdgeTable, GraphTables, LocalGraphStore, NodeTable, VectorArena,
    };
    use async_trait::async_trait;

    /// Encoder stub that returns the same vector for any text.
    struct FixedEncoder(Vec<f32>);

    #[async_trait]
    impl QueryEncoder for FixedEncoder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FailingEncoder;

    #[async_trait]
    impl QueryEncoder for FailingEncoder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(SearchError::Embedding("model offline".to_string()))
        }
    }

    fn four_node_store() -> Arc<LocalGraphStore> {
        let mut edges = EdgeTable::default();
        for s in 0..4u32 {
            for t in 0..4u32 {
                if s != t {
                    edges.sources.push(s);
                    edges.targets.push(t);
                    edges.layers.push(0);
                }
            }
        }
        let tables = GraphTables {
            nodes: NodeTable {
                ids: vec![0, 1, 2, 3],
                vectors: VectorArena::F32 {
                    dim: 2,
                    data: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 5.0, 5.0],
                },
            },
            edges,
            docs: DocTable {
                texts: vec![
                    "origin".to_string(),
                    "east".to_string(),
                    "north".to_string(),
                    "far corner".to_string(),
                ],
            },
        };
        Arc::new(
            LocalGraphStore::from_tables(tables)
                .unwrap()
                .with_entropy(11),
        )
    }

    fn session_with_k(k: usize) -> SearchSession<LocalGraphStore, FixedEncoder> {
        SearchSession::new(
            four_node_store(),
            Arc::new(FixedEncoder(vec![0.0, 0.0])),
            SessionConfig {
                k,
                ef: 4,
                strategy: DistanceStrategy::Raw,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_resolves_documents() {
        let session = session_with_k(2);
        let outcome = session.search("anything").await.unwrap();
        let hits = match outcome {
            SearchOutcome::Completed(hits) => hits,
            SearchOutcome::Superseded => panic!("sole query cannot be superseded"),
        };
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node_id, 0);
        assert_eq!(hits[0].text, "origin");
        assert!(hits[1].text == "east" || hits[1].text == "north");
    }

    #[tokio::test]
    async fn test_newer_search_supersedes_older() {
        let session = session_with_k(2);
        // Claim generations in call order, then poll the older future first.
        let first = session.search("old query");
        let second = session.search("new query");

        let first_outcome = first.await.unwrap();
        assert_eq!(first_outcome, SearchOutcome::Superseded);

        let second_outcome = second.await.unwrap();
        assert!(matches!(second_outcome, SearchOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_generation_counter_increases_monotonically() {
        let session = session_with_k(1);
        assert_eq!(session.current_generation(), 0);
        session.search("one").await.unwrap();
        assert_eq!(session.current_generation(), 1);
        session.search("two").await.unwrap();
        assert_eq!(session.current_generation(), 2);
    }

    #[tokio::test]
    async fn test_sequential_searches_all_complete() {
        let session = session_with_k(1);
        for _ in 0..3 {
            let outcome = session.search("q").await.unwrap();
            assert!(matches!(outcome, SearchOutcome::Completed(_)));
        }
    }

    #[tokio::test]
    async fn test_encoder_failure_propagates() {
        let session = SearchSession::new(
            four_node_store(),
            Arc::new(FailingEncoder),
            SessionConfig::default(),
        )
        .unwrap();
        let err = session.search("q").await.unwrap_err();
        assert!(matches!(err, SearchError::Embedding(_)));
        assert!(err.to_string().contains("model offline"));
    }

    #[tokio::test]
    async fn test_default_config_uses_documented_values() {
        let config = SessionConfig::default();
        assert_eq!(config.k, crate::config::DEFAULT_K);
        assert_eq!(config.ef, crate::config::DEFAULT_EF);
        assert!(matches!(config.strategy, DistanceStrategy::Raw));
    }
}
