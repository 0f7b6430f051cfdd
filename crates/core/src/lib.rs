//! # strata-core
//!
//! Approximate nearest neighbor search over a pre-built multi-layer proximity
//! graph held in external storage. The engine descends the graph layer by
//! layer, expanding a bounded best-list through batched neighbor lookups, and
//! never materializes the full graph in memory.
//!
//! Graph construction is out of scope: datasets arrive as node/edge/doc
//! tables written by an offline build step, and this crate only reads them
//! through the narrow [`store::GraphStore`] capability.

/// Per-search candidate memo: fetched vectors, distances, and expansion marks.
pub mod cache;
/// Global configuration constants: limits and defaults.
pub mod config;
/// Squared Euclidean distance with strict dimension checking.
pub mod distance;
/// Query encoding seam: text in, embedding vector out.
pub mod encoder;
/// The layer-descending beam search engine and its distance strategies.
pub mod engine;
/// Error types for search, encoding, and storage failures.
pub mod error;
/// Scalar quantization: f32 vectors to fixed-width integers and back.
pub mod quantization;
/// Query sessions: generation-counted coordination of encoder, engine, and docs.
pub mod session;
/// Graph storage: the `GraphStore` trait, table layout, and the local adapter.
pub mod store;
