//! Query encoding seam.
//!
//! Turning query text into an embedding vector happens outside this crate:
//! a model server, an embedded runtime, or precomputed vectors. Sessions
//! only depend on this one async call, so tests and tools can plug in
//! whatever produces a vector of the dataset's dimension.

use async_trait::async_trait;

use crate::error::Result;

/// Converts query text into an embedding vector.
///
/// Pooling and normalization are the encoder's concern; the search treats
/// the output as an opaque point in the corpus vector space. Implementations
/// report failures as [`crate::error::SearchError::Embedding`].
#[async_trait]
pub trait QueryEncoder: Send + Sync {
    /// Embed one query string into an f32 vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
