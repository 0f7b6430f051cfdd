//! Global configuration constants for strata.
//!
//! All defaults and input validation limits are defined here. These are
//! compile-time constants; per-call values arrive through `SessionConfig`
//! and CLI arguments in the `strata` binary.

/// Default number of results (`k`) returned per query.
pub const DEFAULT_K: usize = 5;

/// Default beam width (`ef`) during search.
///
/// Upper bound on the working best-list at every layer. Higher values
/// improve recall at the cost of more storage round-trips per layer.
pub const DEFAULT_EF: usize = 20;

/// Default scalar quantization precision in bits per dimension.
///
/// 8 bits packs each component into an `i8` for a 4x size reduction over
/// f32 while keeping neighbor ordering intact for well-spread embeddings.
pub const DEFAULT_BITS_PER_DIMENSION: u32 = 8;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`k`) per search call.
pub const MAX_K: usize = 10_000;

/// Maximum beam width (`ef`) per search call.
pub const MAX_EF: usize = 10_000;
