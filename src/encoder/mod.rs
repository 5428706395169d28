//! Entity embedding backends.
//!
//! The pipeline treats the encoder as an opaque capability producing a
//! fixed-size vector per entity under a chosen temporal scale; any backend
//! satisfying [`EmbeddingBackend`] is substitutable.

mod structural;
mod traits;

pub use structural::StructuralEncoder;
pub use traits::{EmbeddingBackend, EmbeddingSet};
