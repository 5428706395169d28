//! Scaleweave: iterative multi-scale entity alignment for temporal
//! knowledge graphs.
//!
//! Two graphs carrying time-stamped facts at mixed granularities (year,
//! month, day) are aligned iteratively: entities are embedded per scale,
//! projected into a shared space, retrieved against per-scale hypergraph
//! indexes, and fused across scales into new seed pairs until the unaligned
//! pool is exhausted or progress stalls.

pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod fusion;
pub mod hypergraph;
pub mod orchestrator;
pub mod projection;
pub mod retrieval;
pub mod seeds;

pub use artifacts::ArtifactStore;
pub use config::Config;
pub use dataset::{load_graph_store, Graph, GraphStore, Scale, TimeStamp};
pub use encoder::{EmbeddingBackend, EmbeddingSet, StructuralEncoder};
pub use error::{AlignError, Result};
pub use fusion::{PrecisionTracker, ScaleWeaver};
pub use hypergraph::{HypergraphBuilder, ScaleIndex};
pub use orchestrator::{AlignmentPipeline, AlignmentReport, RunMode, StopReason};
pub use projection::{RelationAligner, ScaleHealth, ScaleProjector};
pub use retrieval::MultiScaleRetriever;
pub use seeds::{SeedSet, UnalignedPool};
