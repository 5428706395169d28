//! Embedding backend trait definitions.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::dataset::{EntityId, Graph, Scale};
use crate::error::Result;
use crate::seeds::SeedSet;

/// Per-scale embedding vectors for one graph. Owned by the iteration that
/// produced it; entities with no qualifying temporal facts at the scale are
/// simply absent.
#[derive(Debug, Clone)]
pub struct EmbeddingSet {
    pub scale: Scale,
    pub dimension: usize,
    pub vectors: BTreeMap<EntityId, Vec<f32>>,
}

impl EmbeddingSet {
    pub fn new(scale: Scale, dimension: usize) -> Self {
        Self {
            scale,
            dimension,
            vectors: BTreeMap::new(),
        }
    }

    pub fn from_vectors(
        scale: Scale,
        dimension: usize,
        vectors: BTreeMap<EntityId, Vec<f32>>,
    ) -> Self {
        Self {
            scale,
            dimension,
            vectors,
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&[f32]> {
        self.vectors.get(&id).map(|v| v.as_slice())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.vectors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Fraction of the graph's entities represented at this scale.
    pub fn coverage(&self, graph: &Graph) -> f64 {
        if graph.entity_count() == 0 {
            return 0.0;
        }
        self.vectors.len() as f64 / graph.entity_count() as f64
    }
}

/// Trait for embedding backends.
///
/// A backend may condition on the current seed set (supervision from prior
/// iterations); the built-in structural backend does not need it. The call
/// is treated as blocking with no cancellation: a long-running backend runs
/// to completion.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed every entity of `graph` with coverage at `scale`.
    async fn embed_graph(
        &self,
        graph: &Graph,
        scale: Scale,
        seeds: &SeedSet,
    ) -> Result<EmbeddingSet>;

    /// Return the embedding dimension.
    fn dimension(&self) -> usize;
}
