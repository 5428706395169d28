//! Exact nearest-neighbor index over one scale's target embeddings.

use tracing::debug;

use crate::dataset::{EntityId, Scale};
use crate::encoder::EmbeddingSet;
use crate::error::{IndexError, Result};
use crate::hypergraph::builder::ScaleHypergraph;
use crate::hypergraph::{co_membership, HyperedgeProfile};
use crate::projection::RelationAlignment;

/// A retrieved target candidate with its blended similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub target: EntityId,
    pub score: f32,
}

/// Flat index over the target side of one scale. Search is exhaustive;
/// candidate sets per scale are small enough that exactness is worth more
/// than sublinear lookup.
#[derive(Debug)]
pub struct ScaleIndex {
    scale: Scale,
    dimension: usize,
    entries: Vec<(EntityId, Vec<f32>)>,
    structural_weight: f32,
}

impl ScaleIndex {
    /// Build from the target-side embeddings at this scale.
    pub fn build(target: &EmbeddingSet, structural_weight: f32) -> Result<Self> {
        if target.is_empty() {
            return Err(IndexError::EmptyIndex(target.scale.to_string()).into());
        }
        let entries: Vec<(EntityId, Vec<f32>)> = target
            .vectors
            .iter()
            .map(|(&id, v)| (id, v.clone()))
            .collect();
        debug!(scale = %target.scale, entries = entries.len(), "built scale index");
        Ok(Self {
            scale: target.scale,
            dimension: target.dimension,
            entries,
            structural_weight,
        })
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-`k` candidates for one projected query vector, blending cosine
    /// similarity with hyperedge co-membership. Ties break toward the lower
    /// target id so runs are reproducible.
    pub fn search(
        &self,
        query: &[f32],
        query_profile: Option<&HyperedgeProfile>,
        target_hypergraph: &ScaleHypergraph,
        alignment: &RelationAlignment,
        k: usize,
    ) -> Result<Vec<Candidate>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            }
            .into());
        }
        let mut candidates: Vec<Candidate> = self
            .entries
            .iter()
            .map(|(id, vector)| {
                let cosine = dot(query, vector);
                let structural = match (query_profile, target_hypergraph.profile(*id)) {
                    (Some(qp), Some(tp)) => co_membership(qp, tp, alignment),
                    _ => 0.0,
                };
                let score = (1.0 - self.structural_weight) * cosine
                    + self.structural_weight * structural;
                Candidate { target: *id, score }
            })
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.target.cmp(&b.target)));
        candidates.truncate(k);
        Ok(candidates)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
