//! Per-scale candidate retrieval for the unaligned pool.
//!
//! Each scale retrieves independently: source vectors are projected, the
//! target side is indexed, and every pool entity with coverage gets its
//! top-K candidates. Scores are min-max normalized per query so that scales
//! with different score ranges fuse on equal footing.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::dataset::{EntityId, Scale};
use crate::encoder::EmbeddingSet;
use crate::error::Result;
use crate::hypergraph::{ScaleHypergraph, ScaleIndex};
use crate::projection::{RelationAlignment, ScaleProjector};
use crate::seeds::UnalignedPool;

/// One retrieved candidate with its raw blended score and the per-query
/// normalized score used downstream by fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub target: EntityId,
    pub raw: f32,
    pub normalized: f32,
}

/// All candidate lists produced at one scale in one iteration.
#[derive(Debug, Clone)]
pub struct ScaleCandidates {
    pub scale: Scale,
    pub by_query: BTreeMap<EntityId, Vec<ScoredCandidate>>,
}

impl ScaleCandidates {
    pub fn query_count(&self) -> usize {
        self.by_query.len()
    }

    /// Flattened `(source, target, raw)` rows for the per-scale artifact.
    pub fn rows(&self) -> Vec<(EntityId, EntityId, f32)> {
        self.by_query
            .iter()
            .flat_map(|(&src, candidates)| {
                candidates.iter().map(move |c| (src, c.target, c.raw))
            })
            .collect()
    }
}

/// Runs retrieval for one scale at a time over the unaligned pool.
#[derive(Debug, Clone)]
pub struct MultiScaleRetriever {
    top_k: usize,
    structural_weight: f32,
}

impl MultiScaleRetriever {
    pub fn new(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            structural_weight: config.structural_weight,
        }
    }

    /// Retrieve candidates at one scale. Pool entities without coverage at
    /// the scale are skipped; they simply contribute nothing here.
    #[allow(clippy::too_many_arguments)]
    pub fn retrieve_scale(
        &self,
        projector: &ScaleProjector,
        source: &EmbeddingSet,
        target: &EmbeddingSet,
        source_hypergraph: &ScaleHypergraph,
        target_hypergraph: &ScaleHypergraph,
        alignment: &RelationAlignment,
        pool: &UnalignedPool,
    ) -> Result<ScaleCandidates> {
        let scale = source.scale;
        let index = ScaleIndex::build(target, self.structural_weight)?;
        let mut by_query = BTreeMap::new();
        for id in pool.iter() {
            let vector = match source.get(id) {
                Some(v) => v,
                None => continue,
            };
            let projected = projector.project(vector);
            let hits = index.search(
                &projected,
                source_hypergraph.profile(id),
                target_hypergraph,
                alignment,
                self.top_k,
            )?;
            if hits.is_empty() {
                continue;
            }
            by_query.insert(id, normalize_hits(&hits));
        }
        info!(
            %scale,
            queries = by_query.len(),
            pool = pool.len(),
            "scale retrieval complete"
        );
        Ok(ScaleCandidates { scale, by_query })
    }
}

/// Min-max normalize one candidate list. A single candidate, or a list with
/// no score spread, normalizes to 1.0.
fn normalize_hits(hits: &[crate::hypergraph::Candidate]) -> Vec<ScoredCandidate> {
    let min = hits.iter().map(|c| c.score).fold(f32::INFINITY, f32::min);
    let max = hits.iter().map(|c| c.score).fold(f32::NEG_INFINITY, f32::max);
    let spread = max - min;
    let normalized = hits
        .iter()
        .map(|c| ScoredCandidate {
            target: c.target,
            raw: c.score,
            normalized: if spread > f32::EPSILON {
                (c.score - min) / spread
            } else {
                1.0
            },
        })
        .collect();
    debug!(candidates = hits.len(), "normalized candidate list");
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectionConfig;
    use crate::dataset::Graph;
    use std::collections::BTreeMap;
    use crate::hypergraph::HypergraphBuilder;
    use crate::seeds::SeedSet;

    fn set_from(scale: Scale, rows: &[(u32, Vec<f32>)]) -> EmbeddingSet {
        let dimension = rows.first().map(|(_, v)| v.len()).unwrap_or(0);
        EmbeddingSet::from_vectors(scale, dimension, rows.iter().cloned().collect())
    }

    fn empty_hypergraph(scale: Scale) -> ScaleHypergraph {
        let graph = Graph::new(BTreeMap::new(), BTreeMap::new(), Vec::new());
        HypergraphBuilder.build(&graph, scale)
    }

    fn identity_projector(scale: Scale, source: &EmbeddingSet, target: &EmbeddingSet) -> ScaleProjector {
        ScaleProjector::fit(
            scale,
            source,
            target,
            &SeedSet::new(),
            1.0,
            &ProjectionConfig::default(),
        )
    }

    #[test]
    fn test_normalization_spans_unit_interval() {
        let source = set_from(Scale::Year, &[(0, vec![1.0, 0.0])]);
        let target = set_from(
            Scale::Year,
            &[(10, vec![1.0, 0.0]), (11, vec![0.0, 1.0]), (12, vec![0.6, 0.8])],
        );
        let projector = identity_projector(Scale::Year, &source, &target);
        let retriever = MultiScaleRetriever::new(&RetrievalConfig {
            top_k: 3,
            structural_weight: 0.0,
        });
        let pool = UnalignedPool::new([0u32].into_iter(), &SeedSet::new());
        let out = retriever
            .retrieve_scale(
                &projector,
                &source,
                &target,
                &empty_hypergraph(Scale::Year),
                &empty_hypergraph(Scale::Year),
                &RelationAlignment::default(),
                &pool,
            )
            .unwrap();
        let candidates = &out.by_query[&0];
        assert_eq!(candidates[0].target, 10);
        assert!((candidates[0].normalized - 1.0).abs() < 1e-6);
        assert!((candidates.last().unwrap().normalized).abs() < 1e-6);
    }

    #[test]
    fn test_single_candidate_normalizes_to_one() {
        let source = set_from(Scale::Month, &[(0, vec![1.0])]);
        let target = set_from(Scale::Month, &[(10, vec![1.0])]);
        let projector = identity_projector(Scale::Month, &source, &target);
        let retriever = MultiScaleRetriever::new(&RetrievalConfig::default());
        let pool = UnalignedPool::new([0u32].into_iter(), &SeedSet::new());
        let out = retriever
            .retrieve_scale(
                &projector,
                &source,
                &target,
                &empty_hypergraph(Scale::Month),
                &empty_hypergraph(Scale::Month),
                &RelationAlignment::default(),
                &pool,
            )
            .unwrap();
        assert!((out.by_query[&0][0].normalized - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_uncovered_pool_entities_skipped() {
        // Entity 1 is in the pool but has no vector at this scale.
        let source = set_from(Scale::Day, &[(0, vec![1.0])]);
        let target = set_from(Scale::Day, &[(10, vec![1.0])]);
        let projector = identity_projector(Scale::Day, &source, &target);
        let retriever = MultiScaleRetriever::new(&RetrievalConfig::default());
        let pool = UnalignedPool::new([0u32, 1].into_iter(), &SeedSet::new());
        let out = retriever
            .retrieve_scale(
                &projector,
                &source,
                &target,
                &empty_hypergraph(Scale::Day),
                &empty_hypergraph(Scale::Day),
                &RelationAlignment::default(),
                &pool,
            )
            .unwrap();
        assert_eq!(out.query_count(), 1);
        assert!(!out.by_query.contains_key(&1));
    }
}
