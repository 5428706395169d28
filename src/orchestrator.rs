//! The iterative alignment loop.
//!
//! Each iteration runs encoding, projection, retrieval, and fusion, then
//! evaluates the stopping rules: the unaligned pool dropping below its
//! floor, an iteration producing no new pairs, or the iteration cap. Every
//! stage deposits its artifact before the next stage runs, so a run can be
//! inspected or resumed stage by stage.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, instrument};

use crate::artifacts::{keys, ArtifactStore};
use crate::config::Config;
use crate::dataset::{GraphStore, Scale};
use crate::encoder::{EmbeddingBackend, EmbeddingSet};
use crate::error::{ProjectionError, Result};
use crate::fusion::{PrecisionTracker, ScaleWeaver};
use crate::hypergraph::{HypergraphBuilder, ScaleHypergraph, ScaleIndex};
use crate::projection::{RelationAligner, ScaleProjector};
use crate::retrieval::{MultiScaleRetriever, ScaleCandidates};
use crate::seeds::{SeedSet, UnalignedPool};

/// How the pipeline treats the encoding stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Encode, then run the full loop.
    Full,
    /// Encode, write the embedding caches, and stop.
    EncodeOnly,
    /// Load embeddings from the cache instead of calling the backend.
    SkipEncoding,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The unaligned pool fell below the configured floor.
    PoolExhausted,
    /// An iteration produced no new pairs.
    NoProgress,
    /// The iteration cap was reached.
    MaxIterations,
    /// The run was encode-only.
    EncodingOnly,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentReport {
    pub iterations: usize,
    pub stop_reason: StopReason,
    pub seed_count: usize,
    pub pool_remaining: usize,
    /// Pairs accepted per iteration, in order.
    pub new_pairs: Vec<usize>,
}

/// Drives the multi-scale alignment loop over a loaded graph pair.
pub struct AlignmentPipeline {
    config: Config,
    store: GraphStore,
    artifacts: ArtifactStore,
    backend: Box<dyn EmbeddingBackend>,
    mode: RunMode,
}

impl AlignmentPipeline {
    pub fn new(
        config: Config,
        store: GraphStore,
        artifacts: ArtifactStore,
        backend: Box<dyn EmbeddingBackend>,
        mode: RunMode,
    ) -> Self {
        Self {
            config,
            store,
            artifacts,
            backend,
            mode,
        }
    }

    /// Run the loop to completion.
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<AlignmentReport> {
        let mut seeds = SeedSet::from_reference(&self.store.reference_pairs);
        if seeds.is_empty() {
            return Err(ProjectionError::NoUsableSeeds.into());
        }
        let mut pool = UnalignedPool::new(self.store.source.entities.keys().copied(), &seeds);
        let mut precision = PrecisionTracker::new(self.config.fusion.precision_smoothing);
        info!(
            seeds = seeds.len(),
            pool = pool.len(),
            source_entities = self.store.source.entity_count(),
            target_entities = self.store.target.entity_count(),
            "pipeline starting"
        );

        // Hypergraphs depend only on the input triples, never on seeds.
        let builder = HypergraphBuilder;
        let source_hypergraphs: BTreeMap<Scale, ScaleHypergraph> = Scale::ALL
            .iter()
            .map(|&s| (s, builder.build(&self.store.source, s)))
            .collect();
        let target_hypergraphs: BTreeMap<Scale, ScaleHypergraph> = Scale::ALL
            .iter()
            .map(|&s| (s, builder.build(&self.store.target, s)))
            .collect();

        let retriever = MultiScaleRetriever::new(&self.config.retrieval);
        let weaver = ScaleWeaver::new(&self.config.fusion);
        let aligner = RelationAligner::new(&self.config.projection);

        let mut new_pairs = Vec::new();
        let mut stop_reason = StopReason::MaxIterations;
        let mut iterations = 0;

        for iteration in 1..=self.config.orchestrator.max_iterations {
            if pool.len() < self.config.orchestrator.min_kg1_entities {
                stop_reason = StopReason::PoolExhausted;
                break;
            }
            iterations = iteration;
            info!(iteration, pool = pool.len(), seeds = seeds.len(), "iteration starting");

            // Encoding.
            let (source_sets, target_sets) = self.encode_all(&seeds).await?;
            if iteration == 1 {
                self.write_integration_top_pair(&source_sets, &target_sets, &pool)?;
            }
            if self.mode == RunMode::EncodeOnly {
                stop_reason = StopReason::EncodingOnly;
                break;
            }

            // Relation alignment, refreshed as the seed set grows.
            let relations = aligner.align(&self.store.source, &self.store.target, &seeds);
            self.artifacts
                .write_scored_pairs(keys::RELATION_ALIGNMENT, &relations.scored_rows())?;

            // Projection and retrieval, scale by scale.
            let mut healths = BTreeMap::new();
            let mut coverages = BTreeMap::new();
            let mut all_candidates: Vec<ScaleCandidates> = Vec::new();
            for &scale in &Scale::ALL {
                let (source_set, target_set) = (&source_sets[&scale], &target_sets[&scale]);
                if source_set.is_empty() || target_set.is_empty() {
                    info!(%scale, "no coverage on one side, skipping scale");
                    continue;
                }
                let coverage = source_set
                    .coverage(&self.store.source)
                    .min(target_set.coverage(&self.store.target));
                let projector = ScaleProjector::fit(
                    scale,
                    source_set,
                    target_set,
                    &seeds,
                    coverage,
                    &self.config.projection,
                );
                healths.insert(scale, projector.health());
                coverages.insert(scale, coverage);
                let candidates = retriever.retrieve_scale(
                    &projector,
                    source_set,
                    target_set,
                    &source_hypergraphs[&scale],
                    &target_hypergraphs[&scale],
                    &relations,
                    &pool,
                )?;
                self.artifacts
                    .write_scored_pairs(&keys::retriever_outputs(scale), &candidates.rows())?;
                all_candidates.push(candidates);
            }

            // Fusion and seed update.
            let outcome = weaver.fuse(&all_candidates, &healths, &coverages, &precision, &seeds)?;
            self.artifacts
                .write_scored_pairs(keys::FUSION_RESULTS, &outcome.accepted)?;
            for &(src, tgt, confidence) in &outcome.accepted {
                seeds.insert(src, tgt, confidence);
            }
            precision.update(&outcome.accepted, &all_candidates);
            pool.remove_aligned(&seeds);
            let snapshot: Vec<_> = seeds.pairs().collect();
            self.artifacts.write_pairs(keys::SUP_PAIRS, &snapshot)?;

            new_pairs.push(outcome.accepted.len());
            info!(
                iteration,
                accepted = outcome.accepted.len(),
                seeds = seeds.len(),
                pool = pool.len(),
                "iteration complete"
            );
            if outcome.accepted.is_empty() {
                stop_reason = StopReason::NoProgress;
                break;
            }
        }

        let scored: Vec<_> = seeds.scored_pairs().collect();
        self.artifacts.write_scored_pairs(keys::FINAL_ALIGNMENT, &scored)?;
        let report = AlignmentReport {
            iterations,
            stop_reason,
            seed_count: seeds.len(),
            pool_remaining: pool.len(),
            new_pairs,
        };
        info!(
            stop_reason = ?report.stop_reason,
            iterations = report.iterations,
            seeds = report.seed_count,
            "pipeline finished"
        );
        Ok(report)
    }

    /// Encode (or load) both graphs at every scale. Cache files are written
    /// after a fresh encoding so later runs can skip the backend.
    async fn encode_all(
        &self,
        seeds: &SeedSet,
    ) -> Result<(BTreeMap<Scale, EmbeddingSet>, BTreeMap<Scale, EmbeddingSet>)> {
        let dimension = self.backend.dimension();
        if self.mode == RunMode::SkipEncoding {
            let mut source_sets = BTreeMap::new();
            let mut target_sets = BTreeMap::new();
            for &scale in &Scale::ALL {
                let sv = self
                    .artifacts
                    .read_embeddings(&keys::embeddings(1, scale), dimension)?;
                let tv = self
                    .artifacts
                    .read_embeddings(&keys::embeddings(2, scale), dimension)?;
                source_sets.insert(scale, EmbeddingSet::from_vectors(scale, dimension, sv));
                target_sets.insert(scale, EmbeddingSet::from_vectors(scale, dimension, tv));
            }
            info!("loaded embeddings from cache");
            return Ok((source_sets, target_sets));
        }

        let source_futures = Scale::ALL
            .iter()
            .map(|&scale| self.backend.embed_graph(&self.store.source, scale, seeds));
        let target_futures = Scale::ALL
            .iter()
            .map(|&scale| self.backend.embed_graph(&self.store.target, scale, seeds));
        let (source_list, target_list) = futures::future::try_join(
            futures::future::try_join_all(source_futures),
            futures::future::try_join_all(target_futures),
        )
        .await?;

        let mut source_sets = BTreeMap::new();
        let mut target_sets = BTreeMap::new();
        for set in source_list {
            self.artifacts
                .write_embeddings(&keys::embeddings(1, set.scale), &set.vectors)?;
            source_sets.insert(set.scale, set);
        }
        for set in target_list {
            self.artifacts
                .write_embeddings(&keys::embeddings(2, set.scale), &set.vectors)?;
            target_sets.insert(set.scale, set);
        }
        Ok((source_sets, target_sets))
    }

    /// After the first encoding, record each pool entity's nearest target at
    /// the best-covered scale. A quick signal of encoding quality before any
    /// projection has been fitted.
    fn write_integration_top_pair(
        &self,
        source_sets: &BTreeMap<Scale, EmbeddingSet>,
        target_sets: &BTreeMap<Scale, EmbeddingSet>,
        pool: &UnalignedPool,
    ) -> Result<()> {
        let best_scale = Scale::ALL
            .iter()
            .filter(|&&s| !source_sets[&s].is_empty() && !target_sets[&s].is_empty())
            .max_by(|&&a, &&b| {
                let ca = source_sets[&a]
                    .coverage(&self.store.source)
                    .min(target_sets[&a].coverage(&self.store.target));
                let cb = source_sets[&b]
                    .coverage(&self.store.source)
                    .min(target_sets[&b].coverage(&self.store.target));
                ca.total_cmp(&cb)
            })
            .copied();
        let scale = match best_scale {
            Some(s) => s,
            None => {
                info!("no scale covered on both sides, skipping top-pair artifact");
                return Ok(());
            }
        };
        let index = ScaleIndex::build(&target_sets[&scale], 0.0)?;
        let alignment = crate::projection::RelationAlignment::default();
        let target_hypergraph = HypergraphBuilder.build(&self.store.target, scale);
        let mut rows = Vec::new();
        for id in pool.iter() {
            if let Some(vector) = source_sets[&scale].get(id) {
                let hits = index.search(vector, None, &target_hypergraph, &alignment, 1)?;
                if let Some(top) = hits.first() {
                    rows.push((id, top.target, top.score));
                }
            }
        }
        self.artifacts
            .write_scored_pairs(keys::INTEGRATION_TOP_PAIR, &rows)?;
        info!(%scale, pairs = rows.len(), "wrote initial top-pair artifact");
        Ok(())
    }
}
