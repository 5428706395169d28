//! Scale-weave fusion of per-scale candidate lists.
//!
//! Each scale's vote is weighted by its coverage and its historical
//! precision; degraded scales keep a small fixed weight instead of being
//! dropped. A pair's fused score averages only over scales that actually
//! proposed it, so a missing scale contributes nothing rather than a zero.
//! Conflicts are resolved greedily in fused-score order, preserving the
//! injectivity of the seed set.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::FusionConfig;
use crate::dataset::{EntityId, Scale};
use crate::error::{FusionError, Result};
use crate::projection::ScaleHealth;
use crate::retrieval::ScaleCandidates;
use crate::seeds::SeedSet;

/// The weight a scale carries in the current fusion round.
#[derive(Debug, Clone, Copy)]
pub struct ScaleWeight {
    pub scale: Scale,
    pub weight: f64,
    pub degraded: bool,
}

/// Exponentially smoothed per-scale precision, fed back from accepted pairs.
#[derive(Debug, Clone)]
pub struct PrecisionTracker {
    per_scale: BTreeMap<Scale, f64>,
    smoothing: f64,
}

impl PrecisionTracker {
    /// Every scale starts at the neutral prior 0.5.
    pub fn new(smoothing: f64) -> Self {
        let per_scale = Scale::ALL.iter().map(|&s| (s, 0.5)).collect();
        Self {
            per_scale,
            smoothing,
        }
    }

    pub fn precision(&self, scale: Scale) -> f64 {
        self.per_scale.get(&scale).copied().unwrap_or(0.5)
    }

    /// Fold the observed precision of this round into the history: how often
    /// a scale's top candidate agreed with the accepted pair. Scales that
    /// proposed nothing for any accepted source keep their history.
    pub fn update(&mut self, accepted: &[(EntityId, EntityId, f32)], candidates: &[ScaleCandidates]) {
        for per_scale in candidates {
            let mut hits = 0usize;
            let mut total = 0usize;
            for &(src, tgt, _) in accepted {
                if let Some(list) = per_scale.by_query.get(&src) {
                    total += 1;
                    if list.first().is_some_and(|c| c.target == tgt) {
                        hits += 1;
                    }
                }
            }
            if total == 0 {
                continue;
            }
            let observed = hits as f64 / total as f64;
            let entry = self.per_scale.entry(per_scale.scale).or_insert(0.5);
            *entry = self.smoothing * *entry + (1.0 - self.smoothing) * observed;
            debug!(scale = %per_scale.scale, observed, updated = *entry, "precision feedback");
        }
    }
}

/// Result of one fusion round.
#[derive(Debug, Clone)]
pub struct FusionOutcome {
    /// Newly accepted pairs with fused confidence, injective against the
    /// seed set and within the round.
    pub accepted: Vec<(EntityId, EntityId, f32)>,
    /// The weights each scale carried this round, for reporting.
    pub weights: Vec<ScaleWeight>,
}

/// Fuses per-scale candidates into new seed pairs.
#[derive(Debug, Clone)]
pub struct ScaleWeaver {
    config: FusionConfig,
}

impl ScaleWeaver {
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn scale_weight(
        &self,
        scale: Scale,
        health: ScaleHealth,
        coverage: f64,
        precision: &PrecisionTracker,
    ) -> ScaleWeight {
        match health {
            ScaleHealth::Degraded => ScaleWeight {
                scale,
                weight: self.config.degraded_weight,
                degraded: true,
            },
            ScaleHealth::Healthy => ScaleWeight {
                scale,
                weight: coverage * precision.precision(scale),
                degraded: false,
            },
        }
    }

    /// Weave the per-scale candidate lists into accepted pairs.
    ///
    /// `healths` and `coverages` are keyed by scale; `coverages` carries the
    /// weaker side's entity coverage. Candidates for a source entity already
    /// present in the seed set are a caller bug and rejected outright.
    pub fn fuse(
        &self,
        candidates: &[ScaleCandidates],
        healths: &BTreeMap<Scale, ScaleHealth>,
        coverages: &BTreeMap<Scale, f64>,
        precision: &PrecisionTracker,
        seeds: &SeedSet,
    ) -> Result<FusionOutcome> {
        let weights: Vec<ScaleWeight> = candidates
            .iter()
            .map(|c| {
                let health = healths
                    .get(&c.scale)
                    .copied()
                    .unwrap_or(ScaleHealth::Degraded);
                let coverage = coverages.get(&c.scale).copied().unwrap_or(0.0);
                self.scale_weight(c.scale, health, coverage, precision)
            })
            .collect();

        // Accumulate weighted votes per pair, over present scales only.
        let mut votes: BTreeMap<(EntityId, EntityId), PairVote> = BTreeMap::new();
        for (per_scale, weight) in candidates.iter().zip(&weights) {
            for (&src, list) in &per_scale.by_query {
                if seeds.contains_source(src) {
                    return Err(FusionError::UnknownSource(src).into());
                }
                for candidate in list {
                    let vote = votes.entry((src, candidate.target)).or_default();
                    vote.weighted_sum += weight.weight * candidate.normalized as f64;
                    vote.weight_total += weight.weight;
                    vote.max_raw = vote.max_raw.max(candidate.raw);
                }
            }
        }

        let mut scored: Vec<(EntityId, EntityId, f32)> = votes
            .into_iter()
            .filter_map(|((src, tgt), vote)| {
                let fused = vote.fused()?;
                if fused < self.config.min_fused_score
                    || vote.max_raw < self.config.min_raw_similarity
                {
                    return None;
                }
                Some((src, tgt, fused as f32))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then(a.0.cmp(&b.0))
                .then(a.1.cmp(&b.1))
        });

        // Greedy injective resolution against the seed set and this round.
        let mut claimed = seeds.clone();
        let mut accepted = Vec::new();
        for (src, tgt, fused) in scored {
            if claimed.insert(src, tgt, fused) {
                accepted.push((src, tgt, fused));
            }
        }
        info!(
            accepted = accepted.len(),
            scales = weights.len(),
            "fusion round complete"
        );
        Ok(FusionOutcome { accepted, weights })
    }
}

#[derive(Debug, Clone, Copy)]
struct PairVote {
    weighted_sum: f64,
    weight_total: f64,
    max_raw: f32,
}

impl Default for PairVote {
    fn default() -> Self {
        Self {
            weighted_sum: 0.0,
            weight_total: 0.0,
            max_raw: f32::NEG_INFINITY,
        }
    }
}

impl PairVote {
    fn fused(&self) -> Option<f64> {
        if self.weight_total > 0.0 {
            Some(self.weighted_sum / self.weight_total)
        } else {
            None
        }
    }
}
