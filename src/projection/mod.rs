//! Scale-adaptive projection into a shared comparison space.
//!
//! One projector is fitted per scale and iteration from the seed pairs with
//! coverage at that scale. Scales with thin supervision fall back to the
//! identity map and are tagged degraded, so they keep participating with a
//! small weight instead of being dropped.

mod relation;

pub use relation::{RelationAligner, RelationAlignment};

use ndarray::{Array1, Array2, Axis};
use tracing::debug;

use crate::config::ProjectionConfig;
use crate::dataset::Scale;
use crate::encoder::EmbeddingSet;
use crate::seeds::SeedSet;

/// Whether a scale carries enough signal to be trusted at full weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleHealth {
    Healthy,
    Degraded,
}

/// Affine map applied to source embeddings, component-wise.
#[derive(Debug, Clone)]
struct AffineMap {
    weight: Array1<f32>,
    bias: Array1<f32>,
}

/// Per-scale projection of source vectors toward the target space.
#[derive(Debug, Clone)]
pub struct ScaleProjector {
    scale: Scale,
    health: ScaleHealth,
    map: Option<AffineMap>,
}

impl ScaleProjector {
    /// Fit a projector from the seed pairs embedded on both sides at this
    /// scale. With fewer than `min_seed_pairs` usable pairs the projector
    /// stays at identity. `coverage` is the weaker side's entity coverage
    /// and decides the health tag.
    pub fn fit(
        scale: Scale,
        source: &EmbeddingSet,
        target: &EmbeddingSet,
        seeds: &SeedSet,
        coverage: f64,
        config: &ProjectionConfig,
    ) -> Self {
        let health = if coverage >= config.min_coverage {
            ScaleHealth::Healthy
        } else {
            ScaleHealth::Degraded
        };
        let pairs: Vec<(&[f32], &[f32])> = seeds
            .pairs()
            .filter_map(|(s, t)| Some((source.get(s)?, target.get(t)?)))
            .collect();
        if pairs.len() < config.min_seed_pairs.max(1) {
            debug!(%scale, usable = pairs.len(), "too few embedded seeds, identity projection");
            return Self {
                scale,
                health,
                map: None,
            };
        }

        let n = pairs.len();
        let d = source.dimension;
        let mut a = Array2::<f32>::zeros((n, d));
        let mut b = Array2::<f32>::zeros((n, d));
        for (row, (src, tgt)) in pairs.iter().enumerate() {
            for j in 0..d {
                a[[row, j]] = src[j];
                b[[row, j]] = tgt[j];
            }
        }
        let (mean_a, mean_b) = match (a.mean_axis(Axis(0)), b.mean_axis(Axis(0))) {
            (Some(ma), Some(mb)) => (ma, mb),
            _ => {
                return Self {
                    scale,
                    health,
                    map: None,
                }
            }
        };
        let centered_a = &a - &mean_a;
        let centered_b = &b - &mean_b;
        let variance = (&centered_a * &centered_a).sum_axis(Axis(0));
        let covariance = (&centered_a * &centered_b).sum_axis(Axis(0));
        // Component-wise least squares; flat components keep unit weight.
        let weight = Array1::from_iter(
            variance
                .iter()
                .zip(covariance.iter())
                .map(|(&var, &cov)| if var > f32::EPSILON { cov / var } else { 1.0 }),
        );
        let bias = &mean_b - &(&weight * &mean_a);
        debug!(%scale, pairs = n, ?health, "fitted scale projection");
        Self {
            scale,
            health,
            map: Some(AffineMap { weight, bias }),
        }
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn health(&self) -> ScaleHealth {
        self.health
    }

    pub fn is_identity(&self) -> bool {
        self.map.is_none()
    }

    /// Project one source vector, renormalized to unit length.
    pub fn project(&self, vector: &[f32]) -> Vec<f32> {
        let mut out = match &self.map {
            Some(map) => vector
                .iter()
                .zip(map.weight.iter())
                .zip(map.bias.iter())
                .map(|((&v, &w), &b)| w * v + b)
                .collect(),
            None => vector.to_vec(),
        };
        normalize(&mut out);
        out
    }

    /// Project a whole embedding set.
    pub fn project_set(&self, set: &EmbeddingSet) -> EmbeddingSet {
        let vectors = set
            .vectors
            .iter()
            .map(|(&id, v)| (id, self.project(v)))
            .collect();
        EmbeddingSet::from_vectors(set.scale, set.dimension, vectors)
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn set_from(scale: Scale, rows: &[(u32, Vec<f32>)]) -> EmbeddingSet {
        let dimension = rows.first().map(|(_, v)| v.len()).unwrap_or(0);
        let vectors: BTreeMap<_, _> = rows.iter().cloned().collect();
        EmbeddingSet::from_vectors(scale, dimension, vectors)
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_identity_fallback_below_min_pairs() {
        let source = set_from(Scale::Year, &[(0, vec![1.0, 0.0])]);
        let target = set_from(Scale::Year, &[(10, vec![0.0, 1.0])]);
        let seeds = SeedSet::from_reference(&[(0, 10)]);
        let config = ProjectionConfig {
            min_seed_pairs: 4,
            ..ProjectionConfig::default()
        };
        let projector = ScaleProjector::fit(Scale::Year, &source, &target, &seeds, 1.0, &config);
        assert!(projector.is_identity());
        let projected = projector.project(&[0.6, 0.8]);
        assert!(cosine(&projected, &[0.6, 0.8]) > 0.999);
    }

    #[test]
    fn test_fit_recovers_componentwise_scaling() {
        // Target vectors are the source with the axes swapped in magnitude:
        // b = (2*a0, 0.5*a1), normalized.
        let rows: Vec<(u32, Vec<f32>)> = (0..6)
            .map(|i| {
                let x = (i as f32).cos();
                let y = (i as f32).sin();
                (i, vec![x, y])
            })
            .collect();
        let target_rows: Vec<(u32, Vec<f32>)> = rows
            .iter()
            .map(|(id, v)| (*id + 100, vec![2.0 * v[0], 0.5 * v[1]]))
            .collect();
        let source = set_from(Scale::Month, &rows);
        let target = set_from(Scale::Month, &target_rows);
        let seeds = SeedSet::from_reference(
            &rows.iter().map(|(id, _)| (*id, *id + 100)).collect::<Vec<_>>(),
        );
        let config = ProjectionConfig::default();
        let projector = ScaleProjector::fit(Scale::Month, &source, &target, &seeds, 1.0, &config);
        assert!(!projector.is_identity());
        for (id, v) in &rows {
            let projected = projector.project(v);
            let mut expected = vec![2.0 * v[0], 0.5 * v[1]];
            normalize(&mut expected);
            assert!(
                cosine(&projected, &expected) > 0.999,
                "entity {id} projected off-direction"
            );
        }
    }

    #[test]
    fn test_health_follows_coverage() {
        let source = set_from(Scale::Day, &[(0, vec![1.0])]);
        let target = set_from(Scale::Day, &[(10, vec![1.0])]);
        let seeds = SeedSet::new();
        let config = ProjectionConfig {
            min_coverage: 0.2,
            ..ProjectionConfig::default()
        };
        let healthy = ScaleProjector::fit(Scale::Day, &source, &target, &seeds, 0.5, &config);
        assert_eq!(healthy.health(), ScaleHealth::Healthy);
        let degraded = ScaleProjector::fit(Scale::Day, &source, &target, &seeds, 0.05, &config);
        assert_eq!(degraded.health(), ScaleHealth::Degraded);
    }
}
