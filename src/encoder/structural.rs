//! Built-in deterministic structural embedding backend.
//!
//! Each entity is embedded by feature-hashing its temporal keys at the
//! requested scale together with its relation and neighborhood context into
//! signed buckets, followed by a few rounds of neighborhood smoothing. The
//! backend is fully deterministic for a fixed seed, which keeps pipeline
//! runs reproducible without an external model.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::EncoderConfig;
use crate::dataset::{EntityId, Graph, Scale};
use crate::encoder::traits::{EmbeddingBackend, EmbeddingSet};
use crate::error::{EncodingError, Result};
use crate::seeds::SeedSet;

/// Smoothing converges within a handful of rounds; larger epoch requests
/// are clamped so the structural backend stays cheap.
const MAX_SMOOTHING_ROUNDS: usize = 4;

#[derive(Debug, Clone)]
pub struct StructuralEncoder {
    dimension: usize,
    rounds: usize,
    smoothing: f32,
    seed: u64,
}

impl StructuralEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            dimension: config.dimension,
            rounds: config.epochs.min(MAX_SMOOTHING_ROUNDS),
            smoothing: config.smoothing,
            seed: config.seed,
        }
    }

    /// Map a feature string to a signed bucket.
    fn bucket(&self, feature: &str) -> (usize, f32) {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(raw) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    /// Hash an entity's context at `scale` into a normalized vector, or
    /// `None` when the entity has no temporal fact resolvable at the scale.
    fn raw_vector(&self, graph: &Graph, id: EntityId, scale: Scale) -> Option<Vec<f32>> {
        let keys = graph.entity_time_keys(id, scale);
        if keys.is_empty() {
            return None;
        }
        let mut vector = vec![0.0f32; self.dimension];
        let mut add = |feature: &str| {
            let (index, sign) = self.bucket(feature);
            vector[index] += sign;
        };
        for key in &keys {
            add(&format!("time:{scale}:{key}"));
        }
        for triple in graph.incident_triples(id) {
            let relation = graph
                .relation_name(triple.relation)
                .unwrap_or_default()
                .to_lowercase();
            if triple.head == id {
                add(&format!("rel:{relation}"));
                let tail = graph.entity_name(triple.tail).unwrap_or_default();
                add(&format!("nbr:{}", tail.to_lowercase()));
            }
            if triple.tail == id {
                add(&format!("inv:{relation}"));
                let head = graph.entity_name(triple.head).unwrap_or_default();
                add(&format!("nbr:{}", head.to_lowercase()));
            }
        }
        let name = graph.entity_name(id).unwrap_or_default().to_lowercase();
        for token in name.split_whitespace() {
            add(&format!("tok:{token}"));
        }
        normalize(&mut vector);
        Some(vector)
    }

    /// One round of neighborhood smoothing over embedded entities.
    fn smooth(
        &self,
        graph: &Graph,
        vectors: &BTreeMap<EntityId, Vec<f32>>,
    ) -> BTreeMap<EntityId, Vec<f32>> {
        let mut next = BTreeMap::new();
        for (&id, vector) in vectors {
            let mut mean = vec![0.0f32; self.dimension];
            let mut count = 0usize;
            for neighbor in graph.neighbors(id) {
                if let Some(nv) = vectors.get(&neighbor) {
                    for (m, v) in mean.iter_mut().zip(nv) {
                        *m += v;
                    }
                    count += 1;
                }
            }
            let mut smoothed = vector.clone();
            if count > 0 {
                let scale = self.smoothing / count as f32;
                for (s, m) in smoothed.iter_mut().zip(&mean) {
                    *s += scale * m;
                }
                normalize(&mut smoothed);
            }
            next.insert(id, smoothed);
        }
        next
    }
}

#[async_trait]
impl EmbeddingBackend for StructuralEncoder {
    async fn embed_graph(
        &self,
        graph: &Graph,
        scale: Scale,
        _seeds: &SeedSet,
    ) -> Result<EmbeddingSet> {
        if self.dimension == 0 {
            return Err(EncodingError::Backend("embedding dimension is zero".to_string()).into());
        }
        let mut vectors = BTreeMap::new();
        for &id in graph.entities.keys() {
            if let Some(vector) = self.raw_vector(graph, id, scale) {
                vectors.insert(id, vector);
            }
        }
        for _ in 0..self.rounds {
            vectors = self.smooth(graph, &vectors);
        }
        debug!(
            %scale,
            embedded = vectors.len(),
            total = graph.entity_count(),
            "structural encoding complete"
        );
        Ok(EmbeddingSet::from_vectors(scale, self.dimension, vectors))
    }

    fn dimension(&self) -> usize {
        self.dimension
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
