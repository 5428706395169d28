//! Confirmed alignment seeds and the unaligned pool.
//!
//! The seed set is an injective partial mapping: a source entity maps to at
//! most one target entity and vice versa, at all times. Seeds accumulate
//! monotonically; nothing here revokes an earlier pair.

use std::collections::BTreeMap;

use crate::dataset::EntityId;

/// Injective partial mapping between source and target entities.
#[derive(Debug, Clone, Default)]
pub struct SeedSet {
    forward: BTreeMap<EntityId, EntityId>,
    reverse: BTreeMap<EntityId, EntityId>,
    /// Fused confidence for pairs produced by fusion; reference pairs
    /// carry full confidence.
    confidence: BTreeMap<EntityId, f32>,
}

impl SeedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the reference alignment. Pairs violating injectivity
    /// against earlier reference pairs are skipped.
    pub fn from_reference(pairs: &[(EntityId, EntityId)]) -> Self {
        let mut seeds = Self::new();
        for &(src, tgt) in pairs {
            seeds.insert(src, tgt, 1.0);
        }
        seeds
    }

    /// Insert a pair if neither side is already claimed. Returns whether
    /// the pair was accepted.
    pub fn insert(&mut self, src: EntityId, tgt: EntityId, confidence: f32) -> bool {
        if self.forward.contains_key(&src) || self.reverse.contains_key(&tgt) {
            return false;
        }
        self.forward.insert(src, tgt);
        self.reverse.insert(tgt, src);
        self.confidence.insert(src, confidence);
        true
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn contains_source(&self, src: EntityId) -> bool {
        self.forward.contains_key(&src)
    }

    pub fn contains_target(&self, tgt: EntityId) -> bool {
        self.reverse.contains_key(&tgt)
    }

    pub fn target_of(&self, src: EntityId) -> Option<EntityId> {
        self.forward.get(&src).copied()
    }

    /// Pairs in source-id order.
    pub fn pairs(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.forward.iter().map(|(&s, &t)| (s, t))
    }

    /// Pairs with fused confidence, in source-id order.
    pub fn scored_pairs(&self) -> impl Iterator<Item = (EntityId, EntityId, f32)> + '_ {
        self.forward.iter().map(|(&s, &t)| {
            let conf = self.confidence.get(&s).copied().unwrap_or(1.0);
            (s, t, conf)
        })
    }
}

/// Source entities not yet present in any seed pair. Its shrinking size is
/// the pipeline's measure of progress.
#[derive(Debug, Clone)]
pub struct UnalignedPool {
    entities: Vec<EntityId>,
}

impl UnalignedPool {
    /// All source entities minus those already seeded, in id order.
    pub fn new(all_source: impl Iterator<Item = EntityId>, seeds: &SeedSet) -> Self {
        let entities = all_source.filter(|&id| !seeds.contains_source(id)).collect();
        Self { entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.binary_search(&id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    /// Remove newly seeded entities. The pool only ever shrinks.
    pub fn remove_aligned(&mut self, seeds: &SeedSet) {
        self.entities.retain(|&id| !seeds.contains_source(id));
    }
}
