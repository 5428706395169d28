//! Per-scale hypergraphs over temporal and relational context.
//!
//! A hyperedge groups every entity sharing one context at one scale: the
//! same time key, or the same relation. Two entities from different graphs
//! are structurally similar when their hyperedge memberships overlap;
//! relational memberships are compared through the relation alignment.

mod builder;
mod index;

pub use builder::{HypergraphBuilder, ScaleHypergraph};
pub use index::{Candidate, ScaleIndex};

use std::collections::BTreeSet;

use crate::dataset::RelationId;
use crate::projection::RelationAlignment;

/// Hyperedge memberships of one entity at one scale.
#[derive(Debug, Clone, Default)]
pub struct HyperedgeProfile {
    /// Temporal hyperedges, keyed by the grouping key at this scale.
    pub time_keys: BTreeSet<i64>,
    /// Relational hyperedges, keyed by relation id.
    pub relations: BTreeSet<RelationId>,
}

impl HyperedgeProfile {
    pub fn membership_count(&self) -> usize {
        self.time_keys.len() + self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_keys.is_empty() && self.relations.is_empty()
    }
}

/// Cosine-normalized co-membership between a source and a target profile.
/// Time keys compare directly across graphs; relational memberships count
/// as shared when the relation alignment links them.
pub fn co_membership(
    source: &HyperedgeProfile,
    target: &HyperedgeProfile,
    alignment: &RelationAlignment,
) -> f32 {
    let total = (source.membership_count() * target.membership_count()) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let shared_time = source.time_keys.intersection(&target.time_keys).count();
    let shared_relations = source
        .relations
        .iter()
        .filter(|&&r1| target.relations.iter().any(|&r2| alignment.is_aligned(r1, r2)))
        .count();
    (((shared_time + shared_relations) as f64 / total.sqrt()).min(1.0)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(time_keys: &[i64], relations: &[u32]) -> HyperedgeProfile {
        HyperedgeProfile {
            time_keys: time_keys.iter().copied().collect(),
            relations: relations.iter().copied().collect(),
        }
    }

    #[test]
    fn test_co_membership_counts_shared_time_keys() {
        let alignment = RelationAlignment::default();
        let a = profile(&[2000, 2001], &[]);
        let b = profile(&[2001, 2002], &[]);
        let sim = co_membership(&a, &b, &alignment);
        assert!((sim - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_relations_need_alignment_to_count() {
        let a = profile(&[], &[0]);
        let b = profile(&[], &[5]);
        assert_eq!(co_membership(&a, &b, &RelationAlignment::default()), 0.0);
    }

    #[test]
    fn test_empty_profile_scores_zero() {
        let a = profile(&[2000], &[1]);
        assert_eq!(co_membership(&a, &HyperedgeProfile::default(), &RelationAlignment::default()), 0.0);
    }
}
