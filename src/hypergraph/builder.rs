//! Hypergraph construction from a loaded graph.

use std::collections::BTreeMap;

use tracing::debug;

use crate::dataset::{EntityId, Graph, Scale};
use crate::hypergraph::HyperedgeProfile;

/// The hyperedge memberships of every covered entity at one scale.
#[derive(Debug, Clone)]
pub struct ScaleHypergraph {
    pub scale: Scale,
    profiles: BTreeMap<EntityId, HyperedgeProfile>,
    edge_count: usize,
}

impl ScaleHypergraph {
    pub fn profile(&self, id: EntityId) -> Option<&HyperedgeProfile> {
        self.profiles.get(&id)
    }

    /// Entities with at least one membership at this scale.
    pub fn covered(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.profiles.keys().copied()
    }

    pub fn covered_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

/// Builds one hypergraph per scale from the graph's temporal triples.
#[derive(Debug, Clone, Copy, Default)]
pub struct HypergraphBuilder;

impl HypergraphBuilder {
    /// Decompose `graph` at `scale`. Entities whose stamps are all coarser
    /// than the scale get no temporal memberships there; an entity with no
    /// memberships at all is left out entirely.
    pub fn build(&self, graph: &Graph, scale: Scale) -> ScaleHypergraph {
        let mut profiles: BTreeMap<EntityId, HyperedgeProfile> = BTreeMap::new();
        for (&id, _) in &graph.entities {
            let time_keys = graph.entity_time_keys(id, scale);
            if time_keys.is_empty() {
                continue;
            }
            let relations = graph
                .incident_triples(id)
                .filter(|t| t.head == id)
                .map(|t| t.relation)
                .collect();
            profiles.insert(
                id,
                HyperedgeProfile {
                    time_keys,
                    relations,
                },
            );
        }
        // Distinct hyperedges: one per observed time key plus one per
        // relation that appears in some profile.
        let mut time_edges = std::collections::BTreeSet::new();
        let mut relation_edges = std::collections::BTreeSet::new();
        for profile in profiles.values() {
            time_edges.extend(profile.time_keys.iter().copied());
            relation_edges.extend(profile.relations.iter().copied());
        }
        let edge_count = time_edges.len() + relation_edges.len();
        debug!(
            %scale,
            covered = profiles.len(),
            edges = edge_count,
            "built scale hypergraph"
        );
        ScaleHypergraph {
            scale,
            profiles,
            edge_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Entity, TemporalTriple, TimeStamp};

    fn graph() -> Graph {
        let entities = [(0u32, "a"), (1, "b"), (2, "c")]
            .into_iter()
            .map(|(id, name)| {
                (
                    id,
                    Entity {
                        id,
                        name: name.to_string(),
                    },
                )
            })
            .collect();
        let relations = [(0u32, "met".to_string()), (1, "left".to_string())]
            .into_iter()
            .collect();
        let triples = vec![
            TemporalTriple {
                head: 0,
                relation: 0,
                tail: 1,
                start: TimeStamp::parse("2010-06-01"),
                end: None,
            },
            TemporalTriple {
                head: 2,
                relation: 1,
                tail: 1,
                start: TimeStamp::parse("2010"),
                end: None,
            },
        ];
        Graph::new(entities, relations, triples)
    }

    #[test]
    fn test_coarse_entities_missing_at_fine_scale() {
        let graph = graph();
        let builder = HypergraphBuilder;
        let day = builder.build(&graph, Scale::Day);
        assert!(day.profile(0).is_some());
        assert!(day.profile(2).is_none());
        // Only the endpoints of the day-stamped triple are covered.
        assert_eq!(day.covered_count(), 2);
        assert_eq!(day.covered().collect::<Vec<_>>(), vec![0, 1]);

        let year = builder.build(&graph, Scale::Year);
        assert!(year.profile(2).is_some());
        assert_eq!(year.covered_count(), 3);
        // Both triples share the 2010 temporal hyperedge at year scale.
        assert_eq!(
            year.profile(0).unwrap().time_keys,
            year.profile(2).unwrap().time_keys
        );
    }

    #[test]
    fn test_head_side_relations_recorded() {
        let graph = graph();
        let year = HypergraphBuilder.build(&graph, Scale::Year);
        let p0 = year.profile(0).unwrap();
        assert!(p0.relations.contains(&0));
        assert!(!p0.relations.contains(&1));
        // Entity 1 only appears as tail; it has temporal membership but no
        // relational one.
        let p1 = year.profile(1).unwrap();
        assert!(p1.relations.is_empty());
    }
}
