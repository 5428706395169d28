//! Relation alignment between the two graphs.
//!
//! Relations are matched by name similarity (token overlap plus character
//! bigrams) and, when enabled, by how often they co-occur around already
//! aligned entity pairs. The result is a one-to-many map used when relational
//! hyperedges are compared across graphs.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::ProjectionConfig;
use crate::dataset::{Graph, RelationId};
use crate::seeds::SeedSet;

/// One-to-many relation correspondence with scores in `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct RelationAlignment {
    map: BTreeMap<RelationId, Vec<(RelationId, f64)>>,
}

impl RelationAlignment {
    pub fn is_aligned(&self, source: RelationId, target: RelationId) -> bool {
        self.map
            .get(&source)
            .is_some_and(|targets| targets.iter().any(|&(t, _)| t == target))
    }

    pub fn targets(&self, source: RelationId) -> &[(RelationId, f64)] {
        self.map.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Flattened `(source, target, score)` rows for the artifact file.
    pub fn scored_rows(&self) -> Vec<(RelationId, RelationId, f32)> {
        self.map
            .iter()
            .flat_map(|(&src, targets)| targets.iter().map(move |&(tgt, s)| (src, tgt, s as f32)))
            .collect()
    }
}

/// Scores relation pairs and keeps those above the configured threshold.
#[derive(Debug, Clone)]
pub struct RelationAligner {
    threshold: f64,
    use_cooccurrence: bool,
}

impl RelationAligner {
    pub fn new(config: &ProjectionConfig) -> Self {
        Self {
            threshold: config.relation_text_threshold,
            use_cooccurrence: config.relation_cooccurrence,
        }
    }

    pub fn align(&self, source: &Graph, target: &Graph, seeds: &SeedSet) -> RelationAlignment {
        let cooccurrence = if self.use_cooccurrence {
            Some(CooccurrenceCounts::collect(source, target, seeds))
        } else {
            None
        };

        let mut map: BTreeMap<RelationId, Vec<(RelationId, f64)>> = BTreeMap::new();
        for (&src_id, src_name) in &source.relations {
            for (&tgt_id, tgt_name) in &target.relations {
                let mut score = name_similarity(src_name, tgt_name);
                if let Some(counts) = &cooccurrence {
                    score = score.max(counts.score(src_id, tgt_id));
                }
                if score >= self.threshold {
                    map.entry(src_id).or_default().push((tgt_id, score));
                }
            }
        }
        for targets in map.values_mut() {
            targets.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        }
        let alignment = RelationAlignment { map };
        debug!(
            aligned = alignment.len(),
            source_relations = source.relations.len(),
            target_relations = target.relations.len(),
            "relation alignment complete"
        );
        alignment
    }
}

/// How often relation pairs appear around aligned entity pairs.
struct CooccurrenceCounts {
    joint: BTreeMap<(RelationId, RelationId), usize>,
    source_counts: BTreeMap<RelationId, usize>,
    target_counts: BTreeMap<RelationId, usize>,
}

impl CooccurrenceCounts {
    fn collect(source: &Graph, target: &Graph, seeds: &SeedSet) -> Self {
        let mut joint: BTreeMap<(RelationId, RelationId), usize> = BTreeMap::new();
        let mut source_counts: BTreeMap<RelationId, usize> = BTreeMap::new();
        let mut target_counts: BTreeMap<RelationId, usize> = BTreeMap::new();
        for (s, t) in seeds.pairs() {
            let src_rels: BTreeSet<RelationId> =
                source.entity_relations(s).into_iter().map(|(r, _)| r).collect();
            let tgt_rels: BTreeSet<RelationId> =
                target.entity_relations(t).into_iter().map(|(r, _)| r).collect();
            for &r in &src_rels {
                *source_counts.entry(r).or_default() += 1;
            }
            for &r in &tgt_rels {
                *target_counts.entry(r).or_default() += 1;
            }
            for &r1 in &src_rels {
                for &r2 in &tgt_rels {
                    *joint.entry((r1, r2)).or_default() += 1;
                }
            }
        }
        Self {
            joint,
            source_counts,
            target_counts,
        }
    }

    fn score(&self, source: RelationId, target: RelationId) -> f64 {
        let joint = match self.joint.get(&(source, target)) {
            Some(&j) => j as f64,
            None => return 0.0,
        };
        let denominator = (self.source_counts.get(&source).copied().unwrap_or(0)
            * self.target_counts.get(&target).copied().unwrap_or(0)) as f64;
        if denominator > 0.0 {
            (joint / denominator.sqrt()).min(1.0)
        } else {
            0.0
        }
    }
}

/// Name similarity: the better of token Jaccard and character-bigram Dice.
fn name_similarity(a: &str, b: &str) -> f64 {
    token_jaccard(a, b).max(bigram_dice(a, b))
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let tb: BTreeSet<String> = b.to_lowercase().split_whitespace().map(String::from).collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    shared / union
}

fn bigram_dice(a: &str, b: &str) -> f64 {
    let ba = bigrams(a);
    let bb = bigrams(b);
    if ba.is_empty() || bb.is_empty() {
        return 0.0;
    }
    let shared = ba.intersection(&bb).count() as f64;
    2.0 * shared / (ba.len() + bb.len()) as f64
}

fn bigrams(s: &str) -> BTreeSet<(char, char)> {
    let chars: Vec<char> = s.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Entity, TemporalTriple};

    fn graph(relations: &[(u32, &str)], triples: &[(u32, u32, u32)]) -> Graph {
        let mut entities = BTreeMap::new();
        for &(h, _, t) in triples {
            for id in [h, t] {
                entities.entry(id).or_insert_with(|| Entity {
                    id,
                    name: format!("e{id}"),
                });
            }
        }
        let relations = relations
            .iter()
            .map(|&(id, name)| (id, name.to_string()))
            .collect();
        let triples = triples
            .iter()
            .map(|&(h, r, t)| TemporalTriple {
                head: h,
                relation: r,
                tail: t,
                start: None,
                end: None,
            })
            .collect();
        Graph::new(entities, relations, triples)
    }

    #[test]
    fn test_name_similarity_ranges() {
        assert!(name_similarity("member of", "member of") > 0.99);
        assert!(name_similarity("member of", "membership of") > 0.4);
        assert!(name_similarity("member of", "capital city") < 0.2);
    }

    #[test]
    fn test_similar_names_align() {
        let source = graph(&[(0, "plays for"), (1, "born in")], &[(0, 0, 1), (2, 1, 3)]);
        let target = graph(&[(0, "plays for"), (1, "located in")], &[(0, 0, 1)]);
        let aligner = RelationAligner::new(&ProjectionConfig::default());
        let alignment = aligner.align(&source, &target, &SeedSet::new());
        assert!(alignment.is_aligned(0, 0));
        assert!(!alignment.is_aligned(0, 1));
        let targets = alignment.targets(0);
        assert_eq!(targets[0].0, 0);
        assert!(targets[0].1 > 0.99);
        // "born in" matches nothing on the target side.
        assert!(alignment.targets(1).is_empty());
    }

    #[test]
    fn test_cooccurrence_links_renamed_relations() {
        // Relations named nothing alike, but every seeded pair uses them.
        let source = graph(&[(0, "alpha")], &[(0, 0, 1), (2, 0, 3), (4, 0, 5)]);
        let target = graph(&[(0, "omega")], &[(10, 0, 11), (12, 0, 13), (14, 0, 15)]);
        let seeds = SeedSet::from_reference(&[(0, 10), (2, 12), (4, 14)]);
        let aligner = RelationAligner::new(&ProjectionConfig::default());
        let alignment = aligner.align(&source, &target, &seeds);
        assert!(alignment.is_aligned(0, 0));

        let config = ProjectionConfig {
            relation_cooccurrence: false,
            ..ProjectionConfig::default()
        };
        let text_only = RelationAligner::new(&config).align(&source, &target, &seeds);
        assert!(!text_only.is_aligned(0, 0));
    }
}
