//! Temporal graph store: entities, relations, and time-stamped triples for
//! the source and target graphs. Read-only to the pipeline after load.

mod loader;

pub use loader::{load_graph_store, load_pairs, missing_input};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Local entity identifier within one graph.
pub type EntityId = u32;
/// Local relation identifier within one graph.
pub type RelationId = u32;
/// Key into the time-ID mapping file.
pub type TimeId = u32;

/// A temporal granularity level. Scales are peers, not a hierarchy: an
/// entity may be covered at one scale and absent at another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Year,
    Month,
    Day,
}

impl Scale {
    /// All scales, coarsest first.
    pub const ALL: [Scale; 3] = [Scale::Year, Scale::Month, Scale::Day];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Year => "year",
            Scale::Month => "month",
            Scale::Day => "day",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Granularity tag carried by a temporal annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Month,
    Day,
    Unknown,
}

/// A temporal point at its native granularity. Coarse stamps never
/// fabricate finer keys; fine stamps group losslessly into coarser ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeStamp {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl TimeStamp {
    /// Parse a `YYYY`, `YYYY-MM`, or `YYYY-MM-DD` string. Returns `None`
    /// for anything else (tagged unknown by the caller).
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().splitn(3, '-');
        let year: i32 = parts.next()?.parse().ok()?;
        let month = match parts.next() {
            Some(m) => {
                let m: u32 = m.parse().ok()?;
                if !(1..=12).contains(&m) {
                    return None;
                }
                Some(m)
            }
            None => None,
        };
        let day = match parts.next() {
            Some(d) => {
                let d: u32 = d.parse().ok()?;
                // Validate the full calendar date.
                NaiveDate::from_ymd_opt(year, month?, d)?;
                Some(d)
            }
            None => None,
        };
        Some(Self { year, month, day })
    }

    pub fn granularity(&self) -> Granularity {
        match (self.month, self.day) {
            (Some(_), Some(_)) => Granularity::Day,
            (Some(_), None) => Granularity::Month,
            (None, _) => Granularity::Year,
        }
    }

    /// The grouping key of this stamp at `scale`, or `None` when the stamp
    /// is coarser than the scale (never coerced by truncation).
    pub fn key_at(&self, scale: Scale) -> Option<i64> {
        match scale {
            Scale::Year => Some(self.year as i64),
            Scale::Month => self.month.map(|m| self.year as i64 * 12 + (m as i64 - 1)),
            Scale::Day => {
                let (m, d) = (self.month?, self.day?);
                let date = NaiveDate::from_ymd_opt(self.year, m, d)?;
                Some(date.num_days_from_ce() as i64)
            }
        }
    }
}

/// An entity with its raw identifier text (name or description).
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
}

/// A time-stamped triple. `end` is present only for interval annotations.
#[derive(Debug, Clone)]
pub struct TemporalTriple {
    pub head: EntityId,
    pub relation: RelationId,
    pub tail: EntityId,
    pub start: Option<TimeStamp>,
    pub end: Option<TimeStamp>,
}

impl TemporalTriple {
    /// Grouping keys this triple contributes at `scale`. Interval
    /// annotations contribute both endpoint keys.
    pub fn time_keys_at(&self, scale: Scale) -> BTreeSet<i64> {
        let mut keys = BTreeSet::new();
        if let Some(k) = self.start.and_then(|t| t.key_at(scale)) {
            keys.insert(k);
        }
        if let Some(k) = self.end.and_then(|t| t.key_at(scale)) {
            keys.insert(k);
        }
        keys
    }
}

/// One knowledge graph: entities, named relations, temporal triples, and
/// the incidence lists derived from them.
#[derive(Debug)]
pub struct Graph {
    pub entities: BTreeMap<EntityId, Entity>,
    pub relations: BTreeMap<RelationId, String>,
    pub triples: Vec<TemporalTriple>,
    /// Triple indices incident to each entity (as head or tail).
    incident: BTreeMap<EntityId, Vec<usize>>,
}

impl Graph {
    pub fn new(
        entities: BTreeMap<EntityId, Entity>,
        relations: BTreeMap<RelationId, String>,
        triples: Vec<TemporalTriple>,
    ) -> Self {
        let mut incident: BTreeMap<EntityId, Vec<usize>> = BTreeMap::new();
        for (idx, triple) in triples.iter().enumerate() {
            incident.entry(triple.head).or_default().push(idx);
            if triple.tail != triple.head {
                incident.entry(triple.tail).or_default().push(idx);
            }
        }
        Self {
            entities,
            relations,
            triples,
            incident,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        self.entities.get(&id).map(|e| e.name.as_str())
    }

    pub fn relation_name(&self, id: RelationId) -> Option<&str> {
        self.relations.get(&id).map(|s| s.as_str())
    }

    /// Triples incident to `id`, as head or tail.
    pub fn incident_triples(&self, id: EntityId) -> impl Iterator<Item = &TemporalTriple> {
        self.incident
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.triples[idx])
    }

    /// Grouping keys of all triples incident to `id` at `scale`. Empty when
    /// the entity has no qualifying temporal facts at that granularity.
    pub fn entity_time_keys(&self, id: EntityId, scale: Scale) -> BTreeSet<i64> {
        let mut keys = BTreeSet::new();
        for triple in self.incident_triples(id) {
            keys.extend(triple.time_keys_at(scale));
        }
        keys
    }

    /// Relations `id` participates in as head, with the tail entity.
    pub fn entity_relations(&self, id: EntityId) -> BTreeSet<(RelationId, EntityId)> {
        self.incident_triples(id)
            .filter(|t| t.head == id)
            .map(|t| (t.relation, t.tail))
            .collect()
    }

    /// Entities sharing a triple with `id`.
    pub fn neighbors(&self, id: EntityId) -> BTreeSet<EntityId> {
        let mut out = BTreeSet::new();
        for triple in self.incident_triples(id) {
            if triple.head != id {
                out.insert(triple.head);
            }
            if triple.tail != id {
                out.insert(triple.tail);
            }
        }
        out
    }

    /// Fraction of entities with at least one time key at `scale`.
    pub fn coverage(&self, scale: Scale) -> f64 {
        if self.entities.is_empty() {
            return 0.0;
        }
        let covered = self
            .entities
            .keys()
            .filter(|&&id| !self.entity_time_keys(id, scale).is_empty())
            .count();
        covered as f64 / self.entities.len() as f64
    }
}

/// Both graphs plus the reference alignment seeding the first iteration.
#[derive(Debug)]
pub struct GraphStore {
    pub source: Graph,
    pub target: Graph,
    pub reference_pairs: Vec<(EntityId, EntityId)>,
}
