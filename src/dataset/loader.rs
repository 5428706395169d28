//! Line-oriented loader for the fixed dataset file set.
//!
//! Per graph pair the directory holds `ent_ids_1/2`, `rel_ids_1/2`,
//! `triples_1/2`, a `time_id` mapping, and `sup_pairs` (reference
//! alignment). All files are tab-separated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{Entity, EntityId, Graph, GraphStore, TemporalTriple, TimeId, TimeStamp};
use crate::error::{DatasetError, Result};

/// Load both graphs and the reference pairs from `data_dir`.
pub fn load_graph_store(data_dir: &Path) -> Result<GraphStore> {
    let time_map = load_time_map(&data_dir.join("time_id"))?;

    let source = load_graph(
        &data_dir.join("ent_ids_1"),
        &data_dir.join("rel_ids_1"),
        &data_dir.join("triples_1"),
        &time_map,
    )?;
    let target = load_graph(
        &data_dir.join("ent_ids_2"),
        &data_dir.join("rel_ids_2"),
        &data_dir.join("triples_2"),
        &time_map,
    )?;
    let reference_pairs = load_pairs(&data_dir.join("sup_pairs"))?;

    info!(
        source_entities = source.entity_count(),
        target_entities = target.entity_count(),
        source_triples = source.triples.len(),
        target_triples = target.triples.len(),
        reference_pairs = reference_pairs.len(),
        "loaded graph pair"
    );

    Ok(GraphStore {
        source,
        target,
        reference_pairs,
    })
}

fn load_graph(
    ent_path: &Path,
    rel_path: &Path,
    triple_path: &Path,
    time_map: &BTreeMap<TimeId, Option<TimeStamp>>,
) -> Result<Graph> {
    let entities = load_entities(ent_path)?;
    let relations = load_relations(rel_path)?;
    let triples = load_triples(triple_path, time_map)?;
    Ok(Graph::new(entities, relations, triples))
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(DatasetError::MissingFile(path.to_path_buf()).into());
    }
    let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        file: path.to_path_buf(),
        source,
    })?;
    Ok(content.lines().map(|l| l.to_string()).collect())
}

fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> DatasetError {
    DatasetError::MalformedLine {
        file: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

fn load_entities(path: &Path) -> Result<BTreeMap<EntityId, Entity>> {
    let mut entities = BTreeMap::new();
    for (lineno, line) in read_lines(path)?.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(2, '\t');
        let id: EntityId = fields
            .next()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| malformed(path, lineno + 1, "entity id is not an integer"))?;
        let name = fields
            .next()
            .ok_or_else(|| malformed(path, lineno + 1, "missing entity name field"))?
            .trim()
            .to_string();
        entities.insert(id, Entity { id, name });
    }
    if entities.is_empty() {
        return Err(DatasetError::EmptyEntitySet(path.to_path_buf()).into());
    }
    Ok(entities)
}

fn load_relations(path: &Path) -> Result<BTreeMap<u32, String>> {
    let mut relations = BTreeMap::new();
    for (lineno, line) in read_lines(path)?.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(2, '\t');
        let id: u32 = fields
            .next()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| malformed(path, lineno + 1, "relation id is not an integer"))?;
        let name = fields
            .next()
            .ok_or_else(|| malformed(path, lineno + 1, "missing relation name field"))?
            .trim()
            .to_string();
        relations.insert(id, name);
    }
    Ok(relations)
}

/// Time-ID mapping: `time_key \t human-readable temporal string`. Strings
/// that do not parse as `YYYY[-MM[-DD]]` are kept with an unknown stamp
/// (tolerated, contributing to no scale).
fn load_time_map(path: &Path) -> Result<BTreeMap<TimeId, Option<TimeStamp>>> {
    let mut map = BTreeMap::new();
    for (lineno, line) in read_lines(path)?.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(2, '\t');
        let id: TimeId = fields
            .next()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| malformed(path, lineno + 1, "time id is not an integer"))?;
        let stamp = fields.next().and_then(|s| TimeStamp::parse(s));
        map.insert(id, stamp);
    }
    Ok(map)
}

/// Triple lines: `head \t rel \t tail [\t time_start [\t time_end]]`.
fn load_triples(
    path: &Path,
    time_map: &BTreeMap<TimeId, Option<TimeStamp>>,
) -> Result<Vec<TemporalTriple>> {
    let mut triples = Vec::new();
    for (lineno, line) in read_lines(path)?.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(|f| f.trim()).collect();
        if fields.len() < 3 {
            return Err(malformed(path, lineno + 1, "expected at least 3 fields").into());
        }
        let parse_id = |idx: usize, what: &str| -> Result<u32> {
            fields[idx]
                .parse()
                .map_err(|_| malformed(path, lineno + 1, format!("{what} is not an integer")).into())
        };
        let head = parse_id(0, "head")?;
        let relation = parse_id(1, "relation")?;
        let tail = parse_id(2, "tail")?;

        let resolve = |idx: usize| -> Result<Option<TimeStamp>> {
            if fields.len() <= idx || fields[idx].is_empty() {
                return Ok(None);
            }
            let time_id: TimeId = fields[idx]
                .parse()
                .map_err(|_| malformed(path, lineno + 1, "time id is not an integer"))?;
            match time_map.get(&time_id) {
                Some(stamp) => Ok(*stamp),
                None => Err(DatasetError::UnknownTimeId {
                    file: path.to_path_buf(),
                    time_id,
                }
                .into()),
            }
        };
        let start = resolve(3)?;
        let end = resolve(4)?;

        triples.push(TemporalTriple {
            head,
            relation,
            tail,
            start,
            end,
        });
    }
    Ok(triples)
}

/// Newline-separated `source \t target` entity-id pairs.
pub fn load_pairs(path: &Path) -> Result<Vec<(EntityId, EntityId)>> {
    let mut pairs = Vec::new();
    for (lineno, line) in read_lines(path)?.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(|f| f.trim()).collect();
        if fields.len() < 2 {
            return Err(malformed(path, lineno + 1, "expected 2 fields").into());
        }
        let src: EntityId = fields[0]
            .parse()
            .map_err(|_| malformed(path, lineno + 1, "source id is not an integer"))?;
        let tgt: EntityId = fields[1]
            .parse()
            .map_err(|_| malformed(path, lineno + 1, "target id is not an integer"))?;
        pairs.push((src, tgt));
    }
    Ok(pairs)
}

/// Returns the first missing required input file, if any. Checked before
/// any stage runs so input errors abort early with the offending name.
pub fn missing_input(data_dir: &Path) -> Option<PathBuf> {
    const REQUIRED: [&str; 8] = [
        "ent_ids_1",
        "ent_ids_2",
        "rel_ids_1",
        "rel_ids_2",
        "triples_1",
        "triples_2",
        "time_id",
        "sup_pairs",
    ];
    REQUIRED
        .iter()
        .map(|name| data_dir.join(name))
        .find(|p| !p.exists())
}
