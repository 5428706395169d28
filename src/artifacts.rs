//! The per-dataset artifact store.
//!
//! Every stage deposits its output under `<data_dir>/message_pool` as
//! line-oriented, tab-delimited files readable by the next stage and by
//! external evaluators. The store is an explicit handle passed into each
//! stage rather than ambient global state, so stages stay independently
//! restartable and testable. Writes overwrite per stage; concurrent runs
//! against the same directory are not supported.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dataset::EntityId;
use crate::error::{DatasetError, EncodingError, Result};

/// Artifact file names shared across stages.
pub mod keys {
    /// Initial top-candidate pairs from the encoding stage.
    pub const INTEGRATION_TOP_PAIR: &str = "integration_top_pair.txt";
    /// Scored relation alignment from the projection stage.
    pub const RELATION_ALIGNMENT: &str = "relation_alignment.txt";
    /// Accepted pairs of the latest fusion round.
    pub const FUSION_RESULTS: &str = "multi_scale_fusion_results.txt";
    /// Accumulated seed snapshot after each iteration.
    pub const SUP_PAIRS: &str = "sup_pairs.txt";
    /// Final seed pairs with fused confidence, for external evaluation.
    pub const FINAL_ALIGNMENT: &str = "final_alignment.txt";

    /// Per-scale retriever candidate file.
    pub fn retriever_outputs(scale: crate::dataset::Scale) -> String {
        format!("retriever_outputs_{scale}.txt")
    }

    /// Per-graph, per-scale embedding cache file.
    pub fn embeddings(graph_num: u8, scale: crate::dataset::Scale) -> String {
        format!("embeddings_{graph_num}_{scale}.txt")
    }
}

/// Handle to the message-pool directory of one dataset.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the message pool under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let root = data_dir.join("message_pool");
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path(key).exists()
    }

    /// Write `source \t target` lines.
    pub fn write_pairs(&self, key: &str, pairs: &[(EntityId, EntityId)]) -> Result<()> {
        let mut out = std::fs::File::create(self.path(key))?;
        for (src, tgt) in pairs {
            writeln!(out, "{src}\t{tgt}")?;
        }
        debug!(key, count = pairs.len(), "wrote pair artifact");
        Ok(())
    }

    /// Write `source \t target \t score` lines.
    pub fn write_scored_pairs(&self, key: &str, pairs: &[(EntityId, EntityId, f32)]) -> Result<()> {
        let mut out = std::fs::File::create(self.path(key))?;
        for (src, tgt, score) in pairs {
            writeln!(out, "{src}\t{tgt}\t{score:.6}")?;
        }
        debug!(key, count = pairs.len(), "wrote scored pair artifact");
        Ok(())
    }

    /// Read a pair artifact back (e.g. when restarting from a later stage).
    pub fn read_pairs(&self, key: &str) -> Result<Vec<(EntityId, EntityId)>> {
        crate::dataset::load_pairs(&self.path(key))
    }

    /// Persist one scale's embedding vectors: `id \t v0 v1 ...` per line.
    pub fn write_embeddings(
        &self,
        key: &str,
        vectors: &BTreeMap<EntityId, Vec<f32>>,
    ) -> Result<()> {
        let mut out = std::fs::File::create(self.path(key))?;
        for (id, vector) in vectors {
            let joined: Vec<String> = vector.iter().map(|v| format!("{v:.6}")).collect();
            writeln!(out, "{id}\t{}", joined.join(" "))?;
        }
        debug!(key, count = vectors.len(), "wrote embedding cache");
        Ok(())
    }

    /// Load a cached embedding file, checking the expected dimension.
    pub fn read_embeddings(
        &self,
        key: &str,
        dimension: usize,
    ) -> Result<BTreeMap<EntityId, Vec<f32>>> {
        let path = self.path(key);
        if !path.exists() {
            return Err(EncodingError::CacheMiss(path).into());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| DatasetError::Io {
            file: path.clone(),
            source,
        })?;
        let mut vectors = BTreeMap::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.splitn(2, '\t');
            let id: EntityId = fields
                .next()
                .unwrap_or_default()
                .trim()
                .parse()
                .map_err(|_| DatasetError::MalformedLine {
                    file: path.clone(),
                    line: lineno + 1,
                    reason: "entity id is not an integer".to_string(),
                })?;
            let vector: Vec<f32> = fields
                .next()
                .unwrap_or_default()
                .split_whitespace()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| DatasetError::MalformedLine {
                    file: path.clone(),
                    line: lineno + 1,
                    reason: "vector component is not a float".to_string(),
                })?;
            if vector.len() != dimension {
                return Err(EncodingError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                }
                .into());
            }
            vectors.insert(id, vector);
        }
        Ok(vectors)
    }
}
