//! End-to-end pipeline tests over small synthetic graph pairs.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use scaleweave::config::Config;
use scaleweave::dataset::load_graph_store;
use scaleweave::orchestrator::{AlignmentPipeline, AlignmentReport, RunMode, StopReason};
use scaleweave::{ArtifactStore, StructuralEncoder};

/// Two structurally identical graphs of ten entities with matching names
/// and mixed-granularity stamps. Entities 0..8 are reference-aligned;
/// 8 and 9 are left for the pipeline. Entity 9's only fact is year-grained.
fn write_dataset(dir: &Path) {
    let names: String = (0..10).map(|i| format!("{i}\tperson {i}\n")).collect();
    fs::write(dir.join("ent_ids_1"), &names).unwrap();
    fs::write(dir.join("ent_ids_2"), &names).unwrap();
    fs::write(dir.join("rel_ids_1"), "0\tworks with\n").unwrap();
    fs::write(dir.join("rel_ids_2"), "0\tworks with\n").unwrap();
    fs::write(
        dir.join("time_id"),
        "0\t1995\n\
         1\t1995-03\n\
         2\t1995-03-10\n\
         3\t1996\n\
         4\t1996-07\n\
         5\t1996-07-21\n\
         6\t1997\n\
         7\t1997-01-02\n\
         8\t1998\n\
         9\tthe nineties\n",
    )
    .unwrap();
    let triples: String = (0..9)
        .map(|i| format!("{i}\t0\t{}\t{}\n", i + 1, i % 9))
        .collect();
    fs::write(dir.join("triples_1"), &triples).unwrap();
    fs::write(dir.join("triples_2"), &triples).unwrap();
    let seeds: String = (0..8).map(|i| format!("{i}\t{i}\n")).collect();
    fs::write(dir.join("sup_pairs"), &seeds).unwrap();
}

fn config() -> Config {
    let mut config = Config::default();
    config.encoder.dimension = 32;
    config.orchestrator.min_kg1_entities = 1;
    config
}

async fn run(dir: &Path, config: Config, mode: RunMode) -> scaleweave::Result<AlignmentReport> {
    let store = load_graph_store(dir)?;
    let artifacts = ArtifactStore::open(dir)?;
    let backend = Box::new(StructuralEncoder::new(&config.encoder));
    AlignmentPipeline::new(config, store, artifacts, backend, mode)
        .run()
        .await
}

fn read_final(dir: &Path) -> Vec<(u32, u32)> {
    let content = fs::read_to_string(dir.join("message_pool/final_alignment.txt")).unwrap();
    content
        .lines()
        .map(|l| {
            let fields: Vec<&str> = l.split('\t').collect();
            (fields[0].parse().unwrap(), fields[1].parse().unwrap())
        })
        .collect()
}

#[tokio::test]
async fn test_pipeline_aligns_remaining_entities() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let report = run(tmp.path(), config(), RunMode::Full).await.unwrap();

    assert_eq!(report.seed_count, 10);
    assert_eq!(report.pool_remaining, 0);
    assert_eq!(report.stop_reason, StopReason::PoolExhausted);
    assert!(report.iterations <= 3);

    let pairs = read_final(tmp.path());
    assert!(pairs.contains(&(8, 8)));
    assert!(pairs.contains(&(9, 9)));
}

#[tokio::test]
async fn test_final_alignment_is_injective() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    run(tmp.path(), config(), RunMode::Full).await.unwrap();

    let pairs = read_final(tmp.path());
    let sources: std::collections::BTreeSet<u32> = pairs.iter().map(|&(s, _)| s).collect();
    let targets: std::collections::BTreeSet<u32> = pairs.iter().map(|&(_, t)| t).collect();
    assert_eq!(sources.len(), pairs.len());
    assert_eq!(targets.len(), pairs.len());
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let (a, b) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    write_dataset(a.path());
    write_dataset(b.path());
    run(a.path(), config(), RunMode::Full).await.unwrap();
    run(b.path(), config(), RunMode::Full).await.unwrap();

    for artifact in ["final_alignment.txt", "sup_pairs.txt", "integration_top_pair.txt"] {
        let left = fs::read(a.path().join("message_pool").join(artifact)).unwrap();
        let right = fs::read(b.path().join("message_pool").join(artifact)).unwrap();
        assert_eq!(left, right, "{artifact} differs between identical runs");
    }
}

#[tokio::test]
async fn test_iteration_cap_respected() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let mut config = config();
    config.orchestrator.max_iterations = 1;
    config.orchestrator.min_kg1_entities = 0;
    let report = run(tmp.path(), config, RunMode::Full).await.unwrap();

    assert_eq!(report.iterations, 1);
    assert_eq!(report.new_pairs.len(), 1);
    assert_eq!(report.stop_reason, StopReason::MaxIterations);
}

#[tokio::test]
async fn test_stalled_progress_stops_before_cap() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    // Drop entity 9's only fact on both sides: with no triples it is never
    // embedded at any scale, so no iteration can propose a pair for it.
    let triples: String = (0..8)
        .map(|i| format!("{i}\t0\t{}\t{}\n", i + 1, i % 9))
        .collect();
    fs::write(tmp.path().join("triples_1"), &triples).unwrap();
    fs::write(tmp.path().join("triples_2"), &triples).unwrap();
    let mut config = config();
    config.orchestrator.max_iterations = 10;
    config.orchestrator.min_kg1_entities = 0;
    let report = run(tmp.path(), config, RunMode::Full).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::NoProgress);
    assert!(report.iterations < 10);
    assert_eq!(report.pool_remaining, 1);
    // The stalled iteration is the recorded zero.
    assert_eq!(report.new_pairs.last(), Some(&0));
}

#[tokio::test]
async fn test_pool_floor_stops_before_first_iteration() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let mut config = config();
    config.orchestrator.min_kg1_entities = 1000;
    let report = run(tmp.path(), config, RunMode::Full).await.unwrap();

    assert_eq!(report.iterations, 0);
    assert_eq!(report.stop_reason, StopReason::PoolExhausted);
    // The reference seeds are still written out.
    assert_eq!(read_final(tmp.path()).len(), 8);
}

#[tokio::test]
async fn test_encode_only_writes_caches_and_stops() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let report = run(tmp.path(), config(), RunMode::EncodeOnly).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::EncodingOnly);
    let pool = tmp.path().join("message_pool");
    assert!(pool.join("embeddings_1_year.txt").exists());
    assert!(pool.join("embeddings_2_day.txt").exists());
    assert!(pool.join("integration_top_pair.txt").exists());
    assert!(!pool.join("final_alignment.txt").exists() || read_final(tmp.path()).len() == 8);
}

#[tokio::test]
async fn test_skip_encoding_reads_cache() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    run(tmp.path(), config(), RunMode::EncodeOnly).await.unwrap();
    let report = run(tmp.path(), config(), RunMode::SkipEncoding).await.unwrap();

    assert_eq!(report.seed_count, 10);
    assert_eq!(report.stop_reason, StopReason::PoolExhausted);
}

#[tokio::test]
async fn test_skip_encoding_without_cache_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let err = run(tmp.path(), config(), RunMode::SkipEncoding)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("embeddings_1_year"));
}

#[tokio::test]
async fn test_empty_reference_alignment_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    fs::write(tmp.path().join("sup_pairs"), "").unwrap();
    let err = run(tmp.path(), config(), RunMode::Full).await.unwrap_err();
    assert!(err.to_string().contains("seed"));
}

#[tokio::test]
async fn test_per_iteration_artifacts_deposited() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    run(tmp.path(), config(), RunMode::Full).await.unwrap();

    let pool = tmp.path().join("message_pool");
    for artifact in [
        "relation_alignment.txt",
        "multi_scale_fusion_results.txt",
        "sup_pairs.txt",
        "retriever_outputs_year.txt",
    ] {
        assert!(pool.join(artifact).exists(), "{artifact} missing");
    }
}
