//! Integration tests for the complete CauseNet pipeline
//!
//! JSONL export → ingestion → build → memory-mapped reader → queries.
//!
//! Run with: cargo test --test integration_tests

use std::io::Write;

use causenet_ingest_jsonl::{read_relations, ClueWebIdMap, NoRemap};
use causenet_store::{
    build_causenet, BuildOptions, Causenet, CausenetError, CausenetQueries, PathWeighting,
    SourceType, WriterOptions,
};
use tempfile::tempdir;

fn record(cause: &str, effect: &str, sources: serde_json::Value) -> String {
    serde_json::json!({
        "causal_relation": {
            "cause": {"concept": cause},
            "effect": {"concept": effect}
        },
        "sources": sources
    })
    .to_string()
}

fn sentence(rev: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "wikipedia_sentence",
        "payload": {"wikipedia_revision_id": rev, "sentence": text}
    })
}

fn sample_export() -> String {
    let lines = [
        record(
            "smoking",
            "lung cancer",
            serde_json::json!([sentence("1", "Smoking causes lung cancer.")]),
        ),
        record(
            "lung cancer",
            "death",
            serde_json::json!([sentence("2", "Lung cancer leads to death.")]),
        ),
        // The same sentence observed again for the same pair.
        record(
            "smoking",
            "lung cancer",
            serde_json::json!([
                sentence("1", "Smoking causes lung cancer."),
                {"type": "clueweb12_sentence",
                 "payload": {"clueweb12_page_id": "urn:uuid:1", "sentence": "Smoking causes lung cancer."}}
            ]),
        ),
        String::new(),
        record(
            "smoking",
            "death",
            serde_json::json!([
                sentence("3", "a"),
                sentence("4", "b"),
                sentence("5", "c"),
                {"type": "wikipedia_list", "payload": {"wikipedia_revision_id": "6"}}
            ]),
        ),
        record("volcano", "ash cloud", serde_json::json!([])),
    ];
    lines.join("\n")
}

// ============================================================================
// JSONL → build → query
// ============================================================================

#[test]
fn test_jsonl_to_causenet_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("causenet.jsonl");
    std::fs::write(&input, sample_export()).unwrap();

    let id_map = ClueWebIdMap::from_reader("<urn:uuid:1>\tclueweb12-0001wb-00-00001\n".as_bytes())
        .unwrap();
    let out = dir.path().join("causenet.causenet");
    let file = std::fs::File::open(&input).unwrap();
    let summary = build_causenet(
        read_relations(std::io::BufReader::new(file), &id_map),
        &out,
        &BuildOptions::default(),
    )
    .unwrap();

    assert_eq!(summary.concepts, 5);
    assert_eq!(summary.edges, 4);
    assert_eq!(summary.observations, 8);
    assert_eq!(summary.distinct_supports, 7);

    let cn = Causenet::open(&out).unwrap();
    let report = cn.verify().unwrap();
    assert_eq!(report.edges, 4);
    assert_eq!(report.distinct_supports, 7);

    let queries = CausenetQueries::with_lookup(&cn);
    assert_eq!(
        queries.concepts(),
        vec!["smoking", "lung cancer", "death", "volcano", "ash cloud"]
    );

    let supports = queries.supports("smoking", "lung cancer").unwrap();
    assert_eq!(supports.len(), 2);
    assert_eq!(supports[1].source_type, SourceType::ClueWeb12Sentence);
    assert_eq!(supports[1].id, "clueweb12-0001wb-00-00001");

    assert_eq!(
        queries.path("smoking", "death", PathWeighting::SupportCount),
        Some(vec![
            "smoking".to_string(),
            "lung cancer".to_string(),
            "death".to_string()
        ])
    );
    assert_eq!(queries.path("smoking", "volcano", PathWeighting::Hops), Some(vec![]));
    assert_eq!(queries.concept("unknown"), None);
}

#[test]
fn test_unknown_source_type_aborts_build() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("bad.causenet");
    let input = [
        record("a", "b", serde_json::json!([sentence("1", "x")])),
        record(
            "b",
            "c",
            serde_json::json!([{"type": "forum_post", "payload": {}}]),
        ),
    ]
    .join("\n");

    let err = build_causenet(
        read_relations(input.as_bytes(), &NoRemap),
        &out,
        &BuildOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CausenetError::Input(_)));
    assert!(!out.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_custom_staging_dir() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let out = dir.path().join("g.causenet");

    let mut input = Vec::new();
    writeln!(input, "{}", record("x", "y", serde_json::json!([sentence("9", "xy")]))).unwrap();

    let options = BuildOptions {
        writer: WriterOptions {
            staging_dir: Some(staging.clone()),
        },
        ..BuildOptions::default()
    };
    build_causenet(read_relations(input.as_slice(), &NoRemap), &out, &options).unwrap();

    assert!(out.exists());
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
}

#[test]
fn test_concurrent_readers_share_one_file() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("shared.causenet");
    build_causenet(
        read_relations(sample_export().as_bytes(), &NoRemap),
        &out,
        &BuildOptions::default(),
    )
    .unwrap();

    let cn = std::sync::Arc::new(Causenet::open(&out).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cn = cn.clone();
            std::thread::spawn(move || {
                let smoking = cn.concept_index("smoking").unwrap();
                cn.effects(smoking).count()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
}
