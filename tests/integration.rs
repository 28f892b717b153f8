use minhash_lsh::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_signature(rng: &mut StdRng, dim: usize, seed: i64) -> Signature {
    Signature::new(seed, (0..dim).map(|_| rng.gen()).collect())
}

fn worked_example_index() -> LshIndex {
    let mut index = LshIndex::builder()
        .dim(4)
        .seed(7)
        .threshold(0.5)
        .num_bands(2)
        .build()
        .unwrap();
    index.insert("a", &Signature::new(7, vec![1, 2, 3, 4])).unwrap();
    index.insert("b", &Signature::new(7, vec![1, 2, 9, 9])).unwrap();
    index.finalize().unwrap();
    index
}

fn id_set(ids: Vec<ColumnId>) -> HashSet<String> {
    ids.into_iter().map(|id| id.as_str().to_owned()).collect()
}

/// Set of `size` string values starting at `start`.
fn values(start: usize, size: usize) -> Vec<String> {
    (start..start + size).map(|i| format!("v{i}")).collect()
}

// ---------------------------------------------------------------------------
// 1. Worked example
// ---------------------------------------------------------------------------

#[test]
fn test_worked_example() {
    let index = worked_example_index();

    let hits = id_set(index.query(&Signature::new(7, vec![1, 2, 3, 4])).unwrap());
    assert!(hits.contains("a") && hits.contains("b"), "got {hits:?}");

    let none = index.query(&Signature::new(7, vec![9, 9, 9, 9])).unwrap();
    assert!(none.is_empty());

    let err = index.query(&Signature::new(8, vec![1, 2, 3, 4])).unwrap_err();
    assert!(
        matches!(err, LshError::SeedMismatch { expected: 7, got: 8 }),
        "expected SeedMismatch, got: {err:?}"
    );

    let err = index.query(&Signature::new(7, vec![1, 2, 3])).unwrap_err();
    assert!(
        matches!(err, LshError::DimensionMismatch { expected: 4, got: 3 }),
        "expected DimensionMismatch, got: {err:?}"
    );
}

#[test]
fn test_second_band_match() {
    let index = worked_example_index();
    let hits = id_set(index.query(&Signature::new(7, vec![0, 0, 9, 9])).unwrap());
    assert_eq!(hits, HashSet::from(["b".to_owned()]));
}

// ---------------------------------------------------------------------------
// 2. Self-match and determinism
// ---------------------------------------------------------------------------

#[test]
fn test_self_match_for_every_inserted_signature() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut index = LshIndex::builder()
        .dim(128)
        .seed(43)
        .threshold(0.8)
        .expected_items(500)
        .build()
        .unwrap();

    let signatures: Vec<Signature> = (0..500).map(|_| random_signature(&mut rng, 128, 43)).collect();
    for (i, sig) in signatures.iter().enumerate() {
        index.insert(format!("col-{i}"), sig).unwrap();
    }
    index.finalize().unwrap();

    for (i, sig) in signatures.iter().enumerate() {
        let hits = id_set(index.query(sig).unwrap());
        assert!(hits.contains(&format!("col-{i}")), "col-{i} missing from its own query");
    }
}

#[test]
fn test_query_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut index = LshIndex::builder().dim(64).seed(1).threshold(0.3).build().unwrap();
    let base = random_signature(&mut rng, 64, 1);
    for i in 0..200 {
        // Share a growing prefix with `base` so buckets overlap.
        let mut sig = random_signature(&mut rng, 64, 1);
        let shared = i % 64;
        sig.hash_values[..shared].copy_from_slice(&base.hash_values[..shared]);
        index.insert(format!("c{i}"), &sig).unwrap();
    }
    index.finalize().unwrap();

    let first = id_set(index.query(&base).unwrap());
    let second = id_set(index.query(&base).unwrap());
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

// ---------------------------------------------------------------------------
// 3. No cross-bucket false positives
// ---------------------------------------------------------------------------

#[test]
fn test_disjoint_bands_never_match() {
    let mut index = LshIndex::builder().dim(16).seed(0).num_bands(4).build().unwrap();
    // Every component differs, so no band can share a key.
    let left = Signature::new(0, (0..16).collect());
    let right = Signature::new(0, (100..116).collect());
    index.insert("left", &left).unwrap();
    index.insert("right", &right).unwrap();
    index.finalize().unwrap();

    assert_eq!(id_set(index.query(&left).unwrap()), HashSet::from(["left".to_owned()]));
    assert_eq!(id_set(index.query(&right).unwrap()), HashSet::from(["right".to_owned()]));
}

#[test]
fn test_single_component_difference_per_band_is_a_miss() {
    let mut index = LshIndex::builder().dim(8).seed(0).num_bands(2).build().unwrap();
    index.insert("x", &Signature::new(0, vec![1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
    index.finalize().unwrap();
    // 6 of 8 components agree but each band differs in one position.
    let probe = Signature::new(0, vec![1, 2, 3, 0, 5, 6, 7, 0]);
    assert!(index.query(&probe).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 4. Dimension strictness and empty index
// ---------------------------------------------------------------------------

#[test]
fn test_dimension_strictness() {
    let index = worked_example_index();
    for len in [0usize, 1, 3, 5, 8] {
        let err = index.query(&Signature::new(7, vec![1; len])).unwrap_err();
        assert_eq!(err, LshError::DimensionMismatch { expected: 4, got: len });
    }
}

#[test]
fn test_empty_index_query() {
    let mut index = LshIndex::builder().dim(32).seed(5).threshold(0.5).build().unwrap();
    index.finalize().unwrap();
    assert!(index.is_empty());
    let results = index.query(&Signature::new(5, vec![0; 32])).unwrap();
    assert!(results.is_empty());
}

// ---------------------------------------------------------------------------
// 5. Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_lifecycle() {
    let mut index = LshIndex::builder().dim(4).seed(7).num_bands(2).build().unwrap();
    let sig = Signature::new(7, vec![1, 2, 3, 4]);
    assert_eq!(index.state(), IndexState::Building);
    assert_eq!(index.query(&sig), Err(LshError::IndexNotReady));

    index.insert("a", &sig).unwrap();
    index.finalize().unwrap();
    assert_eq!(index.state(), IndexState::Queryable);
    assert_eq!(index.insert("b", &sig), Err(LshError::NotBuilding));
    assert_eq!(index.finalize(), Err(LshError::AlreadyFinalized));
    assert_eq!(index.len(), 1);
}

#[test]
fn test_invalid_construction() {
    assert_eq!(
        LshIndex::builder().dim(0).build().unwrap_err(),
        LshError::ZeroDimension
    );
    for t in [0.0, 1.0, -0.5, 2.0] {
        assert_eq!(
            LshIndex::builder().dim(8).threshold(t).build().unwrap_err(),
            LshError::InvalidThreshold(t)
        );
    }
}

// ---------------------------------------------------------------------------
// 6. Similarity behaviour with real MinHash signatures
// ---------------------------------------------------------------------------

#[test]
fn test_similar_sets_found_dissimilar_sets_not() {
    let hasher = MinHasher::new(256, 43);
    let mut index = LshIndex::builder()
        .dim(256)
        .seed(43)
        .threshold(0.5)
        .build()
        .unwrap();

    let query_set = values(0, 1000);
    // J = 950 / 1050 ≈ 0.9
    index.insert("near", &hasher.signature(values(50, 1000))).unwrap();
    // Disjoint.
    index.insert("far", &hasher.signature(values(50_000, 1000))).unwrap();
    index.finalize().unwrap();

    let hits = id_set(index.query(&hasher.signature(&query_set)).unwrap());
    assert!(hits.contains("near"), "got {hits:?}");
    assert!(!hits.contains("far"), "got {hits:?}");
}

// ---------------------------------------------------------------------------
// 7. Builder + source + service end to end
// ---------------------------------------------------------------------------

#[test]
fn test_json_lines_build_and_query() {
    let input = "\
{\"id\": \"a\", \"minhash\": [1, 2, 3, 4], \"seed\": 7}
{\"id\": \"b\", \"minhash\": [1, 2, 9, 9], \"seed\": 7}
";
    let mut source = JsonLinesSource::new(Cursor::new(input)).with_count_hint(2);
    let (index, report) = IndexBuilder::new(0.5).num_bands(2).build(&mut source).unwrap();
    assert_eq!(report.records, 2);
    assert_eq!(report.params.rows_per_band, 2);

    let service = QueryService::new(Arc::new(index)).unwrap();
    let hits = id_set(service.handle(br#"{"seed": 7, "minhash": [1, 2, 3, 4]}"#).unwrap());
    assert_eq!(hits, HashSet::from(["a".to_owned(), "b".to_owned()]));
}

#[test]
fn test_malformed_source_line_aborts_build() {
    let input = "\
{\"id\": \"a\", \"minhash\": [1, 2, 3, 4], \"seed\": 7}
not json
{\"id\": \"c\", \"minhash\": [1, 2, 3, 4], \"seed\": 7}
";
    let mut source = JsonLinesSource::new(Cursor::new(input));
    let err = IndexBuilder::new(0.5).build(&mut source).err().unwrap();
    match err {
        BuildError::Source {
            records,
            source: SourceError::Parse { line, .. },
        } => {
            assert_eq!(records, 1);
            assert_eq!(line, 2);
        }
        other => panic!("expected source parse error, got {other:?}"),
    }
}

#[test]
fn test_service_rejection_kinds_are_distinct() {
    let service = QueryService::new(Arc::new(worked_example_index()))
        .unwrap()
        .with_max_payload_bytes(128);
    let oversized = format!(r#"{{"seed": 7, "minhash": [1, 2, 3, 4], "pad": "{}"}}"#, "x".repeat(200));

    let kinds: HashSet<&str> = [
        oversized.as_bytes(),
        b"[1, 2".as_slice(),
        br#"{"seed": 7, "minhash": [1, 2, 3]}"#.as_slice(),
        br#"{"seed": 8, "minhash": [1, 2, 3, 4]}"#.as_slice(),
    ]
    .iter()
    .map(|body| service.handle(body).unwrap_err().kind())
    .collect();
    assert_eq!(kinds.len(), 4);
}

#[test]
fn test_stats() {
    let index = worked_example_index();
    let stats = index.stats();
    assert_eq!(stats.num_ids, 2);
    assert_eq!(stats.num_bands, 2);
    assert_eq!(stats.rows_per_band, 2);
    // Band 0 shares one bucket, band 1 has two.
    assert_eq!(stats.total_buckets, 3);
    assert_eq!(stats.max_bucket_size, 2);
    assert!(stats.to_string().contains("bands: 2x2"));
}
