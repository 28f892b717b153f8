//! Basic usage of `minhash_lsh`.
//!
//! Sketches a few synthetic columns with MinHash, builds and finalizes an
//! index, queries it and prints stats, metrics and the chosen banding.
//!
//! Run with:
//!   cargo run --example basic_usage

use minhash_lsh::*;

const NUM_PERM: usize = 128;
const SEED: i64 = 43;

fn column(prefix: &str, range: std::ops::Range<u32>) -> Vec<String> {
    range.map(|i| format!("{prefix}-{i}")).collect()
}

fn main() {
    // ---------------------------------------------------------------
    // 1. Choose the banding for the threshold.
    // ---------------------------------------------------------------
    println!("=== Step 1: Banding for threshold 0.5 ===");
    let params = optimal_params(NUM_PERM, 0.5, ErrorWeights::default()).expect("tuning failed");
    println!(
        "  bands={} rows={} fp={:.4} fn={:.4} steepest at s~{:.3}\n",
        params.num_bands,
        params.rows_per_band,
        params.false_positive,
        params.false_negative,
        params.approximate_threshold()
    );

    // ---------------------------------------------------------------
    // 2. Sketch columns and build the index.
    // ---------------------------------------------------------------
    println!("=== Step 2: Build the index ===");
    let hasher = MinHasher::new(NUM_PERM, SEED);
    let columns = [
        ("cities.name", column("city", 0..1_000)),
        ("airports.city", column("city", 200..1_100)),
        ("stations.town", column("city", 600..2_000)),
        ("products.sku", column("sku", 0..1_000)),
    ];

    let mut index = LshIndex::builder()
        .dim(NUM_PERM)
        .seed(SEED)
        .threshold(0.5)
        .expected_items(columns.len())
        .enable_metrics()
        .build()
        .expect("failed to build index");

    for (id, values) in &columns {
        index
            .insert(*id, &hasher.signature(values))
            .expect("insert failed");
    }
    index.finalize().expect("finalize failed");
    println!("  Indexed {} columns.\n", index.len());

    // ---------------------------------------------------------------
    // 3. Query with a new column.
    // ---------------------------------------------------------------
    println!("=== Step 3: Query ===");
    let query = hasher.signature(column("city", 100..1_000));
    let mut candidates = index.query(&query).expect("query failed");
    candidates.sort();
    for id in &candidates {
        let (_, values) = columns
            .iter()
            .find(|(name, _)| *name == id.as_str())
            .expect("unknown id");
        let estimate = hasher
            .signature(values)
            .jaccard(&query)
            .expect("incompatible signatures");
        println!("  {id:<16} estimated jaccard={estimate:.3}");
    }
    println!();

    // ---------------------------------------------------------------
    // 4. Rejected queries.
    // ---------------------------------------------------------------
    println!("=== Step 4: Rejected queries ===");
    let other_family = MinHasher::new(NUM_PERM, SEED + 1).signature(column("city", 0..10));
    println!("  wrong seed:   {}", index.query(&other_family).unwrap_err());
    let short = Signature::new(SEED, vec![0; NUM_PERM / 2]);
    println!("  wrong length: {}\n", index.query(&short).unwrap_err());

    // ---------------------------------------------------------------
    // 5. Stats and metrics.
    // ---------------------------------------------------------------
    println!("=== Step 5: Stats ===");
    println!("  {}", index.stats());
    if let Some(m) = index.metrics() {
        println!("  {}", m);
    }

    println!("\nDone.");
}
