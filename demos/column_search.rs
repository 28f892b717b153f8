//! LSH candidate search vs. brute-force Jaccard scan.
//!
//! Generates synthetic columns as overlapping integer ranges, builds an index
//! through the JSON-lines source and the fail-stop builder, then compares
//! query speed and recall against a linear scan over estimated Jaccard
//! similarity.
//!
//! Run with:
//!   cargo run --example column_search --release

use std::collections::HashSet;
use std::io::Cursor;
use std::time::Instant;

use minhash_lsh::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const N: usize = 20_000;
const NUM_PERM: usize = 256;
const SEED: i64 = 43;
const THRESHOLD: f64 = 0.5;
const NUM_QUERIES: usize = 100;

fn main() {
    println!("========================================");
    println!("  LSH vs Brute-Force Column Search");
    println!("========================================");
    println!("  Columns:    {N}");
    println!("  Signature:  {NUM_PERM}");
    println!("  Threshold:  {THRESHOLD}");
    println!("  Queries:    {NUM_QUERIES}");
    println!();

    // ---------------------------------------------------------------
    // 1. Sketch synthetic columns into JSON lines.
    // ---------------------------------------------------------------
    println!("[1/4] Sketching {N} columns...");
    let hasher = MinHasher::new(NUM_PERM, SEED);
    let mut rng = StdRng::seed_from_u64(7);
    let signatures: Vec<Signature> = (0..N)
        .map(|_| {
            let start: u32 = rng.gen_range(0..200_000);
            let len: u32 = rng.gen_range(50..500);
            hasher.signature((start..start + len).map(|v| v.to_le_bytes()))
        })
        .collect();

    let mut jsonl = String::new();
    for (i, sig) in signatures.iter().enumerate() {
        let line = serde_json::json!({ "id": format!("col-{i}"), "minhash": sig.hash_values, "seed": SEED });
        jsonl.push_str(&line.to_string());
        jsonl.push('\n');
    }

    // ---------------------------------------------------------------
    // 2. Build the index.
    // ---------------------------------------------------------------
    println!("[2/4] Building index...");
    let mut source = JsonLinesSource::new(Cursor::new(jsonl)).with_count_hint(N);
    let (index, report) = IndexBuilder::new(THRESHOLD)
        .build(&mut source)
        .expect("build failed");
    println!(
        "      {} records, {} bands x {} rows, {:.2?}\n",
        report.records, report.params.num_bands, report.params.rows_per_band, report.elapsed
    );

    // ---------------------------------------------------------------
    // 3. Query both ways.
    // ---------------------------------------------------------------
    println!("[3/4] Running {NUM_QUERIES} queries...");
    let probes: Vec<usize> = (0..NUM_QUERIES).map(|_| rng.gen_range(0..N)).collect();

    let lsh_start = Instant::now();
    let lsh_results: Vec<HashSet<String>> = probes
        .iter()
        .map(|&p| {
            index
                .query(&signatures[p])
                .expect("query failed")
                .into_iter()
                .map(|id| id.as_str().to_owned())
                .collect()
        })
        .collect();
    let lsh_time = lsh_start.elapsed();

    let brute_start = Instant::now();
    let exact_results: Vec<HashSet<String>> = probes
        .iter()
        .map(|&p| {
            signatures
                .iter()
                .enumerate()
                .filter(|(_, s)| s.jaccard(&signatures[p]).unwrap_or(0.0) >= THRESHOLD)
                .map(|(i, _)| format!("col-{i}"))
                .collect()
        })
        .collect();
    let brute_time = brute_start.elapsed();

    // ---------------------------------------------------------------
    // 4. Report.
    // ---------------------------------------------------------------
    println!("[4/4] Results\n");
    let (mut found, mut relevant, mut candidates) = (0usize, 0usize, 0usize);
    for (lsh, exact) in lsh_results.iter().zip(&exact_results) {
        found += exact.intersection(lsh).count();
        relevant += exact.len();
        candidates += lsh.len();
    }
    println!("  LSH total:     {lsh_time:.2?}");
    println!("  Brute total:   {brute_time:.2?}");
    println!(
        "  Speedup:       {:.1}x",
        brute_time.as_secs_f64() / lsh_time.as_secs_f64().max(1e-9)
    );
    println!(
        "  Recall:        {:.3}",
        if relevant > 0 { found as f64 / relevant as f64 } else { 1.0 }
    );
    println!("  Avg candidates per query: {:.1}", candidates as f64 / NUM_QUERIES as f64);
    println!("\n  {}", index.stats());
}
