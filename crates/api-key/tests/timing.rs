use std::hint::black_box;
use std::time::{Duration, Instant};

use api_key::*;

const ROUNDS: usize = 31;
const ITERATIONS: usize = 20_000;

fn time_comparisons(a: &SecretDigest, b: &SecretDigest) -> Duration {
    let start = Instant::now();
    for _ in 0..ITERATIONS {
        black_box(digests_equal(black_box(a), black_box(b)));
    }
    start.elapsed()
}

/// Digests differing in the first byte and in the last byte take the same
/// time to compare. Rounds are interleaved and the fastest round of each
/// case is compared to filter scheduler noise.
#[test]
fn test_digest_comparison_is_constant_time() {
    let secret = Secret::from("timingprobesecret".to_string());
    let stored = hash_secret(&secret);

    let mut first = *stored.as_bytes();
    first[0] ^= 0xff;
    let first = SecretDigest::from_bytes(first);

    let mut last = *stored.as_bytes();
    last[DIGEST_LEN - 1] ^= 0xff;
    let last = SecretDigest::from_bytes(last);

    // Warm up caches and frequency scaling.
    time_comparisons(&stored, &first);
    time_comparisons(&stored, &last);

    let mut best_first = Duration::MAX;
    let mut best_last = Duration::MAX;
    for _ in 0..ROUNDS {
        best_first = best_first.min(time_comparisons(&stored, &first));
        best_last = best_last.min(time_comparisons(&stored, &last));
    }

    let ratio = best_first.as_nanos() as f64 / best_last.as_nanos().max(1) as f64;
    println!(
        "first-byte diff: {:?}, last-byte diff: {:?}, ratio {:.3}",
        best_first, best_last, ratio
    );
    assert!(
        (0.6..=1.67).contains(&ratio),
        "comparison time depends on mismatch position (ratio {:.3})",
        ratio
    );
}
