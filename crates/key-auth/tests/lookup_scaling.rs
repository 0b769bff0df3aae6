//! Authentication cost must not grow with the number of stored keys.

use std::sync::Arc;
use std::time::{Duration, Instant};

use api_key::KeyFormat;
use key_auth::{
    IssueRequest, KeyIssuer, KeyStore, MemoryKeyStore, SqliteKeyStore, Verifier, VerifierConfig,
};

const LOOKUPS: u32 = 200;

/// Issue `count` keys and return the mean time to authenticate one of them.
async fn mean_auth_time(store: Arc<dyn KeyStore>, count: usize) -> Duration {
    let format = KeyFormat::new("sk").with_namespace("mono");
    let issuer = KeyIssuer::new(store.clone(), format).unwrap();
    let mut keys = Vec::with_capacity(count);
    for i in 0..count {
        let issued = issuer
            .issue(IssueRequest::new(format!("key {}", i)))
            .await
            .unwrap();
        keys.push(issued.key);
    }

    let verifier = Verifier::new(store, VerifierConfig::new("sk"));
    // Warm up caches and prepared statements.
    verifier.authenticate(&keys[0]).await.unwrap();

    let start = Instant::now();
    for i in 0..LOOKUPS as usize {
        verifier.authenticate(&keys[i % keys.len()]).await.unwrap();
    }
    start.elapsed() / LOOKUPS
}

fn assert_flat(label: &str, timings: &[(usize, Duration)]) {
    let (_, smallest) = timings[0];
    let (largest_count, largest) = timings[timings.len() - 1];
    println!("{} lookup timings: {:?}", label, timings);

    // A scan over 1000 rows would be ~100x slower than over 10. Allow a wide
    // margin for scheduler noise.
    let bound = smallest * 10 + Duration::from_millis(1);
    assert!(
        largest <= bound,
        "{}: lookup with {} keys took {:?}, bound {:?}",
        label,
        largest_count,
        largest,
        bound
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_memory_lookup_is_flat() {
    let mut timings = Vec::new();
    for count in [10, 100, 1000] {
        let store = Arc::new(MemoryKeyStore::new());
        timings.push((count, mean_auth_time(store, count).await));
    }
    assert_flat("memory", &timings);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sqlite_lookup_is_flat() {
    let dir = tempfile::tempdir().unwrap();
    let mut timings = Vec::new();
    for count in [10, 100, 1000] {
        let path = dir.path().join(format!("keys-{}.db", count));
        let store = Arc::new(SqliteKeyStore::open(path, 2).unwrap());
        timings.push((count, mean_auth_time(store, count).await));
    }
    assert_flat("sqlite", &timings);
}
