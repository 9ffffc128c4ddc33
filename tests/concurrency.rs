mod common;

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use batchfetch::{Loader, LoaderConfig};
use common::Batcher;
use futures::future;
use rand::seq::SliceRandom;
use rand::thread_rng;
use tokio::runtime::Runtime;

#[test]
fn many_threads_share_one_loader() {
    let rt = Runtime::new().unwrap();
    let mut i = 0;
    while i < 20 {
        let batcher = Batcher::new();
        let config = LoaderConfig::default()
            .wait(Duration::from_millis(2))
            .max_batch_size(4);
        let loader: Loader<i32, i32, Batcher> =
            Loader::with_config(batcher.clone(), config).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let loader = loader.clone();
                let handle = rt.handle().clone();
                thread::spawn(move || {
                    let mut keys: Vec<i32> = (1..=12).collect();
                    keys.shuffle(&mut thread_rng());
                    let values = handle.block_on(async {
                        let thunks: Vec<_> = keys.iter().map(|&k| loader.load(k)).collect();
                        future::join_all(thunks.iter().map(|t| t.get())).await
                    });
                    for (key, value) in keys.iter().zip(values) {
                        assert_eq!(Ok(key * 10), value);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let calls = batcher.calls();
        for keys in &calls {
            assert!(keys.len() <= 4, "batch {:?} exceeds max_batch_size", keys);
            let unique: HashSet<_> = keys.iter().collect();
            assert_eq!(keys.len(), unique.len(), "duplicate key in batch {:?}", keys);
        }
        let loaded: HashSet<i32> = calls.into_iter().flatten().collect();
        assert_eq!((1..=12).collect::<HashSet<_>>(), loaded);
        assert_eq!(12, loader.cached_len());
        i += 1;
    }
}

#[test]
fn concurrent_same_key_fetched_once_per_window() {
    let rt = Runtime::new().unwrap();
    let batcher = Batcher::new();
    let config = LoaderConfig::default()
        .wait(Duration::from_millis(50))
        .max_batch_size(0);
    let loader: Loader<i32, i32, Batcher> = Loader::with_config(batcher.clone(), config).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let loader = loader.clone();
            let handle = rt.handle().clone();
            thread::spawn(move || handle.block_on(async move { loader.load(9).await }))
        })
        .collect();
    for h in handles {
        assert_eq!(Ok(90), h.join().unwrap());
    }
    assert_eq!(vec![vec![9]], batcher.calls());
}
