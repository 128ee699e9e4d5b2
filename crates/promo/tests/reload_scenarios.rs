//! 🎬 End-to-end reload scenarios, through the public front door only.
//!
//! Every test builds a [`PromotionCache`] over an [`InMemoryStore`] it keeps a clone
//! of, runs reloads, and then inspects what the store actually received.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use promo::app_config::{SourceConfig, StoreConfig};
use promo::backends::{InMemorySourceConfig, InMemoryStore};
use promo::{
    AccumulationStrategy, AppConfig, CancelToken, DecodePolicy, DecodeReason, LoadError,
    Promotion, PromotionCache, RuntimeConfig, SourceBackend, StoreBackend, StoreError,
};

fn runtime(batch_size: usize) -> RuntimeConfig {
    RuntimeConfig {
        batch_size,
        worker_count: 4,
        queue_capacity: 8,
        flush_backoff_ms: 1,
        ..RuntimeConfig::default()
    }
}

fn cache(runtime: RuntimeConfig, store: &InMemoryStore) -> PromotionCache {
    let config = AppConfig {
        source_config: SourceConfig::InMemory(InMemorySourceConfig::default()),
        store_config: StoreConfig::InMemory,
        runtime,
    };
    PromotionCache::new(config, StoreBackend::InMemory(store.clone()))
        .expect("test runtime config is valid")
}

fn lines(rows: &[&str]) -> Option<SourceBackend> {
    Some(SourceBackend::lines(rows.iter().copied()))
}

#[tokio::test]
async fn the_one_where_two_good_rows_become_two_promotions() -> Result<()> {
    let store = InMemoryStore::new();
    let cache = cache(runtime(10), &store);

    let report = cache
        .reload_with(
            lines(&["A,10.0,2025-01-01", "B,20.0,2025-02-02"]),
            CancelToken::new(),
        )
        .await?;

    assert_eq!(report.message(), "Promotions loaded successfully");
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.flush_calls, 1);
    assert_eq!(cache.get("A").await?, Some(Promotion::new("A", 10.0, "2025-01-01")));
    assert_eq!(cache.get("B").await?.map(|p| p.price), Some(20.0));
    assert_eq!(cache.get("C").await?, None);
    Ok(())
}

#[tokio::test]
async fn the_one_where_fail_fast_leaves_an_empty_store() -> Result<()> {
    let store = InMemoryStore::new();
    let cache = cache(
        RuntimeConfig {
            decode_policy: DecodePolicy::FailFast,
            ..runtime(10)
        },
        &store,
    );

    let err = cache
        .reload_with(
            lines(&["A,10.0,2025-01-01", "B,notanumber,2025-02-02"]),
            CancelToken::new(),
        )
        .await
        .expect_err("bad price must fail the load");

    match err {
        LoadError::Decode(decode) => {
            assert_eq!(decode.line, 2);
            assert!(matches!(decode.reason, DecodeReason::InvalidPrice { .. }));
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
    assert!(store.snapshot().await.is_empty());
    assert_eq!(cache.get("A").await?, None);
    Ok(())
}

#[tokio::test]
async fn the_one_where_skip_keeps_the_good_row() -> Result<()> {
    let store = InMemoryStore::new();
    let cache = cache(runtime(10), &store);

    let report = cache
        .reload_with(
            lines(&["A,10.0,2025-01-01", "B,notanumber,2025-02-02"]),
            CancelToken::new(),
        )
        .await?;

    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.rows_decoded, 1);
    assert_eq!(report.sample_errors.len(), 1);
    assert_eq!(report.sample_errors[0].line, 2);
    assert!(report.sample_errors[0].to_string().contains("row 2"));
    assert_eq!(store.snapshot().await.keys().collect::<Vec<_>>(), vec!["A"]);
    Ok(())
}

#[tokio::test]
async fn the_one_where_empty_input_means_an_empty_store() -> Result<()> {
    let store = InMemoryStore::new();
    let cache = cache(runtime(10), &store);
    cache
        .reload_with(lines(&["OLD,1.0,2020-01-01"]), CancelToken::new())
        .await?;

    let report = cache.reload_with(lines(&[]), CancelToken::new()).await?;

    assert_eq!(report.flush_calls, 0);
    assert_eq!(report.rows_read, 0);
    assert!(store.snapshot().await.is_empty(), "the old generation is gone");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn the_one_where_flush_count_is_the_ceiling_of_n_over_b() -> Result<()> {
    // 🧪 N = 1000 distinct ids, B = 64 → ⌈1000/64⌉ = 16 flushes, each id written exactly once
    let rows: Vec<String> = (0..1000)
        .map(|i| format!("ID{i:04},{i}.25,2030-12-31"))
        .collect();

    for strategy in [AccumulationStrategy::LockedMap, AccumulationStrategy::LockFree] {
        let store = InMemoryStore::new();
        let cache = cache(
            RuntimeConfig {
                strategy,
                worker_count: 8,
                ..runtime(64)
            },
            &store,
        );
        let report = cache
            .reload_with(Some(SourceBackend::lines(rows.clone())), CancelToken::new())
            .await?;

        let sizes = store.put_call_sizes().await;
        assert_eq!(report.flush_calls, 16, "{strategy}");
        assert_eq!(sizes.len(), 16, "{strategy}");
        assert_eq!(sizes.iter().sum::<usize>(), 1000, "{strategy}: no id flushed twice");
        assert_eq!(sizes.iter().filter(|&&s| s == 64).count(), 15, "{strategy}");
        assert_eq!(store.snapshot().await.len(), 1000);
    }
    Ok(())
}

#[tokio::test]
async fn the_one_where_the_same_file_twice_gives_the_same_store() -> Result<()> {
    // 🧪 50 ids repeat. one worker makes "last write" mean last line, so whole maps can be compared.
    let rows: Vec<String> = (0..250)
        .map(|i| format!("P{},{}.5,2031-01-01", i % 200, i))
        .collect();
    let store = InMemoryStore::new();
    let cache = cache(
        RuntimeConfig {
            strategy: AccumulationStrategy::Serial,
            ..runtime(32)
        },
        &store,
    );

    cache
        .reload_with(Some(SourceBackend::lines(rows.clone())), CancelToken::new())
        .await?;
    let first: HashMap<String, Promotion> = store.snapshot().await;
    let report = cache
        .reload_with(Some(SourceBackend::lines(rows)), CancelToken::new())
        .await?;
    let second = store.snapshot().await;

    assert_eq!(first.len(), 200);
    assert_eq!(first, second);
    assert_eq!(first["P0"].price, 200.5, "the later line wins");
    assert_eq!(report.generation, 2);
    assert_eq!(report.records_flushed, 250, "duplicates are still accounted for");
    Ok(())
}

#[tokio::test]
async fn the_one_where_duplicates_end_up_as_one_entry() -> Result<()> {
    // 🧪 serial + batch size larger than the input: one batch, last write wins
    let store = InMemoryStore::new();
    let cache = cache(
        RuntimeConfig {
            strategy: AccumulationStrategy::Serial,
            ..runtime(100)
        },
        &store,
    );
    let report = cache
        .reload_with(
            lines(&["A,1.0,2025-01-01", "A,2.0,2025-01-01", "A,3.0,2025-01-01"]),
            CancelToken::new(),
        )
        .await?;

    assert_eq!(report.records_flushed, 3);
    assert_eq!(report.entries_written, 1);
    assert_eq!(cache.get("A").await?.map(|p| p.price), Some(3.0));
    Ok(())
}

#[tokio::test]
async fn the_one_where_a_transient_store_failure_is_retried() -> Result<()> {
    let store = InMemoryStore::new();
    store.fail_next_puts(2);
    let cache = cache(runtime(10), &store);

    let report = cache
        .reload_with(lines(&["A,10.0,2025-01-01"]), CancelToken::new())
        .await?;

    assert_eq!(report.flush_calls, 1);
    assert_eq!(store.put_attempts(), 3);
    assert!(cache.get("A").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn the_one_where_a_dead_store_fails_the_load() {
    let store = InMemoryStore::new();
    store.fail_next_puts(usize::MAX);
    let cache = cache(
        RuntimeConfig {
            flush_max_retries: 2,
            ..runtime(10)
        },
        &store,
    );

    let err = cache
        .reload_with(lines(&["A,10.0,2025-01-01"]), CancelToken::new())
        .await
        .expect_err("a store that never accepts a write must fail the load");

    assert!(matches!(err, LoadError::Store(StoreError::Backend { .. })));
    assert_eq!(store.put_attempts(), 3, "first attempt plus two retries");
}

#[tokio::test]
async fn the_one_where_cancel_before_the_first_row_aborts() {
    let store = InMemoryStore::new();
    let cache = cache(runtime(10), &store);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = cache
        .reload_with(lines(&["A,10.0,2025-01-01"]), cancel)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, LoadError::Cancelled { rows_read: 0 }));
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn the_one_where_cancel_mid_load_stops_the_reader() -> Result<()> {
    // 🧪 a slow store and a tiny queue keep the reader blocked on backpressure
    let store = InMemoryStore::new().with_put_delay(Duration::from_millis(50));
    let cache = std::sync::Arc::new(cache(
        RuntimeConfig {
            worker_count: 1,
            queue_capacity: 1,
            ..runtime(1)
        },
        &store,
    ));
    let rows: Vec<String> = (0..1000).map(|i| format!("P{i},1.0,2030-01-01")).collect();
    let cancel = CancelToken::new();

    let load = {
        let cache = std::sync::Arc::clone(&cache);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cache
                .reload_with(Some(SourceBackend::lines(rows)), cancel)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;
    cancel.cancel();

    let err = load.await?.expect_err("cancelled mid-load");
    match err {
        LoadError::Cancelled { rows_read } => assert!(rows_read < 1000, "read {rows_read}"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn the_one_where_an_upload_stream_is_a_source() -> Result<()> {
    let store = InMemoryStore::new();
    let cache = cache(runtime(10), &store);
    let body: &'static [u8] = b"A,10.0,2025-01-01\r\nB,20.0,2025-02-02\r\n";

    let report = cache
        .reload_with(Some(SourceBackend::stream(body)), CancelToken::new())
        .await?;
    assert_eq!(report.entries_written, 2);
    Ok(())
}

#[tokio::test]
async fn the_one_where_a_file_on_disk_is_a_source() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "A,10.0,2025-01-01")?;
    writeln!(file)?;
    writeln!(file, "B,oops,2025-02-02")?;

    let store = InMemoryStore::new();
    let cache = cache(runtime(10), &store);
    let report = cache
        .reload_with(
            Some(SourceBackend::file(file.path()).await?),
            CancelToken::new(),
        )
        .await?;

    assert_eq!(report.rows_read, 2, "the blank line is not a row");
    assert_eq!(report.sample_errors[0].line, 3, "but it still counts as a line");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn the_one_where_every_strategy_builds_the_same_store() -> Result<()> {
    // 🧪 distinct ids, so interleaving can't matter. the full id → promotion map must match exactly.
    let rows: Vec<String> = (0..500)
        .map(|i| format!("ID{i:03},{}.{},2030-{:02}-01", i * 3, i % 100, i % 12 + 1))
        .collect();
    let expected: HashMap<String, Promotion> = rows
        .iter()
        .map(|row| {
            let mut fields = row.split(',');
            let id = fields.next().unwrap_or_default().to_string();
            let price = fields.next().unwrap_or_default().parse().unwrap_or(f64::NAN);
            let date = fields.next().unwrap_or_default();
            (id.clone(), Promotion::new(id, price, date))
        })
        .collect();

    let layouts = [
        (AccumulationStrategy::LockedMap, 1),
        (AccumulationStrategy::LockedMap, 8),
        (AccumulationStrategy::LockFree, 3),
        (AccumulationStrategy::LockFree, 8),
        (AccumulationStrategy::Serial, 4),
    ];
    for (strategy, worker_count) in layouts {
        let store = InMemoryStore::new();
        let cache = cache(
            RuntimeConfig {
                strategy,
                worker_count,
                ..runtime(17)
            },
            &store,
        );
        cache
            .reload_with(Some(SourceBackend::lines(rows.clone())), CancelToken::new())
            .await?;
        assert_eq!(
            store.snapshot().await,
            expected,
            "{strategy} with {worker_count} workers"
        );
    }
    Ok(())
}

#[tokio::test]
async fn the_one_where_fail_fast_keeps_what_was_already_flushed() -> Result<()> {
    // 🧪 serial + batch size 1: A is flushed before B blows up, C never makes it
    let store = InMemoryStore::new();
    let cache = cache(
        RuntimeConfig {
            strategy: AccumulationStrategy::Serial,
            decode_policy: DecodePolicy::FailFast,
            ..runtime(1)
        },
        &store,
    );

    let err = cache
        .reload_with(
            lines(&["A,10.0,2025-01-01", "B,notanumber,2025-02-02", "C,30.0,2025-03-03"]),
            CancelToken::new(),
        )
        .await
        .expect_err("B must fail the load");

    assert!(matches!(err, LoadError::Decode(ref decode) if decode.line == 2));
    let expected: HashMap<String, Promotion> =
        HashMap::from([("A".to_string(), Promotion::new("A", 10.0, "2025-01-01"))]);
    assert_eq!(store.snapshot().await, expected, "no rollback, and nothing after B");
    assert_eq!(store.put_call_sizes().await, vec![1]);
    Ok(())
}

#[tokio::test]
async fn the_one_where_a_stray_latin1_byte_costs_nobody_their_row() -> Result<()> {
    // 🧪 an upload with one non-UTF-8 byte in the date. skip policy, nothing is lost.
    let store = InMemoryStore::new();
    let cache = cache(runtime(10), &store);
    let body: &'static [u8] =
        b"A,10.0,2025-01-01\nB,20.0,2025-02-02 caf\xe9\nC,30.0,2025-03-03\n";

    let report = cache
        .reload_with(Some(SourceBackend::stream(body)), CancelToken::new())
        .await?;

    assert_eq!(report.rows_read, 3);
    assert_eq!(report.rows_skipped, 0);
    let ids: BTreeSet<String> = store.snapshot().await.into_keys().collect();
    assert_eq!(ids, BTreeSet::from(["A".to_string(), "B".to_string(), "C".to_string()]));
    assert_eq!(
        cache.get("B").await?.map(|p| p.expiration_date),
        Some("2025-02-02 caf\u{FFFD}".to_string())
    );
    Ok(())
}
