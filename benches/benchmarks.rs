//! Бенчмарки для txndb

use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;
use txndb::common::config::LogManagerConfig;
use txndb::concurrency::{LockManager, Transaction};
use txndb::logging::{LogManager, LogRecord};
use txndb::storage::{DiskManager, FileDiskManager, Tuple};
use txndb::{Rid, INVALID_LSN};

fn lock_exclusive_unlock_benchmark(c: &mut Criterion) {
    let lm = LockManager::new(false);
    c.bench_function("lock_exclusive_unlock", |b| {
        let mut next_id = 0;
        b.iter(|| {
            let txn = Transaction::new(next_id);
            next_id += 1;
            let rid = Rid::new(0, 0);
            lm.lock_exclusive(&txn, rid);
            lm.unlock(&txn, rid);
        });
    });
}

fn lock_shared_fan_out_benchmark(c: &mut Criterion) {
    let lm = LockManager::new(false);
    c.bench_function("lock_shared_100_rids", |b| {
        let mut next_id = 0;
        b.iter(|| {
            let txn = Transaction::new(next_id);
            next_id += 1;
            for slot in 0..100 {
                lm.lock_shared(&txn, Rid::new(0, slot));
            }
            for slot in 0..100 {
                lm.unlock(&txn, Rid::new(0, slot));
            }
        });
    });
}

fn log_record_serialize_benchmark(c: &mut Criterion) {
    let record = LogRecord::new_insert(1, INVALID_LSN, Rid::new(0, 0), Tuple::new(vec![7u8; 64]));
    let mut buf = vec![0u8; record.size() as usize];
    c.bench_function("log_record_serialize", |b| {
        b.iter(|| {
            record.serialize_into(&mut buf);
        });
    });
}

fn log_append_benchmark(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let disk = Arc::new(FileDiskManager::new(dir.path().join("bench.log")).unwrap());
    let config = LogManagerConfig {
        log_buffer_size: 1 << 20,
        flush_timeout: Duration::from_millis(100),
    };
    let lm = LogManager::with_config(config, disk as Arc<dyn DiskManager>);
    lm.start_flush_thread();

    c.bench_function("log_append_64b", |b| {
        b.iter(|| {
            let mut record =
                LogRecord::new_insert(1, INVALID_LSN, Rid::new(0, 0), Tuple::new(vec![0u8; 64]));
            lm.append_log_record(&mut record)
        });
    });

    lm.stop_flush_thread();
}

criterion_group!(
    benches,
    lock_exclusive_unlock_benchmark,
    lock_shared_fan_out_benchmark,
    log_record_serialize_benchmark,
    log_append_benchmark
);
criterion_main!(benches);
