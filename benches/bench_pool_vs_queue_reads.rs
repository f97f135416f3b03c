//! Criterion benchmark comparing single-row lookups fanned out across threads through a
//! serialized queue against the same lookups through the WAL reader pool.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sqlite_access::prelude::*;
use std::hint::black_box;
use std::path::Path;
use std::thread;

const ROWS: i64 = 1_000;
const LOOKUPS_PER_THREAD: i64 = 200;
const SELECT_ONE: &str = "SELECT id, name, score FROM item WHERE id = ?";

#[derive(Debug, Default)]
struct BenchRow {
    id: i64,
    name: String,
    score: f64,
}

impl ColumnAssign for BenchRow {
    fn assign_column(
        &mut self,
        column: &str,
        value: &SqliteValue,
    ) -> Result<Assignment, ConversionError> {
        match column {
            "id" => self.id = i64::from_sqlite_value(value)?,
            "name" => self.name = String::from_sqlite_value(value)?,
            "score" => self.score = f64::from_sqlite_value(value)?,
            _ => return Ok(Assignment::Ignored),
        }
        Ok(Assignment::Applied)
    }
}

fn seed(path: &Path) -> Result<(), SqliteAccessError> {
    let queue = DatabaseQueue::open(path, Configuration::default())?;
    queue.write(|db| {
        db.execute_batch(
            "CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL NOT NULL)",
        )?;
        let mut insert = db.prepare("INSERT INTO item (id, name, score) VALUES (?, ?, ?)")?;
        for id in 1..=ROWS {
            #[allow(clippy::cast_precision_loss)]
            let score = id as f64 * 0.5;
            insert.execute(params![id, format!("item-{id}"), score])?;
        }
        Ok(())
    })?;
    queue.close()
}

fn lookup_id(thread_no: i64, n: i64) -> i64 {
    (thread_no * 7919 + n * 104_729) % ROWS + 1
}

fn queue_reads(queue: &DatabaseQueue, threads: i64) {
    thread::scope(|scope| {
        for thread_no in 0..threads {
            scope.spawn(move || {
                for n in 0..LOOKUPS_PER_THREAD {
                    let id = lookup_id(thread_no, n);
                    let row = queue
                        .read(move |db| db.fetch_one::<BenchRow>(SELECT_ONE, params![id]))
                        .expect("queue lookup");
                    black_box(row);
                }
            });
        }
    });
}

fn pool_reads(pool: &DatabasePool, threads: i64) {
    thread::scope(|scope| {
        for thread_no in 0..threads {
            scope.spawn(move || {
                for n in 0..LOOKUPS_PER_THREAD {
                    let id = lookup_id(thread_no, n);
                    let row = pool
                        .read(|db| db.fetch_one::<BenchRow>(SELECT_ONE, params![id]))
                        .expect("pool lookup");
                    black_box(row);
                }
            });
        }
    });
}

fn bench_reads(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bench.sqlite");
    seed(&path).expect("seed database");

    let pool = DatabasePool::open(
        &path,
        Configuration::builder().maximum_reader_count(8).finish(),
    )
    .expect("open pool");

    let mut group = c.benchmark_group("concurrent_single_row_reads");
    for threads in [1_i64, 4, 8] {
        #[allow(clippy::cast_sign_loss)]
        group.throughput(Throughput::Elements((threads * LOOKUPS_PER_THREAD) as u64));
        group.bench_with_input(BenchmarkId::new("pool", threads), &threads, |b, &threads| {
            b.iter(|| pool_reads(&pool, threads));
        });
    }
    group.finish();
    pool.close().expect("close pool");

    let queue = DatabaseQueue::open(&path, Configuration::default()).expect("open queue");
    let mut group = c.benchmark_group("concurrent_single_row_reads");
    for threads in [1_i64, 4, 8] {
        #[allow(clippy::cast_sign_loss)]
        group.throughput(Throughput::Elements((threads * LOOKUPS_PER_THREAD) as u64));
        group.bench_with_input(BenchmarkId::new("queue", threads), &threads, |b, &threads| {
            b.iter(|| queue_reads(&queue, threads));
        });
    }
    group.finish();
    queue.close().expect("close queue");
}

criterion_group!(benches, bench_reads);
criterion_main!(benches);
