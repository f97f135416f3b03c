use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use sqlite_access::prelude::*;
use sqlite_access::Result;

fn unique_db_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    dir.path().join(format!("{name}.sqlite"))
}

fn counter_queue() -> Result<DatabaseQueue> {
    let queue = DatabaseQueue::in_memory(Configuration::builder().label("counter").finish())?;
    queue.write(|db| {
        db.execute_batch(
            "CREATE TABLE counter (id INTEGER PRIMARY KEY, value INTEGER NOT NULL);
             INSERT INTO counter (id, value) VALUES (1, 0);
             CREATE TABLE log (thread INTEGER NOT NULL, seq INTEGER NOT NULL);",
        )
    })?;
    Ok(queue)
}

#[test]
fn concurrent_writes_are_serialized() -> Result<()> {
    const THREADS: i64 = 8;
    const WRITES: i64 = 50;

    let queue = counter_queue()?;
    let handles: Vec<_> = (0..THREADS)
        .map(|thread_no| {
            let queue = queue.clone();
            thread::spawn(move || -> Result<()> {
                for seq in 0..WRITES {
                    queue.write(move |db| {
                        // Read-modify-write: lost updates would show up in the final count.
                        let current = db
                            .fetch_value::<i64>("SELECT value FROM counter WHERE id = 1", ())?
                            .unwrap_or_default();
                        db.execute(
                            "UPDATE counter SET value = ? WHERE id = 1",
                            params![current + 1],
                        )?;
                        db.execute("INSERT INTO log VALUES (?, ?)", params![thread_no, seq])?;
                        Ok(())
                    })?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread")?;
    }

    let (value, per_thread) = queue.read(|db| {
        let value = db.fetch_value::<i64>("SELECT value FROM counter", ())?;
        let mut per_thread = Vec::new();
        for thread_no in 0..THREADS {
            let seqs: Vec<i64> = db.fetch_values(
                "SELECT seq FROM log WHERE thread = ? ORDER BY rowid",
                params![thread_no],
            )?;
            per_thread.push(seqs);
        }
        Ok((value, per_thread))
    })?;
    assert_eq!(value, Some(THREADS * WRITES));
    let expected: Vec<i64> = (0..WRITES).collect();
    for seqs in per_thread {
        assert_eq!(seqs, expected, "each thread's writes keep their submission order");
    }
    Ok(())
}

#[test]
fn reads_cannot_write() -> Result<()> {
    let queue = counter_queue()?;
    let err = queue
        .read(|db| db.execute("UPDATE counter SET value = 99", ()))
        .unwrap_err();
    assert!(matches!(err, SqliteAccessError::Misuse(_)));

    let err = queue
        .read(|db| db.execute_batch("DELETE FROM counter"))
        .unwrap_err();
    assert!(matches!(err, SqliteAccessError::Misuse(_)));

    // The connection is writable again afterwards.
    queue.write(|db| db.execute("UPDATE counter SET value = 5", ()))?;
    let value = queue.read(|db| db.fetch_value::<i64>("SELECT value FROM counter", ()))?;
    assert_eq!(value, Some(5));
    Ok(())
}

#[test]
fn access_mode_selects_read_or_write() -> Result<()> {
    let queue = counter_queue()?;
    let read_only = queue.with_connection(AccessMode::from_read_only(true), |db| {
        Ok(db.is_read_only_access())
    })?;
    assert!(read_only);
    let changed = queue.with_connection(AccessMode::Write, |db| {
        db.execute("UPDATE counter SET value = value + 1", ())
    })?;
    assert_eq!(changed, 1);
    Ok(())
}

#[test]
fn reentrant_access_is_misuse() -> Result<()> {
    let queue = counter_queue()?;
    let inner = queue.clone();
    let nested = queue.write(move |_db| Ok(inner.read(|db| db.fetch_value::<i64>("SELECT 1", ()))))?;
    assert!(matches!(nested, Err(SqliteAccessError::Misuse(_))));
    Ok(())
}

#[test]
fn panics_roll_back_and_resume_on_the_caller() -> Result<()> {
    let queue = counter_queue()?;
    let panicking = queue.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        panicking.write(|db| -> Result<()> {
            db.execute("UPDATE counter SET value = 42", ())?;
            panic!("body failed midway");
        })
    }));
    let payload = outcome.expect_err("panic resumes on the caller");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"body failed midway"));

    // The worker survived and the update was rolled back.
    let value = queue.read(|db| db.fetch_value::<i64>("SELECT value FROM counter", ()))?;
    assert_eq!(value, Some(0));
    Ok(())
}

#[test]
fn closed_queue_rejects_work() -> Result<()> {
    let queue = counter_queue()?;
    let clone = queue.clone();
    queue.close()?;
    let err = clone.read(|db| db.fetch_value::<i64>("SELECT 1", ())).unwrap_err();
    assert!(matches!(err, SqliteAccessError::Closed));
    queue.close()?;
    Ok(())
}

#[test]
fn concurrent_closes_wait_for_queued_work() -> Result<()> {
    let queue = counter_queue()?;
    let finished = Arc::new(AtomicBool::new(false));
    let (started_tx, started_rx) = mpsc::channel();

    let writer = {
        let queue = queue.clone();
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            queue.write(move |db| {
                let _ = started_tx.send(());
                thread::sleep(Duration::from_millis(200));
                db.execute("UPDATE counter SET value = value + 1", ())?;
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
        })
    };
    started_rx.recv().expect("write started");

    let closers: Vec<_> = (0..2)
        .map(|_| {
            let queue = queue.clone();
            let finished = Arc::clone(&finished);
            thread::spawn(move || -> Result<bool> {
                queue.close()?;
                Ok(finished.load(Ordering::SeqCst))
            })
        })
        .collect();
    for closer in closers {
        assert!(closer.join().expect("closer thread")?);
    }
    writer.join().expect("writer thread")?;
    Ok(())
}

#[test]
fn file_queue_persists_across_reopen() -> Result<()> {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = unique_db_path(&dir, "persist");
    {
        let queue = Configuration::builder().open_queue(&path)?;
        assert_eq!(queue.path(), Some(path.as_path()));
        queue.write(|db| {
            db.execute_batch("CREATE TABLE t (v TEXT)")?;
            db.execute("INSERT INTO t VALUES (?)", params!["kept"])
        })?;
        queue.close()?;
    }

    let reopened = Configuration::builder().read_only(true).open_queue(&path)?;
    let kept = reopened.read(|db| db.fetch_value::<String>("SELECT v FROM t", ()))?;
    assert_eq!(kept.as_deref(), Some("kept"));
    let err = reopened
        .write(|db| db.execute("INSERT INTO t VALUES ('nope')", ()))
        .unwrap_err();
    assert!(matches!(err, SqliteAccessError::Misuse(_)));
    let engine = reopened.write(|db| Ok(db.last_error()))?.expect("engine error recorded");
    assert_eq!(engine.code, 8);
    Ok(())
}

#[tokio::test]
async fn async_accesses_run_on_the_queue() -> Result<()> {
    let queue = counter_queue()?;
    queue
        .write_async(|db| db.execute("UPDATE counter SET value = 3", ()))
        .await?;
    let value = queue
        .read_async(|db| db.fetch_value::<i64>("SELECT value FROM counter", ()))
        .await?;
    assert_eq!(value, Some(3));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .write_async(|db| db.execute("UPDATE counter SET value = value + 1", ()))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task")?;
    }
    let value = queue
        .read_async(|db| db.fetch_value::<i64>("SELECT value FROM counter", ()))
        .await?;
    assert_eq!(value, Some(7));
    Ok(())
}
