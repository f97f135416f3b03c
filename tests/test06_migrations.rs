use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlite_access::prelude::*;
use sqlite_access::{LEDGER_TABLE, Result};

fn base_migrator(runs: &Arc<AtomicUsize>) -> Result<Migrator> {
    let mut migrator = Migrator::new();
    let counted = Arc::clone(runs);
    migrator
        .register("create team", move |db| {
            counted.fetch_add(1, Ordering::SeqCst);
            db.execute_batch("CREATE TABLE team (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
        })?
        .register("create member", |db| {
            db.execute_batch(
                "CREATE TABLE member (
                   id INTEGER PRIMARY KEY,
                   team_id INTEGER NOT NULL REFERENCES team (id),
                   name TEXT NOT NULL
                 )",
            )
        })?;
    Ok(migrator)
}

fn table_exists(queue: &DatabaseQueue, table: &'static str) -> Result<bool> {
    queue.read(move |db| {
        Ok(db
            .fetch_value::<i64>(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                params![table],
            )?
            .is_some())
    })
}

#[test]
fn migrate_is_idempotent() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let migrator = base_migrator(&runs)?;
    let queue = DatabaseQueue::in_memory(Configuration::default())?;

    let first = migrator.migrate(&queue)?;
    assert_eq!(first.applied, ["create team", "create member"]);
    assert!(first.skipped.is_empty());

    let second = migrator.migrate(&queue)?;
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, ["create team", "create member"]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert_eq!(
        migrator.applied_migrations(&queue)?,
        ["create team", "create member"]
    );
    assert!(migrator.has_completed_migrations(&queue)?);
    Ok(())
}

#[test]
fn failed_migration_rolls_back_and_resumes_later() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut broken = base_migrator(&runs)?;
    broken.register("add rank", |db| {
        db.execute_batch("ALTER TABLE member ADD COLUMN rank INTEGER")?;
        db.execute_batch("THIS IS NOT SQL")
    })?;
    let queue = DatabaseQueue::in_memory(Configuration::default())?;

    let err = broken.migrate(&queue).unwrap_err();
    match &err {
        SqliteAccessError::Migration { name, .. } => assert_eq!(name, "add rank"),
        other => panic!("expected migration failure, got {other:?}"),
    }
    assert!(err.database_error().is_some());
    assert_eq!(
        broken.applied_migrations(&queue)?,
        ["create team", "create member"]
    );
    assert_eq!(broken.pending_migrations(&queue)?, ["add rank"]);
    let rank_columns = queue.read(|db| {
        db.fetch_value::<i64>(
            "SELECT COUNT(*) FROM pragma_table_info('member') WHERE name = 'rank'",
            (),
        )
    })?;
    assert_eq!(rank_columns, Some(0), "the failed migration left no trace");

    let mut fixed = base_migrator(&runs)?;
    fixed.register("add rank", |db| {
        db.execute_batch("ALTER TABLE member ADD COLUMN rank INTEGER")
    })?;
    let report = fixed.migrate(&queue)?;
    assert_eq!(report.applied, ["add rank"]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn duplicate_names_are_rejected_at_registration() -> Result<()> {
    let mut migrator = Migrator::new();
    migrator.register("one", |_db| Ok(()))?;
    let err = migrator.register("one", |_db| Ok(())).unwrap_err();
    assert!(matches!(err, SqliteAccessError::Misuse(_)));
    assert_eq!(migrator.names().collect::<Vec<_>>(), ["one"]);
    Ok(())
}

#[test]
fn migrate_up_to_stops_at_the_target() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let migrator = base_migrator(&runs)?;
    let queue = DatabaseQueue::in_memory(Configuration::default())?;

    let report = migrator.migrate_up_to(&queue, "create team")?;
    assert_eq!(report.applied, ["create team"]);
    assert!(table_exists(&queue, "team")?);
    assert!(!table_exists(&queue, "member")?);
    assert!(!migrator.has_completed_migrations(&queue)?);

    assert!(matches!(
        migrator.migrate_up_to(&queue, "no such migration"),
        Err(SqliteAccessError::Misuse(_))
    ));

    migrator.migrate(&queue)?;
    assert!(matches!(
        migrator.migrate_up_to(&queue, "create team"),
        Err(SqliteAccessError::Misuse(_))
    ));
    Ok(())
}

#[test]
fn unknown_ledger_entries_fail_fast() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let queue = DatabaseQueue::in_memory(Configuration::default())?;
    let mut newer = base_migrator(&runs)?;
    newer.register("from the future", |db| {
        db.execute_batch("CREATE TABLE future (v INTEGER)")
    })?;
    newer.migrate(&queue)?;

    let older = base_migrator(&runs)?;
    let err = older.migrate(&queue).unwrap_err();
    match err {
        SqliteAccessError::MigrationHistoryMismatch(unknown) => {
            assert_eq!(unknown, ["from the future"]);
        }
        other => panic!("expected history mismatch, got {other:?}"),
    }
    Ok(())
}

#[test]
fn deferred_foreign_keys_allow_table_rebuilds() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut migrator = base_migrator(&runs)?;
    migrator
        .register("seed", |db| {
            db.execute_batch(
                "INSERT INTO team (id, name) VALUES (1, 'red');
                 INSERT INTO member (team_id, name) VALUES (1, 'ann');",
            )
        })?
        .register_with_deferred_foreign_keys("rebuild team", |db| {
            db.execute_batch(
                "CREATE TABLE new_team (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
                 INSERT INTO new_team SELECT id, name FROM team;
                 DROP TABLE team;
                 ALTER TABLE new_team RENAME TO team;",
            )
        })?;
    let queue = DatabaseQueue::in_memory(Configuration::default())?;
    migrator.migrate(&queue)?;

    let enforced = queue.write_without_transaction(|db| db.fetch_value::<bool>("PRAGMA foreign_keys", ()))?;
    assert_eq!(enforced, Some(true), "enforcement is restored after the migration");
    Ok(())
}

#[test]
fn deferred_foreign_key_violations_fail_the_migration() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut migrator = base_migrator(&runs)?;
    migrator.register_with_deferred_foreign_keys("orphan member", |db| {
        db.execute_batch("INSERT INTO member (team_id, name) VALUES (99, 'orphan')")
    })?;
    let queue = DatabaseQueue::in_memory(Configuration::default())?;

    let err = migrator.migrate(&queue).unwrap_err();
    let engine = err.database_error().expect("foreign key failure");
    assert!(engine.is_constraint_violation());
    let orphans = queue.read(|db| db.fetch_value::<i64>("SELECT COUNT(*) FROM member", ()))?;
    assert_eq!(orphans, Some(0));
    assert_eq!(migrator.pending_migrations(&queue)?, ["orphan member"]);
    Ok(())
}

#[test]
fn ledger_is_a_single_column_table() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let migrator = base_migrator(&runs)?;
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = DatabasePool::open(dir.path().join("ledger.sqlite"), Configuration::default())?;
    migrator.migrate(&pool)?;

    let columns = pool.read(|db| {
        db.fetch_values::<String>(
            &format!("SELECT name FROM pragma_table_info('{LEDGER_TABLE}')"),
            (),
        )
    })?;
    assert_eq!(columns, ["identifier"]);
    assert!(migrator.has_completed_migrations(&pool)?);
    Ok(())
}

#[test]
fn run_refuses_an_open_transaction() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let migrator = base_migrator(&runs)?;
    let queue = DatabaseQueue::in_memory(Configuration::default())?;
    let result = queue.write(move |db| Ok(migrator.run(db, None)))?;
    assert!(matches!(result, Err(SqliteAccessError::Misuse(_))));
    Ok(())
}
