use sqlite_access::prelude::*;
use sqlite_access::{Connection, Result};

#[derive(Debug, Clone, Default, PartialEq)]
struct Player {
    id: Option<i64>,
    name: String,
    score: i64,
}

impl ColumnAssign for Player {
    fn assign_column(
        &mut self,
        column: &str,
        value: &SqliteValue,
    ) -> std::result::Result<Assignment, ConversionError> {
        match column {
            "id" => self.id = FromSqliteValue::from_sqlite_value(value)?,
            "name" => self.name = FromSqliteValue::from_sqlite_value(value)?,
            "score" => self.score = FromSqliteValue::from_sqlite_value(value)?,
            _ => return Ok(Assignment::Ignored),
        }
        Ok(Assignment::Applied)
    }
}

impl Record for Player {
    fn table_name() -> Option<&'static str> {
        Some("player")
    }

    fn primary_key() -> PrimaryKey {
        PrimaryKey::RowId("id")
    }

    fn encode(&self, values: &mut ColumnValues) {
        values
            .set("id", self.id)
            .set("name", self.name.as_str())
            .set("score", self.score);
    }
}

/// Composite, caller-managed key.
#[derive(Debug, Clone, Default, PartialEq)]
struct Membership {
    team: String,
    player_id: i64,
    role: Option<String>,
}

impl ColumnAssign for Membership {
    fn assign_column(
        &mut self,
        column: &str,
        value: &SqliteValue,
    ) -> std::result::Result<Assignment, ConversionError> {
        match column {
            "team" => self.team = FromSqliteValue::from_sqlite_value(value)?,
            "player_id" => self.player_id = FromSqliteValue::from_sqlite_value(value)?,
            "role" => self.role = FromSqliteValue::from_sqlite_value(value)?,
            _ => return Ok(Assignment::Ignored),
        }
        Ok(Assignment::Applied)
    }
}

impl Record for Membership {
    fn table_name() -> Option<&'static str> {
        Some("membership")
    }

    fn primary_key() -> PrimaryKey {
        PrimaryKey::Composite(&["team", "player_id"])
    }

    fn encode(&self, values: &mut ColumnValues) {
        values
            .set("team", self.team.as_str())
            .set("player_id", self.player_id)
            .set("role", self.role.as_deref());
    }
}

/// Insert-only record without a key.
#[derive(Debug, Clone, Default)]
struct Event {
    message: String,
}

impl ColumnAssign for Event {
    fn assign_column(
        &mut self,
        column: &str,
        value: &SqliteValue,
    ) -> std::result::Result<Assignment, ConversionError> {
        if column != "message" {
            return Ok(Assignment::Ignored);
        }
        self.message = String::from_sqlite_value(value)?;
        Ok(Assignment::Applied)
    }
}

impl Record for Event {
    fn table_name() -> Option<&'static str> {
        Some("event")
    }

    fn encode(&self, values: &mut ColumnValues) {
        values.set("message", self.message.as_str());
    }
}

/// Projection with an extra computed column layered over `Player`.
#[derive(Debug, Default)]
struct RankedPlayer {
    player: Player,
    rank: i64,
}

impl ColumnAssign for RankedPlayer {
    fn assign_column(
        &mut self,
        column: &str,
        value: &SqliteValue,
    ) -> std::result::Result<Assignment, ConversionError> {
        if column == "rank" {
            self.rank = i64::from_sqlite_value(value)?;
            return Ok(Assignment::Applied);
        }
        self.player.assign_column(column, value)
    }
}

/// A record that never declared its table.
#[derive(Debug, Default)]
struct Orphan {
    id: Option<i64>,
}

impl ColumnAssign for Orphan {
    fn assign_column(
        &mut self,
        column: &str,
        value: &SqliteValue,
    ) -> std::result::Result<Assignment, ConversionError> {
        if column != "id" {
            return Ok(Assignment::Ignored);
        }
        self.id = FromSqliteValue::from_sqlite_value(value)?;
        Ok(Assignment::Applied)
    }
}

impl Record for Orphan {
    fn primary_key() -> PrimaryKey {
        PrimaryKey::RowId("id")
    }

    fn encode(&self, values: &mut ColumnValues) {
        values.set("id", self.id);
    }
}

fn schema() -> Result<Connection> {
    let db = Connection::open_in_memory(&Configuration::default())?;
    db.execute_batch(
        "CREATE TABLE player (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score INTEGER NOT NULL);
         CREATE TABLE membership (
           team TEXT NOT NULL,
           player_id INTEGER NOT NULL,
           role TEXT,
           PRIMARY KEY (team, player_id)
         );
         CREATE TABLE event (message TEXT NOT NULL);",
    )?;
    Ok(db)
}

fn arthur() -> Player {
    Player {
        id: None,
        name: "Arthur".into(),
        score: 0,
    }
}

#[test]
fn insert_assigns_the_row_id() -> Result<()> {
    let db = schema()?;
    let mut player = arthur();
    player.insert(&db)?;
    let id = player.id.expect("id assigned by insert");

    let fetched = Player::find(&db, &[SqliteValue::Integer(id)])?;
    assert_eq!(fetched, Some(player));
    assert_eq!(Player::count(&db)?, 1);
    Ok(())
}

#[test]
fn delete_then_reload_is_row_not_found() -> Result<()> {
    let db = schema()?;
    let mut player = arthur();
    player.insert(&db)?;
    player.delete(&db)?;

    let err = player.reload(&db).unwrap_err();
    assert!(matches!(err, SqliteAccessError::RowNotFound { ref table, .. } if table == "player"));
    assert!(matches!(
        player.delete(&db),
        Err(SqliteAccessError::RowNotFound { .. })
    ));
    assert!(matches!(
        player.update(&db),
        Err(SqliteAccessError::RowNotFound { .. })
    ));
    assert!(!player.exists(&db)?);
    Ok(())
}

#[test]
fn update_and_reload_round_trip() -> Result<()> {
    let db = schema()?;
    let mut player = arthur();
    player.insert(&db)?;

    player.score = 250;
    player.update(&db)?;
    let mut stale = Player {
        id: player.id,
        ..Player::default()
    };
    stale.reload(&db)?;
    assert_eq!(stale, player);
    Ok(())
}

#[test]
fn missing_keys_are_invalid() -> Result<()> {
    let db = schema()?;
    let unsaved = arthur();
    for result in [unsaved.update(&db), unsaved.delete(&db)] {
        assert!(matches!(result, Err(SqliteAccessError::InvalidPrimaryKey(_))));
    }
    assert!(!unsaved.exists(&db)?);

    let event = Event {
        message: "boot".into(),
    };
    assert!(matches!(
        event.delete(&db),
        Err(SqliteAccessError::InvalidPrimaryKey(_))
    ));
    assert!(matches!(
        event.exists(&db),
        Err(SqliteAccessError::InvalidPrimaryKey(_))
    ));
    Ok(())
}

#[test]
fn records_without_a_table_are_unspecified() -> Result<()> {
    let db = schema()?;
    let mut orphan = Orphan::default();
    assert!(matches!(
        orphan.insert(&db),
        Err(SqliteAccessError::UnspecifiedTable(_))
    ));
    assert!(matches!(
        Orphan::fetch_all_records(&db),
        Err(SqliteAccessError::UnspecifiedTable(_))
    ));
    assert!(orphan.id.is_none());
    Ok(())
}

#[test]
fn keyless_records_are_insert_only() -> Result<()> {
    let db = schema()?;
    for message in ["boot", "ready"] {
        let mut event = Event {
            message: message.into(),
        };
        event.save(&db)?;
    }
    let messages: Vec<String> = Event::fetch_all_records(&db)?
        .into_iter()
        .map(|event| event.message)
        .collect();
    assert_eq!(messages, ["boot", "ready"]);
    assert_eq!(Event::delete_all(&db)?, 2);
    Ok(())
}

#[test]
fn composite_keys_are_caller_managed() -> Result<()> {
    let db = schema()?;
    let mut membership = Membership {
        team: "red".into(),
        player_id: 7,
        role: None,
    };
    // No stored row yet: save falls back to insert.
    membership.save(&db)?;
    membership.role = Some("captain".into());
    membership.save(&db)?;
    assert_eq!(Membership::count(&db)?, 1);

    let found = Membership::find(
        &db,
        &[SqliteValue::Text("red".into()), SqliteValue::Integer(7)],
    )?;
    assert_eq!(found, Some(membership.clone()));
    assert!(matches!(
        Membership::find(&db, &[SqliteValue::Text("red".into())]),
        Err(SqliteAccessError::Misuse(_))
    ));

    let duplicate = membership.clone().insert(&db).unwrap_err();
    assert!(duplicate
        .database_error()
        .is_some_and(DatabaseError::is_constraint_violation));
    Ok(())
}

#[test]
fn save_inserts_then_updates() -> Result<()> {
    let db = schema()?;
    let mut player = arthur();
    player.save(&db)?;
    let id = player.id;
    player.score = 10;
    player.save(&db)?;
    assert_eq!(player.id, id);
    assert_eq!(Player::count(&db)?, 1);
    let score = db.fetch_value::<i64>("SELECT score FROM player", ())?;
    assert_eq!(score, Some(10));
    Ok(())
}

#[test]
fn ad_hoc_projections_compose_over_records() -> Result<()> {
    let db = schema()?;
    for (name, score) in [("Arthur", 30_i64), ("Barbara", 50), ("Craig", 40)] {
        let mut player = Player {
            id: None,
            name: name.into(),
            score,
        };
        player.insert(&db)?;
    }
    let ranked: Vec<RankedPlayer> = db.fetch_all(
        "SELECT player.*, RANK() OVER (ORDER BY score DESC) AS rank, 'ignored' AS extra
         FROM player ORDER BY rank",
        (),
    )?;
    let summary: Vec<(&str, i64)> = ranked
        .iter()
        .map(|ranked| (ranked.player.name.as_str(), ranked.rank))
        .collect();
    assert_eq!(summary, [("Barbara", 1), ("Craig", 2), ("Arthur", 3)]);
    assert!(ranked.iter().all(|ranked| ranked.player.id.is_some()));
    Ok(())
}

#[test]
fn records_work_through_a_queue() -> Result<()> {
    let queue = DatabaseQueue::in_memory(Configuration::default())?;
    queue.write(|db| {
        db.execute_batch(
            "CREATE TABLE player (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score INTEGER NOT NULL)",
        )
    })?;
    let saved = queue.write(|db| {
        let mut player = arthur();
        player.insert(db)?;
        Ok(player)
    })?;
    let all = queue.read(|db| Player::fetch_all_records(db))?;
    assert_eq!(all, [saved]);
    Ok(())
}
