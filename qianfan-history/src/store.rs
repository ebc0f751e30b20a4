//! `SQLite`-backed turn log.
//!
//! Database path: `{data_dir}/turns.db`
//!
//! The store is append-only; retention and cleanup are left to the operator.

use crate::types::{NewTurn, Turn};
use qianfan_client::Role;
use qianfan_common::{Error, Result};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;

/// `SQLite` turn store for conversation persistence.
pub struct TurnStore {
    conn: Mutex<Connection>,
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

fn map_turn(row: &Row<'_>) -> rusqlite::Result<Turn> {
    Ok(Turn {
        id: row.get(0)?,
        user_id: row.get(1)?,
        command: row.get(2)?,
        is_session_start: row.get(3)?,
        role: Role::parse(&row.get::<_, String>(4)?),
        content: row.get(5)?,
        tokens: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const TURN_COLUMNS: &str = "id, user_id, command, is_session_start, role, content, tokens, created_at";

impl TurnStore {
    /// Create a new turn store at the given database path.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path).map_err(store_err)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize database schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS turns (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          TEXT NOT NULL,
                command          TEXT NOT NULL,
                is_session_start INTEGER NOT NULL,
                role             TEXT NOT NULL,
                content          TEXT NOT NULL,
                tokens           INTEGER NOT NULL,
                created_at       INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_turns_scope ON turns(user_id, command, id);
            CREATE INDEX IF NOT EXISTS idx_turns_freshness ON turns(user_id, command, created_at);",
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Append a turn, returning its assigned id.
    pub fn insert(&self, turn: &NewTurn) -> Result<i64> {
        let conn = self.conn.lock().map_err(store_err)?;

        conn.execute(
            "INSERT INTO turns (user_id, command, is_session_start, role, content, tokens, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                turn.user_id,
                turn.command,
                turn.is_session_start,
                turn.role.as_str(),
                turn.content,
                turn.tokens,
                turn.created_at
            ],
        )
        .map_err(store_err)?;

        Ok(conn.last_insert_rowid())
    }

    /// The most recent turn for the scope with `created_at >= min_created_at`.
    pub fn latest_since(
        &self,
        user_id: &str,
        command: &str,
        min_created_at: i64,
    ) -> Result<Option<Turn>> {
        let conn = self.conn.lock().map_err(store_err)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TURN_COLUMNS} FROM turns
                 WHERE user_id = ?1 AND command = ?2 AND created_at >= ?3
                 ORDER BY id DESC
                 LIMIT 1"
            ))
            .map_err(store_err)?;

        stmt.query_row(params![user_id, command, min_created_at], map_turn)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_err(other)),
            })
    }

    /// The most recent session-start turn for the scope.
    pub fn latest_session_start(&self, user_id: &str, command: &str) -> Result<Option<Turn>> {
        let conn = self.conn.lock().map_err(store_err)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TURN_COLUMNS} FROM turns
                 WHERE user_id = ?1 AND command = ?2 AND is_session_start = 1
                 ORDER BY id DESC
                 LIMIT 1"
            ))
            .map_err(store_err)?;

        stmt.query_row(params![user_id, command], map_turn)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_err(other)),
            })
    }

    /// The most recent `limit` turns with `id >= start_id` for the scope,
    /// returned in ascending chronological order (oldest truncated first).
    pub fn tail_from(
        &self,
        user_id: &str,
        command: &str,
        start_id: i64,
        limit: usize,
    ) -> Result<Vec<Turn>> {
        let conn = self.conn.lock().map_err(store_err)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TURN_COLUMNS} FROM turns
                 WHERE user_id = ?1 AND command = ?2 AND id >= ?3
                 ORDER BY id DESC
                 LIMIT ?4"
            ))
            .map_err(store_err)?;

        let rows = stmt
            .query_map(params![user_id, command, start_id, limit as i64], map_turn)
            .map_err(store_err)?;

        let mut turns = Vec::new();
        for row in rows {
            turns.push(row.map_err(store_err)?);
        }
        turns.reverse();
        Ok(turns)
    }

    /// Number of turns recorded for the scope.
    pub fn count(&self, user_id: &str, command: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(store_err)?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM turns WHERE user_id = ?1 AND command = ?2",
                params![user_id, command],
                |row| row.get(0),
            )
            .map_err(store_err)?;

        Ok(count as usize)
    }

    /// Health check: verify database is accessible.
    pub fn health_check(&self) -> bool {
        self.conn
            .lock()
            .map(|c| c.execute_batch("SELECT 1").is_ok())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, TurnStore) {
        let tmp = TempDir::new().unwrap();
        let store = TurnStore::new(&tmp.path().join("turns.db")).unwrap();
        (tmp, store)
    }

    fn turn(user_id: &str, role: Role, content: &str, start: bool, at: i64) -> NewTurn {
        NewTurn {
            user_id: user_id.into(),
            command: "chat".into(),
            is_session_start: start,
            role,
            content: content.into(),
            tokens: 3,
            created_at: at,
        }
    }

    #[test]
    fn test_health_check() {
        let (_tmp, store) = temp_store();
        assert!(store.health_check());
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let (_tmp, store) = temp_store();

        let first = store.insert(&turn("u1", Role::User, "hello", true, 100)).unwrap();
        let second = store
            .insert(&turn("u1", Role::Assistant, "hi there", false, 100))
            .unwrap();

        assert!(second > first);
        assert_eq!(store.count("u1", "chat").unwrap(), 2);
    }

    #[test]
    fn test_scope_isolation() {
        let (_tmp, store) = temp_store();

        store.insert(&turn("u1", Role::User, "mine", true, 100)).unwrap();
        store.insert(&turn("u2", Role::User, "theirs", true, 100)).unwrap();

        let latest = store.latest_since("u1", "chat", 0).unwrap().unwrap();
        assert_eq!(latest.content, "mine");
        assert_eq!(store.count("u2", "chat").unwrap(), 1);
        assert!(store.latest_since("u1", "draw", 0).unwrap().is_none());
    }

    #[test]
    fn test_latest_since_respects_threshold() {
        let (_tmp, store) = temp_store();

        store.insert(&turn("u1", Role::User, "old", true, 100)).unwrap();
        store.insert(&turn("u1", Role::Assistant, "old reply", false, 100)).unwrap();

        assert!(store.latest_since("u1", "chat", 101).unwrap().is_none());
        let latest = store.latest_since("u1", "chat", 100).unwrap().unwrap();
        assert_eq!(latest.role, Role::Assistant);
        assert_eq!(latest.content, "old reply");
    }

    #[test]
    fn test_latest_session_start_skips_non_start_turns() {
        let (_tmp, store) = temp_store();

        store.insert(&turn("u1", Role::User, "first", true, 100)).unwrap();
        store.insert(&turn("u1", Role::Assistant, "reply", false, 100)).unwrap();
        store.insert(&turn("u1", Role::User, "second", false, 110)).unwrap();

        let start = store.latest_session_start("u1", "chat").unwrap().unwrap();
        assert_eq!(start.content, "first");
        assert!(start.is_session_start);
    }

    #[test]
    fn test_latest_session_start_picks_newest_marker() {
        let (_tmp, store) = temp_store();

        store.insert(&turn("u1", Role::User, "session one", true, 100)).unwrap();
        store.insert(&turn("u1", Role::User, "session two", true, 200)).unwrap();

        let start = store.latest_session_start("u1", "chat").unwrap().unwrap();
        assert_eq!(start.content, "session two");
    }

    #[test]
    fn test_tail_from_truncates_oldest_first() {
        let (_tmp, store) = temp_store();

        let start_id = store.insert(&turn("u1", Role::User, "m0", true, 100)).unwrap();
        for i in 1..5 {
            store
                .insert(&turn("u1", Role::User, &format!("m{i}"), false, 100 + i))
                .unwrap();
        }

        let tail = store.tail_from("u1", "chat", start_id, 2).unwrap();
        assert_eq!(tail.len(), 2);
        // the two most recent rows, back in chronological order
        assert_eq!(tail[0].content, "m3");
        assert_eq!(tail[1].content, "m4");
        assert!(tail[0].id < tail[1].id);
    }

    #[test]
    fn test_tail_from_excludes_rows_before_start() {
        let (_tmp, store) = temp_store();

        store.insert(&turn("u1", Role::User, "stale", true, 50)).unwrap();
        let start_id = store.insert(&turn("u1", Role::User, "fresh", true, 100)).unwrap();
        store.insert(&turn("u1", Role::Assistant, "reply", false, 101)).unwrap();

        let tail = store.tail_from("u1", "chat", start_id, 10).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].content, "fresh");
    }

    #[test]
    fn test_tail_from_zero_limit() {
        let (_tmp, store) = temp_store();
        let start_id = store.insert(&turn("u1", Role::User, "m0", true, 100)).unwrap();
        assert!(store.tail_from("u1", "chat", start_id, 0).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip_fields() {
        let (_tmp, store) = temp_store();

        let mut new_turn = turn("u1", Role::Assistant, "回复内容", false, 12345);
        new_turn.tokens = 42;
        let id = store.insert(&new_turn).unwrap();

        let fetched = store.latest_since("u1", "chat", 0).unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.role, Role::Assistant);
        assert_eq!(fetched.content, "回复内容");
        assert_eq!(fetched.tokens, 42);
        assert_eq!(fetched.created_at, 12345);
        assert!(!fetched.is_session_start);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("turns.db");

        {
            let store = TurnStore::new(&db_path).unwrap();
            store.insert(&turn("u1", Role::User, "persistent", true, 100)).unwrap();
        }

        {
            let store = TurnStore::new(&db_path).unwrap();
            assert_eq!(store.count("u1", "chat").unwrap(), 1);
        }
    }
}
