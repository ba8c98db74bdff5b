//! Persistence of whole student records. The engine reads a record, mutates
//! it in memory and writes it back as a unit.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::models::StudentRecord;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait StudentStore: Send + Sync {
    fn load(&self, student_id: &str) -> StoreResult<Option<StudentRecord>>;
    fn save(&self, record: &StudentRecord) -> StoreResult<()>;
    /// Returns whether a record existed.
    fn delete(&self, student_id: &str) -> StoreResult<bool>;
    fn student_ids(&self) -> StoreResult<Vec<String>>;
}

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, StudentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StudentStore for MemoryStore {
    fn load(&self, student_id: &str) -> StoreResult<Option<StudentRecord>> {
        Ok(self.records.lock().get(student_id).cloned())
    }

    fn save(&self, record: &StudentRecord) -> StoreResult<()> {
        self.records
            .lock()
            .insert(record.student_id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, student_id: &str) -> StoreResult<bool> {
        Ok(self.records.lock().remove(student_id).is_some())
    }

    fn student_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.records.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// One row per student holding the record as JSON.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn init(&self) -> StoreResult<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS students (
                student_id TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }
}

impl StudentStore for SqliteStore {
    fn load(&self, student_id: &str) -> StoreResult<Option<StudentRecord>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT record FROM students WHERE student_id = ?1",
                params![student_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, record: &StudentRecord) -> StoreResult<()> {
        let json = serde_json::to_string(record)?;
        let updated_at = record.updated_at.unwrap_or_else(Utc::now).to_rfc3339();
        self.conn.lock().execute(
            r#"
            INSERT INTO students (student_id, record, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(student_id) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at
            "#,
            params![record.student_id, json, updated_at],
        )?;
        Ok(())
    }

    fn delete(&self, student_id: &str) -> StoreResult<bool> {
        let rows = self
            .conn
            .lock()
            .execute("DELETE FROM students WHERE student_id = ?1", params![student_id])?;
        Ok(rows > 0)
    }

    fn student_ids(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT student_id FROM students ORDER BY student_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyLevel, MasteryState};

    fn setup_db() -> SqliteStore {
        let store = SqliteStore::open(":memory:").expect("Failed to create in-memory database");
        store.init().expect("Failed to initialize database");
        store
    }

    fn record(student: &str, mastery: f64) -> StudentRecord {
        let mut record = StudentRecord::new(student);
        record.mastery.insert(
            "algebra".to_string(),
            MasteryState {
                topic_id: "algebra".to_string(),
                mastery,
                attempts: 1,
                correct: 1,
                difficulty: DifficultyLevel::Intermediate,
                last_update: Some(Utc::now()),
                interactions: vec![],
            },
        );
        record.updated_at = Some(Utc::now());
        record
    }

    fn exercise(store: &dyn StudentStore) {
        assert!(store.load("ada").unwrap().is_none());

        store.save(&record("ada", 0.4)).unwrap();
        store.save(&record("ada", 0.6)).unwrap();
        store.save(&record("bob", 0.2)).unwrap();

        let loaded = store.load("ada").unwrap().expect("record should exist");
        assert_eq!(loaded.mastery["algebra"].mastery, 0.6);
        assert_eq!(store.student_ids().unwrap(), vec!["ada", "bob"]);

        assert!(store.delete("ada").unwrap());
        assert!(!store.delete("ada").unwrap());
        assert!(store.load("ada").unwrap().is_none());
    }

    mod sqlite_tests {
        use super::*;

        #[test]
        fn init_is_idempotent() {
            let store = setup_db();
            store.init().expect("second init should succeed");
        }

        #[test]
        fn load_save_delete() {
            exercise(&setup_db());
        }

        #[test]
        fn round_trips_full_record() {
            let store = setup_db();
            let original = record("ada", 0.625);
            store.save(&original).unwrap();
            assert_eq!(store.load("ada").unwrap(), Some(original));
        }

        #[test]
        fn persists_across_connections() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("pathwise.db");
            {
                let store = SqliteStore::open(&path).unwrap();
                store.init().unwrap();
                store.save(&record("ada", 0.7)).unwrap();
            }
            let store = SqliteStore::open(&path).unwrap();
            store.init().unwrap();
            assert_eq!(store.load("ada").unwrap().unwrap().mastery["algebra"].mastery, 0.7);
        }

        #[test]
        fn corrupt_record_is_an_encoding_error() {
            let store = setup_db();
            store
                .conn
                .lock()
                .execute(
                    "INSERT INTO students (student_id, record) VALUES ('ada', 'not json')",
                    [],
                )
                .unwrap();
            assert!(matches!(store.load("ada"), Err(StoreError::Encoding(_))));
        }
    }

    mod memory_tests {
        use super::*;

        #[test]
        fn load_save_delete() {
            exercise(&MemoryStore::new());
        }
    }
}
