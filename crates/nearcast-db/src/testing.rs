use std::ops::Deref;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Database;

/// Database on a throwaway file, removed (with its WAL files) on drop.
pub struct TestDb {
    db: Option<Database>,
    path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("nearcast_test_{}.db", Uuid::new_v4()));
        let db = Database::open(&path).unwrap();
        Self { db: Some(db), path }
    }
}

impl Deref for TestDb {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db.as_ref().unwrap()
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        // Close connections before unlinking.
        self.db.take();
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

pub fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_800_000_000, 0).unwrap()
}
