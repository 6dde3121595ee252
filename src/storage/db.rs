use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;

use crate::config::Config;
use crate::storage::GroupStore;

pub struct Database {
    pub conn: Connection,
    pub path: PathBuf,
}

/// Row counts and on-disk size, for quota visibility.
#[derive(Debug, Clone)]
pub struct StorageUsage {
    pub file_bytes: u64,
    pub flashcards: i64,
    pub groups: i64,
    pub review_records: i64,
    pub daily_stats: i64,
}

impl Database {
    /// Open or create the flashcard database in the data directory.
    pub fn open() -> Result<Self> {
        Self::open_at_path(Self::default_db_path()?)
    }

    /// Open or create a database at a specific path.
    pub fn open_at_path(path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;

        let db = Self { conn, path };
        db.init_schema()?;

        // The default group must exist before any card can reference it.
        GroupStore::new(&db).ensure_default()?;

        Ok(db)
    }

    fn default_db_path() -> Result<PathBuf> {
        Ok(Config::data_dir()?.join("flashcards.db"))
    }

    /// Report row counts and database file size.
    pub fn usage(&self) -> Result<StorageUsage> {
        let count = |table: &str| -> Result<i64> {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
        };

        let file_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(StorageUsage {
            file_bytes,
            flashcards: count("flashcards")?,
            groups: count("groups")?,
            review_records: count("review_records")?,
            daily_stats: count("daily_stats")?,
        })
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                color TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                word TEXT NOT NULL,
                translation TEXT NOT NULL,
                source_lang TEXT NOT NULL,
                target_lang TEXT NOT NULL,
                pronunciation TEXT,
                examples TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                group_id TEXT NOT NULL DEFAULT 'default',
                favorite INTEGER NOT NULL DEFAULT 0,
                stability REAL NOT NULL,
                difficulty REAL NOT NULL,
                reps INTEGER NOT NULL,
                lapses INTEGER NOT NULL,
                last_review TEXT,
                next_review TEXT NOT NULL,
                proficiency TEXT NOT NULL,
                total_reviews INTEGER NOT NULL DEFAULT 0,
                correct_count INTEGER NOT NULL DEFAULT 0,
                wrong_count INTEGER NOT NULL DEFAULT 0,
                avg_response_ms REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute_batch(
            "
            CREATE INDEX IF NOT EXISTS idx_flashcards_group ON flashcards(group_id);
            CREATE INDEX IF NOT EXISTS idx_flashcards_next_review ON flashcards(next_review);
            ",
        )?;

        // Append-only review log. Records outlive their card on purpose so
        // historical statistics survive card deletion.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS review_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                flashcard_id TEXT NOT NULL,
                rating INTEGER NOT NULL,
                response_ms INTEGER NOT NULL,
                stability REAL NOT NULL,
                difficulty REAL NOT NULL,
                reps INTEGER NOT NULL,
                lapses INTEGER NOT NULL,
                interval_days REAL NOT NULL,
                reviewed_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute_batch(
            "
            CREATE INDEX IF NOT EXISTS idx_reviews_card ON review_records(flashcard_id);
            CREATE INDEX IF NOT EXISTS idx_reviews_at ON review_records(reviewed_at);
            ",
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_stats (
                date TEXT PRIMARY KEY,
                new_cards INTEGER NOT NULL DEFAULT 0,
                reviewed_cards INTEGER NOT NULL DEFAULT 0,
                correct_count INTEGER NOT NULL DEFAULT 0,
                wrong_count INTEGER NOT NULL DEFAULT 0,
                total_study_ms INTEGER NOT NULL DEFAULT 0,
                avg_response_ms REAL NOT NULL DEFAULT 0
            )",
            [],
        )?;

        Ok(())
    }
}
