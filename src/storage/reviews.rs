use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::Database;
use crate::scheduler::{Rating, ReviewOutcome};

/// One answered card: the rating given, the response time, and a snapshot
/// of the resulting memory state. Never mutated after insertion.
#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub id: i64,
    pub flashcard_id: String,
    pub rating: Rating,
    pub response_ms: i64,
    pub stability: f64,
    pub difficulty: f64,
    pub reps: i64,
    pub lapses: i64,
    pub interval_days: f64,
    pub reviewed_at: DateTime<Utc>,
}

pub struct ReviewStore<'a> {
    db: &'a Database,
}

impl<'a> ReviewStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append one review record from a scheduling outcome.
    pub fn append(
        &self,
        flashcard_id: &str,
        outcome: &ReviewOutcome,
        reps: i64,
        lapses: i64,
        response_ms: i64,
    ) -> Result<i64> {
        self.db
            .conn
            .execute(
                "INSERT INTO review_records (
                    flashcard_id, rating, response_ms, stability, difficulty,
                    reps, lapses, interval_days, reviewed_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    flashcard_id,
                    outcome.rating as i64,
                    response_ms,
                    outcome.stability,
                    outcome.difficulty,
                    reps,
                    lapses,
                    outcome.interval_days,
                    outcome.reviewed_at.to_rfc3339(),
                ],
            )
            .context("Failed to append review record")?;

        Ok(self.db.conn.last_insert_rowid())
    }

    /// All records for one card, oldest first.
    pub fn for_card(&self, flashcard_id: &str) -> Result<Vec<ReviewRecord>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT id, flashcard_id, rating, response_ms, stability, difficulty,
                    reps, lapses, interval_days, reviewed_at
             FROM review_records WHERE flashcard_id = ?1 ORDER BY reviewed_at ASC",
        )?;

        let mut rows = stmt.query(params![flashcard_id])?;
        Self::collect(&mut rows)
    }

    /// All records at or after `since`, oldest first. Used by statistics
    /// aggregation and exposed for external sync.
    pub fn since(&self, since: DateTime<Utc>) -> Result<Vec<ReviewRecord>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT id, flashcard_id, rating, response_ms, stability, difficulty,
                    reps, lapses, interval_days, reviewed_at
             FROM review_records WHERE reviewed_at >= ?1 ORDER BY reviewed_at ASC",
        )?;

        let mut rows = stmt.query(params![since.to_rfc3339()])?;
        Self::collect(&mut rows)
    }

    pub fn count(&self) -> Result<i64> {
        let count: i64 =
            self.db
                .conn
                .query_row("SELECT COUNT(*) FROM review_records", [], |row| row.get(0))?;
        Ok(count)
    }

    fn collect(rows: &mut rusqlite::Rows) -> Result<Vec<ReviewRecord>> {
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(Self::row_to_record(row)?);
        }
        Ok(records)
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<ReviewRecord> {
        let rating_val: i64 = row.get(2)?;
        let reviewed_str: String = row.get(9)?;

        Ok(ReviewRecord {
            id: row.get(0)?,
            flashcard_id: row.get(1)?,
            rating: Rating::from_value(rating_val)
                .ok_or_else(|| anyhow::anyhow!("Invalid rating value: {}", rating_val))?,
            response_ms: row.get(3)?,
            stability: row.get(4)?,
            difficulty: row.get(5)?,
            reps: row.get(6)?,
            lapses: row.get(7)?,
            interval_days: row.get(8)?,
            reviewed_at: DateTime::parse_from_rfc3339(&reviewed_str)
                .context("Invalid reviewed_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_db(name: &str) -> Database {
        let path = PathBuf::from(format!(
            "/tmp/lexideck_reviews_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Database::open_at_path(path).unwrap()
    }

    fn outcome(rating: Rating, at: DateTime<Utc>) -> ReviewOutcome {
        ReviewOutcome {
            rating,
            stability: 2.4,
            difficulty: 0.5,
            interval_days: 2.0,
            reviewed_at: at,
        }
    }

    #[test]
    fn appended_records_come_back_in_order() {
        let db = test_db("order");
        let store = ReviewStore::new(&db);
        let t0 = Utc::now();

        store
            .append("card-1", &outcome(Rating::Good, t0), 1, 0, 1200)
            .unwrap();
        store
            .append(
                "card-1",
                &outcome(Rating::Again, t0 + chrono::Duration::seconds(30)),
                2,
                1,
                4000,
            )
            .unwrap();
        store
            .append("card-2", &outcome(Rating::Easy, t0), 1, 0, 800)
            .unwrap();

        let history = store.for_card("card-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].rating, Rating::Good);
        assert_eq!(history[1].rating, Rating::Again);
        assert_eq!(history[1].lapses, 1);

        assert_eq!(store.count().unwrap(), 3);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn since_filters_by_timestamp() {
        let db = test_db("since");
        let store = ReviewStore::new(&db);
        let t0 = Utc::now();

        store
            .append("card-1", &outcome(Rating::Good, t0), 1, 0, 1000)
            .unwrap();
        store
            .append(
                "card-1",
                &outcome(Rating::Good, t0 + chrono::Duration::minutes(10)),
                2,
                0,
                900,
            )
            .unwrap();

        let recent = store.since(t0 + chrono::Duration::minutes(5)).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].reps, 2);

        let _ = std::fs::remove_file(db.path.as_path());
    }
}
