use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::params;

use super::Database;

/// Date keys are `yyyy-MM-dd` strings, one row per calendar day.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct DailyStats {
    pub date: String,
    pub new_cards: i64,
    pub reviewed_cards: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub total_study_ms: i64,
    pub avg_response_ms: f64,
}

impl DailyStats {
    pub fn empty(date: &str) -> Self {
        Self {
            date: date.to_string(),
            new_cards: 0,
            reviewed_cards: 0,
            correct_count: 0,
            wrong_count: 0,
            total_study_ms: 0,
            avg_response_ms: 0.0,
        }
    }

    /// Fold one answered card into the day's row, keeping the average
    /// response time derived from the running total.
    pub fn record_answer(&mut self, is_correct: bool, response_ms: i64, was_new_card: bool) {
        self.reviewed_cards += 1;
        if is_correct {
            self.correct_count += 1;
        } else {
            self.wrong_count += 1;
        }
        if was_new_card {
            self.new_cards += 1;
        }
        self.total_study_ms += response_ms;
        self.avg_response_ms = self.total_study_ms as f64 / self.reviewed_cards as f64;
    }
}

pub struct StatsStore<'a> {
    db: &'a Database,
}

impl<'a> StatsStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, date: &str) -> Result<Option<DailyStats>> {
        validate_date(date)?;

        let mut stmt = self.db.conn.prepare(
            "SELECT date, new_cards, reviewed_cards, correct_count, wrong_count,
                    total_study_ms, avg_response_ms
             FROM daily_stats WHERE date = ?1",
        )?;

        let mut rows = stmt.query(params![date])?;

        if let Some(row) = rows.next()? {
            Ok(Some(Self::row_to_stats(row)?))
        } else {
            Ok(None)
        }
    }

    /// Insert or replace the row for `stats.date`.
    pub fn save(&self, stats: &DailyStats) -> Result<()> {
        validate_date(&stats.date)?;

        self.db
            .conn
            .execute(
                "INSERT INTO daily_stats (
                    date, new_cards, reviewed_cards, correct_count, wrong_count,
                    total_study_ms, avg_response_ms
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(date) DO UPDATE SET
                    new_cards = excluded.new_cards,
                    reviewed_cards = excluded.reviewed_cards,
                    correct_count = excluded.correct_count,
                    wrong_count = excluded.wrong_count,
                    total_study_ms = excluded.total_study_ms,
                    avg_response_ms = excluded.avg_response_ms",
                params![
                    stats.date,
                    stats.new_cards,
                    stats.reviewed_cards,
                    stats.correct_count,
                    stats.wrong_count,
                    stats.total_study_ms,
                    stats.avg_response_ms,
                ],
            )
            .context("Failed to save daily stats")?;

        Ok(())
    }

    /// Rows between two date keys inclusive, ascending. String comparison
    /// is correct because the keys are zero-padded `yyyy-MM-dd`.
    pub fn range(&self, start: &str, end: &str) -> Result<Vec<DailyStats>> {
        validate_date(start)?;
        validate_date(end)?;

        let mut stmt = self.db.conn.prepare(
            "SELECT date, new_cards, reviewed_cards, correct_count, wrong_count,
                    total_study_ms, avg_response_ms
             FROM daily_stats WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC",
        )?;

        let mut rows = stmt.query(params![start, end])?;
        let mut all = Vec::new();

        while let Some(row) = rows.next()? {
            all.push(Self::row_to_stats(row)?);
        }

        Ok(all)
    }

    fn row_to_stats(row: &rusqlite::Row) -> Result<DailyStats> {
        Ok(DailyStats {
            date: row.get(0)?,
            new_cards: row.get(1)?,
            reviewed_cards: row.get(2)?,
            correct_count: row.get(3)?,
            wrong_count: row.get(4)?,
            total_study_ms: row.get(5)?,
            avg_response_ms: row.get(6)?,
        })
    }
}

fn validate_date(date: &str) -> Result<()> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .with_context(|| format!("Invalid date key: {}", date))?;
    Ok(())
}
