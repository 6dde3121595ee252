use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::scheduler::{self, Rating, SchedulerParams};
use crate::storage::stats::DATE_FORMAT;
use crate::storage::{
    Database, DailyStats, Flashcard, FlashcardStore, ReviewStore, SearchFilter, StatsStore,
};

pub const DEFAULT_NEW_CARDS_LIMIT: usize = 20;

/// How many days of history the streak scan covers.
const STREAK_WINDOW_DAYS: u64 = 365;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No cards to study")]
    EmptySession,

    #[error("No cards due for review today")]
    NothingDue,

    #[error("No new cards available")]
    NoNewCards,

    #[error("No cards found with the specified criteria")]
    NoMatches,

    #[error("No active study session")]
    NoActiveSession,

    #[error("No current card")]
    NoCurrentCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

/// One study run. Lives only in memory; a process exit discards it.
#[derive(Debug, Clone)]
pub struct StudySession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cards: Vec<Flashcard>,
    pub cursor: usize,
    pub reviewed: usize,
    pub correct: usize,
    pub wrong: usize,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: u32,
    pub reviewed: usize,
    pub correct: usize,
    pub wrong: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionStats {
    pub duration_ms: i64,
    pub reviewed: usize,
    pub correct: usize,
    pub wrong: usize,
    /// Percentage of reviewed answers rated Good or Easy.
    pub accuracy: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

/// Result of one answered card.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub card: Flashcard,
    pub completed: bool,
}

/// Drives study sessions against a database: selects cards, applies the
/// scheduler on each answer, and writes cards, review records, and daily
/// statistics back. Holds at most one session; constructed explicitly
/// rather than living as a global.
pub struct SessionManager<'a> {
    db: &'a Database,
    params: SchedulerParams,
    current: Option<StudySession>,
}

impl<'a> SessionManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_params(db, SchedulerParams::default())
    }

    pub fn with_params(db: &'a Database, params: SchedulerParams) -> Self {
        Self {
            db,
            params,
            current: None,
        }
    }

    /// Start a session over an explicit card list. Replaces any session
    /// already in progress.
    pub fn create_session(&mut self, cards: Vec<Flashcard>) -> Result<&StudySession> {
        if cards.is_empty() {
            return Err(SessionError::EmptySession.into());
        }

        let session = StudySession {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            ended_at: None,
            cards,
            cursor: 0,
            reviewed: 0,
            correct: 0,
            wrong: 0,
            status: SessionStatus::Active,
        };

        Ok(self.current.insert(session))
    }

    /// All cards due right now, most overdue first.
    pub fn create_today_review_session(&mut self) -> Result<&StudySession> {
        let due = FlashcardStore::new(self.db).due_cards(Utc::now())?;
        if due.is_empty() {
            return Err(SessionError::NothingDue.into());
        }
        self.create_session(due)
    }

    /// Up to `limit` never-reviewed cards.
    pub fn create_new_cards_session(&mut self, limit: usize) -> Result<&StudySession> {
        let cards = FlashcardStore::new(self.db).new_cards(limit)?;
        if cards.is_empty() {
            return Err(SessionError::NoNewCards.into());
        }
        self.create_session(cards)
    }

    /// Cards matching a group/tag filter, truncated to `limit`.
    pub fn create_custom_session(
        &mut self,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<&StudySession> {
        let mut cards = FlashcardStore::new(self.db).search(filter)?;
        if let Some(limit) = limit {
            cards.truncate(limit);
        }
        if cards.is_empty() {
            return Err(SessionError::NoMatches.into());
        }
        self.create_session(cards)
    }

    pub fn current_session(&self) -> Option<&StudySession> {
        self.current.as_ref()
    }

    /// The card at the session cursor, or None without an active session.
    pub fn current_card(&self) -> Option<&Flashcard> {
        self.current
            .as_ref()
            .and_then(|s| s.cards.get(s.cursor))
    }

    /// Apply one answer: run the scheduler, persist the updated card, the
    /// review record, and today's statistics in a single transaction, then
    /// advance the session. Completing the last card discards the session.
    pub fn submit_answer(&mut self, rating: Rating, response_ms: i64) -> Result<AnswerOutcome> {
        let session = match self.current.as_ref() {
            Some(s) if s.status == SessionStatus::Active => s,
            _ => return Err(SessionError::NoActiveSession.into()),
        };
        let card = session
            .cards
            .get(session.cursor)
            .ok_or(SessionError::NoCurrentCard)?;

        let now = Utc::now();
        let was_new = card.state.is_new();
        let (new_state, outcome) = scheduler::review(&card.state, rating, now, &self.params);

        let is_correct = rating.is_correct();
        let total_reviews = card.total_reviews + 1;
        let total_time = card.avg_response_ms * card.total_reviews as f64 + response_ms as f64;

        let mut updated = card.clone();
        updated.proficiency = scheduler::proficiency(&new_state);
        updated.state = new_state;
        updated.total_reviews = total_reviews;
        updated.correct_count = card.correct_count + if is_correct { 1 } else { 0 };
        updated.wrong_count = card.wrong_count + if is_correct { 0 } else { 1 };
        updated.avg_response_ms = total_time / total_reviews as f64;

        // Card update, review record, and daily stats land atomically.
        let tx = self.db.conn.unchecked_transaction()?;
        let updated = FlashcardStore::new(self.db).update(&updated)?;
        ReviewStore::new(self.db).append(
            &updated.id,
            &outcome,
            updated.state.reps,
            updated.state.lapses,
            response_ms,
        )?;
        self.record_daily(is_correct, response_ms, was_new, now)?;
        tx.commit()?;

        let Some(session) = self.current.as_mut() else {
            return Err(SessionError::NoActiveSession.into());
        };
        session.reviewed += 1;
        if is_correct {
            session.correct += 1;
        } else {
            session.wrong += 1;
        }
        session.cursor += 1;

        let completed = session.cursor >= session.cards.len();
        if completed {
            session.status = SessionStatus::Completed;
            session.ended_at = Some(Utc::now());
            self.current = None;
        }

        Ok(AnswerOutcome {
            card: updated,
            completed,
        })
    }

    /// Advance past the current card without touching scheduler or store.
    /// Returns true when the session completed.
    pub fn skip_card(&mut self) -> Result<bool> {
        let session = match self.current.as_mut() {
            Some(s) if s.status == SessionStatus::Active => s,
            _ => return Err(SessionError::NoActiveSession.into()),
        };

        session.cursor += 1;
        let completed = session.cursor >= session.cards.len();
        if completed {
            session.status = SessionStatus::Completed;
            session.ended_at = Some(Utc::now());
            self.current = None;
        }
        Ok(completed)
    }

    pub fn pause_session(&mut self) -> Result<()> {
        match self.current.as_mut() {
            Some(s) => {
                s.status = SessionStatus::Paused;
                Ok(())
            }
            None => Err(SessionError::NoActiveSession.into()),
        }
    }

    pub fn resume_session(&mut self) -> Result<()> {
        match self.current.as_mut() {
            Some(s) => {
                s.status = SessionStatus::Active;
                Ok(())
            }
            None => Err(SessionError::NoActiveSession.into()),
        }
    }

    /// Drop the in-memory session unconditionally.
    pub fn cancel_session(&mut self) {
        self.current = None;
    }

    pub fn progress(&self) -> Option<Progress> {
        let s = self.current.as_ref()?;
        let total = s.cards.len();
        Some(Progress {
            current: (s.cursor + 1).min(total),
            total,
            percentage: ((s.cursor as f64 / total as f64) * 100.0).round() as u32,
            reviewed: s.reviewed,
            correct: s.correct,
            wrong: s.wrong,
        })
    }

    pub fn session_stats(&self) -> Option<SessionStats> {
        let s = self.current.as_ref()?;
        let accuracy = if s.reviewed > 0 {
            ((s.correct as f64 / s.reviewed as f64) * 100.0).round() as u32
        } else {
            0
        };
        Some(SessionStats {
            duration_ms: (Utc::now() - s.started_at).num_milliseconds(),
            reviewed: s.reviewed,
            correct: s.correct,
            wrong: s.wrong,
            accuracy,
        })
    }

    /// Consecutive study days. Current streak walks back from today and
    /// breaks at the first day without reviews; longest is the best run
    /// inside the 365-day window.
    pub fn streak(&self) -> Result<Streak> {
        let today = Utc::now().date_naive();
        streak_from(self.db, today)
    }

    pub fn today_stats(&self) -> Result<Option<DailyStats>> {
        let today = Utc::now().format(DATE_FORMAT).to_string();
        StatsStore::new(self.db).get(&today)
    }

    /// Daily rows for the trailing `days` window, ascending.
    pub fn recent_stats(&self, days: u64) -> Result<Vec<DailyStats>> {
        let today = Utc::now().date_naive();
        let start = today - Days::new(days.saturating_sub(1));
        StatsStore::new(self.db).range(
            &start.format(DATE_FORMAT).to_string(),
            &today.format(DATE_FORMAT).to_string(),
        )
    }

    fn record_daily(
        &self,
        is_correct: bool,
        response_ms: i64,
        was_new: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let store = StatsStore::new(self.db);
        let date = now.format(DATE_FORMAT).to_string();

        let mut stats = store
            .get(&date)?
            .unwrap_or_else(|| DailyStats::empty(&date));
        stats.record_answer(is_correct, response_ms, was_new);
        store.save(&stats)
    }
}

fn streak_from(db: &Database, today: NaiveDate) -> Result<Streak> {
    let start = today - Days::new(STREAK_WINDOW_DAYS - 1);
    let rows = StatsStore::new(db).range(
        &start.format(DATE_FORMAT).to_string(),
        &today.format(DATE_FORMAT).to_string(),
    )?;

    let active: HashSet<NaiveDate> = rows
        .iter()
        .filter(|s| s.reviewed_cards > 0)
        .filter_map(|s| NaiveDate::parse_from_str(&s.date, DATE_FORMAT).ok())
        .collect();

    let mut current = 0u32;
    for i in 0..STREAK_WINDOW_DAYS {
        let day = today - Days::new(i);
        if active.contains(&day) {
            current += 1;
        } else {
            break;
        }
    }

    let mut longest = 0u32;
    let mut run = 0u32;
    for i in 0..STREAK_WINDOW_DAYS {
        let day = start + Days::new(i);
        if active.contains(&day) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    Ok(Streak { current, longest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewFlashcard;
    use std::path::PathBuf;

    fn test_db(name: &str) -> Database {
        let path = PathBuf::from(format!(
            "/tmp/lexideck_session_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Database::open_at_path(path).unwrap()
    }

    fn seed_card(db: &Database, word: &str) -> Flashcard {
        FlashcardStore::new(db)
            .create(NewFlashcard {
                word: word.to_string(),
                translation: format!("{}-translated", word),
                source_lang: "en".to_string(),
                target_lang: "es".to_string(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn empty_session_is_rejected() {
        let db = test_db("empty");
        let mut manager = SessionManager::new(&db);

        let err = manager.create_session(Vec::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::EmptySession)
        ));

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn three_card_session_runs_to_completion() {
        let db = test_db("three");
        for w in ["alpha", "beta", "gamma"] {
            seed_card(&db, w);
        }

        let mut manager = SessionManager::new(&db);
        manager.create_today_review_session().unwrap();

        manager.submit_answer(Rating::Good, 1500).unwrap();
        manager.submit_answer(Rating::Again, 4000).unwrap();

        let stats = manager.session_stats().unwrap();
        assert_eq!(stats.reviewed, 2);
        assert_eq!(stats.correct, 1);
        assert_eq!(stats.wrong, 1);
        assert_eq!(stats.accuracy, 50);

        let outcome = manager.submit_answer(Rating::Easy, 900).unwrap();
        assert!(outcome.completed);
        assert!(manager.current_card().is_none());
        assert!(manager.session_stats().is_none());

        // Counter invariant holds on every stored card.
        for card in FlashcardStore::new(&db).get_all().unwrap() {
            assert_eq!(card.correct_count + card.wrong_count, card.total_reviews);
        }

        // One review record per answer.
        assert_eq!(ReviewStore::new(&db).count().unwrap(), 3);

        // Daily stats reflect the whole session.
        let today = Utc::now().format(DATE_FORMAT).to_string();
        let daily = StatsStore::new(&db).get(&today).unwrap().unwrap();
        assert_eq!(daily.reviewed_cards, 3);
        assert_eq!(daily.correct_count, 2);
        assert_eq!(daily.wrong_count, 1);
        assert_eq!(daily.new_cards, 3);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn answer_pushes_next_review_forward() {
        let db = test_db("forward");
        let card = seed_card(&db, "delta");
        let before = card.next_review();

        let mut manager = SessionManager::new(&db);
        manager.create_session(vec![card]).unwrap();
        let outcome = manager.submit_answer(Rating::Good, 1000).unwrap();

        assert!(outcome.card.next_review() > before);
        assert_eq!(outcome.card.total_reviews, 1);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn skip_advances_without_writes() {
        let db = test_db("skip");
        let a = seed_card(&db, "one");
        let b = seed_card(&db, "two");

        let mut manager = SessionManager::new(&db);
        manager.create_session(vec![a.clone(), b]).unwrap();

        assert!(!manager.skip_card().unwrap());
        assert_eq!(manager.current_card().unwrap().word, "two");
        assert!(manager.skip_card().unwrap());
        assert!(manager.current_card().is_none());

        // No review records were produced.
        assert_eq!(ReviewStore::new(&db).count().unwrap(), 0);
        let stored = FlashcardStore::new(&db).get(&a.id).unwrap().unwrap();
        assert_eq!(stored.total_reviews, 0);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn paused_session_rejects_answers() {
        let db = test_db("pause");
        let card = seed_card(&db, "epsilon");

        let mut manager = SessionManager::new(&db);
        manager.create_session(vec![card]).unwrap();
        manager.pause_session().unwrap();

        let err = manager.submit_answer(Rating::Good, 100).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::NoActiveSession)
        ));

        manager.resume_session().unwrap();
        assert!(manager.submit_answer(Rating::Good, 100).is_ok());

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn cancel_discards_session() {
        let db = test_db("cancel");
        let card = seed_card(&db, "zeta");

        let mut manager = SessionManager::new(&db);
        manager.create_session(vec![card]).unwrap();
        manager.cancel_session();

        assert!(manager.current_session().is_none());
        assert!(manager.progress().is_none());

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn streak_counts_today_and_yesterday() {
        let db = test_db("streak");
        let store = StatsStore::new(&db);
        let today = Utc::now().date_naive();

        for day in [today, today - Days::new(1)] {
            let mut stats = DailyStats::empty(&day.format(DATE_FORMAT).to_string());
            stats.record_answer(true, 1000, false);
            store.save(&stats).unwrap();
        }

        let streak = streak_from(&db, today).unwrap();
        assert_eq!(streak.current, 2);
        assert_eq!(streak.longest, 2);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn streak_breaks_at_first_gap() {
        let db = test_db("gap");
        let store = StatsStore::new(&db);
        let today = Utc::now().date_naive();

        // Today plus a three-day run separated by a gap.
        for offset in [0u64, 2, 3, 4] {
            let day = today - Days::new(offset);
            let mut stats = DailyStats::empty(&day.format(DATE_FORMAT).to_string());
            stats.record_answer(true, 1000, false);
            store.save(&stats).unwrap();
        }

        let streak = streak_from(&db, today).unwrap();
        assert_eq!(streak.current, 1);
        assert_eq!(streak.longest, 3);

        let _ = std::fs::remove_file(db.path.as_path());
    }
}
