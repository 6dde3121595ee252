use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use super::{DEFAULT_GROUP_ID, Database, GroupStore, StoreError};
use crate::scheduler::{self, MemoryState, Proficiency};
use crate::translate::Translation;

/// Per-card ceiling on user-supplied text, mirroring the small per-item
/// limits of the storage substrate.
pub const MAX_CARD_BYTES: usize = 32 * 1024;

#[derive(Debug, Clone)]
pub struct Flashcard {
    pub id: String,
    pub word: String,
    pub translation: String,
    pub source_lang: String,
    pub target_lang: String,
    pub pronunciation: Option<String>,
    pub examples: Vec<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub group_id: String,
    pub favorite: bool,
    /// Scheduling state owned by the scheduler module; the store persists
    /// it but never mutates its internals.
    pub state: MemoryState,
    pub proficiency: Proficiency,
    pub total_reviews: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub avg_response_ms: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flashcard {
    pub fn next_review(&self) -> DateTime<Utc> {
        self.state.due
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state.due <= now
    }
}

/// Fields supplied when creating a card.
#[derive(Debug, Clone, Default)]
pub struct NewFlashcard {
    pub word: String,
    pub translation: String,
    pub source_lang: String,
    pub target_lang: String,
    pub pronunciation: Option<String>,
    pub examples: Vec<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub group_id: Option<String>,
}

/// Filter for `search`. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub group_id: Option<String>,
    pub tags: Vec<String>,
    pub query: Option<String>,
}

pub struct FlashcardStore<'a> {
    db: &'a Database,
}

impl<'a> FlashcardStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a card with a fresh id and an unreviewed memory state.
    pub fn create(&self, fields: NewFlashcard) -> Result<Flashcard> {
        let word = fields.word.trim().to_string();
        let translation = fields.translation.trim().to_string();

        if word.is_empty() {
            return Err(StoreError::Validation("Word cannot be empty".into()).into());
        }
        if translation.is_empty() {
            return Err(StoreError::Validation("Translation cannot be empty".into()).into());
        }

        let size = card_size(&fields);
        if size > MAX_CARD_BYTES {
            return Err(StoreError::QuotaExceeded {
                size,
                limit: MAX_CARD_BYTES,
            }
            .into());
        }

        let group_id = fields
            .group_id
            .clone()
            .unwrap_or_else(|| DEFAULT_GROUP_ID.to_string());
        if !GroupStore::new(self.db).exists(&group_id)? {
            return Err(StoreError::GroupNotFound(group_id).into());
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let state = MemoryState::new(now);
        let now_str = now.to_rfc3339();

        self.db
            .conn
            .execute(
                "INSERT INTO flashcards (
                    id, word, translation, source_lang, target_lang,
                    pronunciation, examples, notes, tags, group_id, favorite,
                    stability, difficulty, reps, lapses, last_review, next_review,
                    proficiency, total_reviews, correct_count, wrong_count,
                    avg_response_ms, created_at, updated_at
                 ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0,
                    ?11, ?12, 0, 0, NULL, ?13, ?14, 0, 0, 0, 0, ?15, ?16
                 )",
                params![
                    id,
                    word,
                    translation,
                    fields.source_lang,
                    fields.target_lang,
                    fields.pronunciation,
                    serde_json::to_string(&fields.examples)?,
                    fields.notes,
                    serde_json::to_string(&fields.tags)?,
                    group_id,
                    state.stability,
                    state.difficulty,
                    state.due.to_rfc3339(),
                    Proficiency::New.as_str(),
                    now_str,
                    now_str,
                ],
            )
            .context("Failed to insert flashcard")?;

        self.get(&id)?
            .ok_or_else(|| StoreError::CardNotFound(id).into())
    }

    /// Map a translation result into a new card. Fails with a duplicate
    /// error if an equivalent (word, source, target) card already exists.
    pub fn create_from_translation(
        &self,
        translation: &Translation,
        group_id: Option<&str>,
    ) -> Result<Flashcard> {
        if self.exists(
            &translation.text,
            &translation.source_lang,
            &translation.target_lang,
        )? {
            return Err(StoreError::Duplicate {
                word: translation.text.trim().to_string(),
                source_lang: translation.source_lang.clone(),
                target_lang: translation.target_lang.clone(),
            }
            .into());
        }

        self.create(NewFlashcard {
            word: translation.text.clone(),
            translation: translation.translation.clone(),
            source_lang: translation.source_lang.clone(),
            target_lang: translation.target_lang.clone(),
            pronunciation: translation.pronunciation.clone(),
            examples: translation.examples.clone(),
            notes: None,
            tags: Vec::new(),
            group_id: group_id.map(|g| g.to_string()),
        })
    }

    /// Case- and whitespace-insensitive existence check on
    /// (word, source language, target language).
    pub fn exists(&self, word: &str, source_lang: &str, target_lang: &str) -> Result<bool> {
        let normalized = word.trim().to_lowercase();
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM flashcards
             WHERE LOWER(TRIM(word)) = ?1 AND source_lang = ?2 AND target_lang = ?3",
            params![normalized, source_lang, target_lang],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<Flashcard>> {
        let mut stmt = self
            .db
            .conn
            .prepare(&format!("{} WHERE id = ?1", SELECT_CARD))?;
        let mut rows = stmt.query(params![id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(row_to_card(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_all(&self) -> Result<Vec<Flashcard>> {
        let mut stmt = self
            .db
            .conn
            .prepare(&format!("{} ORDER BY created_at DESC", SELECT_CARD))?;
        let mut rows = stmt.query([])?;
        collect_cards(&mut rows)
    }

    /// Full replace of a card's mutable fields; bumps `updated_at`.
    pub fn update(&self, card: &Flashcard) -> Result<Flashcard> {
        if card.correct_count + card.wrong_count != card.total_reviews {
            return Err(StoreError::Validation(format!(
                "Inconsistent review counters for card {}: {} + {} != {}",
                card.id, card.correct_count, card.wrong_count, card.total_reviews
            ))
            .into());
        }

        let size = card_size(&NewFlashcard {
            word: card.word.clone(),
            translation: card.translation.clone(),
            source_lang: card.source_lang.clone(),
            target_lang: card.target_lang.clone(),
            pronunciation: card.pronunciation.clone(),
            examples: card.examples.clone(),
            notes: card.notes.clone(),
            tags: card.tags.clone(),
            group_id: None,
        });
        if size > MAX_CARD_BYTES {
            return Err(StoreError::QuotaExceeded {
                size,
                limit: MAX_CARD_BYTES,
            }
            .into());
        }

        let now = Utc::now().to_rfc3339();
        let affected = self
            .db
            .conn
            .execute(
                "UPDATE flashcards SET
                    word = ?1, translation = ?2, source_lang = ?3, target_lang = ?4,
                    pronunciation = ?5, examples = ?6, notes = ?7, tags = ?8,
                    group_id = ?9, favorite = ?10,
                    stability = ?11, difficulty = ?12, reps = ?13, lapses = ?14,
                    last_review = ?15, next_review = ?16, proficiency = ?17,
                    total_reviews = ?18, correct_count = ?19, wrong_count = ?20,
                    avg_response_ms = ?21, updated_at = ?22
                 WHERE id = ?23",
                params![
                    card.word,
                    card.translation,
                    card.source_lang,
                    card.target_lang,
                    card.pronunciation,
                    serde_json::to_string(&card.examples)?,
                    card.notes,
                    serde_json::to_string(&card.tags)?,
                    card.group_id,
                    card.favorite,
                    card.state.stability,
                    card.state.difficulty,
                    card.state.reps,
                    card.state.lapses,
                    card.state.last_review.map(|t| t.to_rfc3339()),
                    card.state.due.to_rfc3339(),
                    card.proficiency.as_str(),
                    card.total_reviews,
                    card.correct_count,
                    card.wrong_count,
                    card.avg_response_ms,
                    now,
                    card.id,
                ],
            )
            .context("Failed to update flashcard")?;

        if affected == 0 {
            return Err(StoreError::CardNotFound(card.id.clone()).into());
        }

        self.get(&card.id)?
            .ok_or_else(|| StoreError::CardNotFound(card.id.clone()).into())
    }

    /// Remove a card. Review records are kept for historical statistics.
    pub fn delete(&self, id: &str) -> Result<()> {
        let affected = self
            .db
            .conn
            .execute("DELETE FROM flashcards WHERE id = ?1", params![id])?;

        if affected == 0 {
            return Err(StoreError::CardNotFound(id.to_string()).into());
        }
        Ok(())
    }

    pub fn toggle_favorite(&self, id: &str) -> Result<Flashcard> {
        let now = Utc::now().to_rfc3339();
        let affected = self.db.conn.execute(
            "UPDATE flashcards SET favorite = NOT favorite, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;

        if affected == 0 {
            return Err(StoreError::CardNotFound(id.to_string()).into());
        }

        self.get(id)?
            .ok_or_else(|| StoreError::CardNotFound(id.to_string()).into())
    }

    /// Reassign a card to another group. Fails (leaving the card untouched)
    /// if the target group does not exist.
    pub fn move_to_group(&self, id: &str, target_group_id: &str) -> Result<Flashcard> {
        if !GroupStore::new(self.db).exists(target_group_id)? {
            return Err(StoreError::GroupNotFound(target_group_id.to_string()).into());
        }

        let now = Utc::now().to_rfc3339();
        let affected = self.db.conn.execute(
            "UPDATE flashcards SET group_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![target_group_id, now, id],
        )?;

        if affected == 0 {
            return Err(StoreError::CardNotFound(id.to_string()).into());
        }

        self.get(id)?
            .ok_or_else(|| StoreError::CardNotFound(id.to_string()).into())
    }

    /// In-memory filter over all cards. The free-text query matches
    /// case-insensitively against word, translation, or any tag.
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<Flashcard>> {
        let mut cards = self.get_all()?;

        if let Some(group_id) = &filter.group_id {
            cards.retain(|c| &c.group_id == group_id);
        }

        if !filter.tags.is_empty() {
            cards.retain(|c| filter.tags.iter().all(|t| c.tags.contains(t)));
        }

        if let Some(query) = &filter.query {
            let q = query.trim().to_lowercase();
            if !q.is_empty() {
                cards.retain(|c| {
                    c.word.to_lowercase().contains(&q)
                        || c.translation.to_lowercase().contains(&q)
                        || c.tags.iter().any(|t| t.to_lowercase().contains(&q))
                });
            }
        }

        Ok(cards)
    }

    /// All cards whose next review is at or before `now`, most overdue first.
    pub fn due_cards(&self, now: DateTime<Utc>) -> Result<Vec<Flashcard>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "{} WHERE next_review <= ?1 ORDER BY next_review ASC",
            SELECT_CARD
        ))?;
        let mut rows = stmt.query(params![now.to_rfc3339()])?;
        collect_cards(&mut rows)
    }

    /// Cards that have never been reviewed, oldest first.
    pub fn new_cards(&self, limit: usize) -> Result<Vec<Flashcard>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "{} WHERE proficiency = 'new' ORDER BY created_at ASC LIMIT ?1",
            SELECT_CARD
        ))?;
        let mut rows = stmt.query(params![limit as i64])?;
        collect_cards(&mut rows)
    }

    pub fn count(&self) -> Result<i64> {
        let count: i64 =
            self.db
                .conn
                .query_row("SELECT COUNT(*) FROM flashcards", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_due(&self, now: DateTime<Utc>) -> Result<i64> {
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM flashcards WHERE next_review <= ?1",
            params![now.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Cards touched at or after `since`; enough for an external sync
    /// routine to reconcile against a remote copy.
    pub fn modified_since(&self, since: DateTime<Utc>) -> Result<Vec<Flashcard>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "{} WHERE updated_at >= ?1 ORDER BY updated_at ASC",
            SELECT_CARD
        ))?;
        let mut rows = stmt.query(params![since.to_rfc3339()])?;
        collect_cards(&mut rows)
    }
}

const SELECT_CARD: &str = "SELECT id, word, translation, source_lang, target_lang,
    pronunciation, examples, notes, tags, group_id, favorite,
    stability, difficulty, reps, lapses, last_review, next_review,
    proficiency, total_reviews, correct_count, wrong_count,
    avg_response_ms, created_at, updated_at
 FROM flashcards";

fn card_size(fields: &NewFlashcard) -> usize {
    fields.word.len()
        + fields.translation.len()
        + fields.pronunciation.as_deref().map_or(0, str::len)
        + fields.notes.as_deref().map_or(0, str::len)
        + fields.examples.iter().map(String::len).sum::<usize>()
        + fields.tags.iter().map(String::len).sum::<usize>()
}

fn collect_cards(rows: &mut rusqlite::Rows) -> Result<Vec<Flashcard>> {
    let mut cards = Vec::new();
    while let Some(row) = rows.next()? {
        cards.push(row_to_card(row)?);
    }
    Ok(cards)
}

fn parse_ts(value: &str, field: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {} timestamp", field))?
        .with_timezone(&Utc))
}

fn row_to_card(row: &rusqlite::Row) -> Result<Flashcard> {
    let examples_json: String = row.get(6)?;
    let tags_json: String = row.get(8)?;
    let last_review: Option<String> = row.get(15)?;
    let next_review: String = row.get(16)?;
    let proficiency_str: String = row.get(17)?;
    let created_str: String = row.get(22)?;
    let updated_str: String = row.get(23)?;

    let state = MemoryState {
        stability: row.get(11)?,
        difficulty: row.get(12)?,
        reps: row.get(13)?,
        lapses: row.get(14)?,
        last_review: last_review
            .map(|t| parse_ts(&t, "last_review"))
            .transpose()?,
        due: parse_ts(&next_review, "next_review")?,
    };

    Ok(Flashcard {
        id: row.get(0)?,
        word: row.get(1)?,
        translation: row.get(2)?,
        source_lang: row.get(3)?,
        target_lang: row.get(4)?,
        pronunciation: row.get(5)?,
        examples: serde_json::from_str(&examples_json).context("Invalid examples column")?,
        notes: row.get(7)?,
        tags: serde_json::from_str(&tags_json).context("Invalid tags column")?,
        group_id: row.get(9)?,
        favorite: row.get(10)?,
        proficiency: scheduler::Proficiency::from_str(&proficiency_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid proficiency value: {}", proficiency_str))?,
        state,
        total_reviews: row.get(18)?,
        correct_count: row.get(19)?,
        wrong_count: row.get(20)?,
        avg_response_ms: row.get(21)?,
        created_at: parse_ts(&created_str, "created_at")?,
        updated_at: parse_ts(&updated_str, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_GROUP_ID;
    use std::path::PathBuf;

    fn test_db(name: &str) -> Database {
        let path = PathBuf::from(format!(
            "/tmp/lexideck_cards_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Database::open_at_path(path).unwrap()
    }

    fn new_card(word: &str) -> NewFlashcard {
        NewFlashcard {
            word: word.to_string(),
            translation: format!("{}-es", word),
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            ..Default::default()
        }
    }

    fn sample_translation(word: &str) -> Translation {
        Translation {
            text: word.to_string(),
            translation: format!("{}-es", word),
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            pronunciation: None,
            examples: Vec::new(),
        }
    }

    #[test]
    fn create_sets_defaults() {
        let db = test_db("defaults");
        let store = FlashcardStore::new(&db);

        let card = store.create(new_card("hello")).unwrap();
        assert_eq!(card.group_id, DEFAULT_GROUP_ID);
        assert_eq!(card.proficiency, Proficiency::New);
        assert_eq!(card.total_reviews, 0);
        assert_eq!(card.correct_count + card.wrong_count, card.total_reviews);
        assert!(card.state.is_new());
        assert!(card.is_due(Utc::now()));

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn empty_word_is_rejected_before_any_write() {
        let db = test_db("emptyword");
        let store = FlashcardStore::new(&db);

        let err = store.create(new_card("   ")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Validation(_))
        ));
        assert_eq!(store.count().unwrap(), 0);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn exists_ignores_case_and_whitespace() {
        let db = test_db("exists");
        let store = FlashcardStore::new(&db);
        store.create(new_card("Hello")).unwrap();

        assert!(store.exists("  hello ", "en", "es").unwrap());
        assert!(store.exists("HELLO", "en", "es").unwrap());
        assert!(!store.exists("hello", "en", "fr").unwrap());

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn duplicate_translation_card_is_rejected() {
        let db = test_db("dup");
        let store = FlashcardStore::new(&db);

        store
            .create_from_translation(&sample_translation("hello"), None)
            .unwrap();
        let err = store
            .create_from_translation(&sample_translation("  HELLO "), None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Duplicate { .. })
        ));
        assert_eq!(store.count().unwrap(), 1);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn move_to_missing_group_leaves_card_untouched() {
        let db = test_db("move");
        let store = FlashcardStore::new(&db);
        let card = store.create(new_card("hello")).unwrap();

        let err = store.move_to_group(&card.id, "nonexistent-group").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::GroupNotFound(_))
        ));

        let unchanged = store.get(&card.id).unwrap().unwrap();
        assert_eq!(unchanged.group_id, DEFAULT_GROUP_ID);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn search_matches_word_translation_and_tags() {
        let db = test_db("search");
        let store = FlashcardStore::new(&db);

        let mut fields = new_card("apple");
        fields.tags = vec!["fruit".to_string()];
        store.create(fields).unwrap();
        store.create(new_card("house")).unwrap();

        let by_word = store
            .search(&SearchFilter {
                query: Some("APP".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_word.len(), 1);
        assert_eq!(by_word[0].word, "apple");

        let by_tag = store
            .search(&SearchFilter {
                tags: vec!["fruit".to_string()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_tag.len(), 1);

        let by_translation = store
            .search(&SearchFilter {
                query: Some("house-es".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_translation.len(), 1);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn oversized_card_hits_the_quota() {
        let db = test_db("quota");
        let store = FlashcardStore::new(&db);

        let mut fields = new_card("hello");
        fields.notes = Some("x".repeat(MAX_CARD_BYTES + 1));
        let err = store.create(fields).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::QuotaExceeded { .. })
        ));

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn update_rejects_inconsistent_counters() {
        let db = test_db("counters");
        let store = FlashcardStore::new(&db);
        let mut card = store.create(new_card("hello")).unwrap();

        card.total_reviews = 3;
        card.correct_count = 1;
        card.wrong_count = 1;
        let err = store.update(&card).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Validation(_))
        ));

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn toggle_favorite_flips_and_persists() {
        let db = test_db("favorite");
        let store = FlashcardStore::new(&db);
        let card = store.create(new_card("hello")).unwrap();
        assert!(!card.favorite);

        let flipped = store.toggle_favorite(&card.id).unwrap();
        assert!(flipped.favorite);
        let back = store.toggle_favorite(&card.id).unwrap();
        assert!(!back.favorite);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn modified_since_sees_recent_edits() {
        let db = test_db("modified");
        let store = FlashcardStore::new(&db);

        let before = Utc::now() - chrono::Duration::seconds(5);
        let card = store.create(new_card("hello")).unwrap();

        let changed = store.modified_since(before).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, card.id);

        let future = Utc::now() + chrono::Duration::seconds(60);
        assert!(store.modified_since(future).unwrap().is_empty());

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn delete_missing_card_is_not_found() {
        let db = test_db("delete");
        let store = FlashcardStore::new(&db);

        let err = store.delete("no-such-id").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::CardNotFound(_))
        ));

        let _ = std::fs::remove_file(db.path.as_path());
    }
}
