use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use super::{Database, StoreError};

/// Reserved id for the group every card falls back to. Always exists,
/// cannot be deleted.
pub const DEFAULT_GROUP_ID: &str = "default";

#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Live count of cards referencing this group, never a stored counter.
    pub card_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct GroupStore<'a> {
    db: &'a Database,
}

impl<'a> GroupStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create the default group iff it is absent. Idempotent.
    pub fn ensure_default(&self) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db
            .conn
            .execute(
                "INSERT OR IGNORE INTO groups (id, name, description, color, created_at, updated_at)
                 VALUES (?1, 'Default', 'Cards without a group', NULL, ?2, ?3)",
                params![DEFAULT_GROUP_ID, now, now],
            )
            .context("Failed to ensure default group")?;
        Ok(())
    }

    /// Create a new group. Names need not be unique, only non-empty.
    pub fn create(
        &self,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("Group name cannot be empty".into()).into());
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        self.db
            .conn
            .execute(
                "INSERT INTO groups (id, name, description, color, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, name, description, color, now, now],
            )
            .context("Failed to create group")?;

        self.get(&id)?
            .ok_or_else(|| StoreError::GroupNotFound(id).into())
    }

    /// Get a group by id, with its live card count.
    pub fn get(&self, id: &str) -> Result<Option<Group>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT g.id, g.name, g.description, g.color, g.created_at, g.updated_at,
                    (SELECT COUNT(*) FROM flashcards f WHERE f.group_id = g.id)
             FROM groups g WHERE g.id = ?1",
        )?;

        let mut rows = stmt.query(params![id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(Self::row_to_group(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM groups WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List all groups with live card counts, default group first.
    pub fn get_all(&self) -> Result<Vec<Group>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT g.id, g.name, g.description, g.color, g.created_at, g.updated_at,
                    (SELECT COUNT(*) FROM flashcards f WHERE f.group_id = g.id)
             FROM groups g
             ORDER BY (g.id = 'default') DESC, g.created_at ASC",
        )?;

        let mut rows = stmt.query([])?;
        let mut groups = Vec::new();

        while let Some(row) = rows.next()? {
            groups.push(Self::row_to_group(row)?);
        }

        Ok(groups)
    }

    /// Update name/description/color. `None` leaves a field unchanged.
    pub fn update(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<Group> {
        let current = self
            .get(id)?
            .ok_or_else(|| StoreError::GroupNotFound(id.to_string()))?;

        let name = match name {
            Some(n) if n.trim().is_empty() => {
                return Err(StoreError::Validation("Group name cannot be empty".into()).into());
            }
            Some(n) => n.trim().to_string(),
            None => current.name,
        };
        let description = description
            .map(|d| d.to_string())
            .or(current.description);
        let color = color.map(|c| c.to_string()).or(current.color);
        let now = Utc::now().to_rfc3339();

        self.db
            .conn
            .execute(
                "UPDATE groups SET name = ?1, description = ?2, color = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![name, description, color, now, id],
            )
            .context("Failed to update group")?;

        self.get(id)?
            .ok_or_else(|| StoreError::GroupNotFound(id.to_string()).into())
    }

    /// Delete a group, first reassigning its member cards to the default
    /// group so no card is ever orphaned. The default group is protected.
    pub fn delete(&self, id: &str) -> Result<()> {
        if id == DEFAULT_GROUP_ID {
            return Err(StoreError::DefaultGroupProtected.into());
        }
        if !self.exists(id)? {
            return Err(StoreError::GroupNotFound(id.to_string()).into());
        }

        let tx = self.db.conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "UPDATE flashcards SET group_id = ?1, updated_at = ?2 WHERE group_id = ?3",
            params![DEFAULT_GROUP_ID, now, id],
        )
        .context("Failed to reassign cards to default group")?;

        tx.execute("DELETE FROM groups WHERE id = ?1", params![id])
            .context("Failed to delete group")?;

        tx.commit()?;
        Ok(())
    }

    fn row_to_group(row: &rusqlite::Row) -> Result<Group> {
        let created_str: String = row.get(4)?;
        let updated_str: String = row.get(5)?;

        Ok(Group {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            color: row.get(3)?,
            card_count: row.get(6)?,
            created_at: DateTime::parse_from_rfc3339(&created_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_str)
                .context("Invalid updated_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FlashcardStore, NewFlashcard};
    use std::path::PathBuf;

    fn test_db(name: &str) -> Database {
        let path = PathBuf::from(format!(
            "/tmp/lexideck_groups_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Database::open_at_path(path).unwrap()
    }

    fn card_in(group_id: &str, word: &str) -> NewFlashcard {
        NewFlashcard {
            word: word.to_string(),
            translation: format!("{}-es", word),
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            group_id: Some(group_id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn ensure_default_is_idempotent() {
        let db = test_db("ensure");
        let store = GroupStore::new(&db);

        // open_at_path already ran it once.
        store.ensure_default().unwrap();
        store.ensure_default().unwrap();

        let defaults: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM groups WHERE id = 'default'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(defaults, 1);

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn same_name_twice_yields_distinct_groups() {
        let db = test_db("names");
        let store = GroupStore::new(&db);

        let a = store.create("Work", None, None).unwrap();
        let b = store.create("Work", None, None).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.get_all().unwrap().len(), 3); // default + two

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn empty_name_is_rejected() {
        let db = test_db("emptyname");
        let store = GroupStore::new(&db);

        let err = store.create("  ", None, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Validation(_))
        ));

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn delete_reassigns_members_to_default() {
        let db = test_db("delete");
        let groups = GroupStore::new(&db);
        let cards = FlashcardStore::new(&db);

        let work = groups.create("Work", None, None).unwrap();
        for word in ["one", "two", "three"] {
            cards.create(card_in(&work.id, word)).unwrap();
        }
        assert_eq!(groups.get(&work.id).unwrap().unwrap().card_count, 3);

        groups.delete(&work.id).unwrap();

        assert!(groups.get(&work.id).unwrap().is_none());
        let default = groups.get(DEFAULT_GROUP_ID).unwrap().unwrap();
        assert_eq!(default.card_count, 3);
        for card in cards.get_all().unwrap() {
            assert_eq!(card.group_id, DEFAULT_GROUP_ID);
        }

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn default_group_cannot_be_deleted() {
        let db = test_db("protected");
        let store = GroupStore::new(&db);

        let err = store.delete(DEFAULT_GROUP_ID).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::DefaultGroupProtected)
        ));
        assert!(store.exists(DEFAULT_GROUP_ID).unwrap());

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn update_keeps_unspecified_fields() {
        let db = test_db("update");
        let store = GroupStore::new(&db);

        let g = store
            .create("Travel", Some("trip words"), Some("#ff0000"))
            .unwrap();
        let renamed = store.update(&g.id, Some("Trips"), None, None).unwrap();
        assert_eq!(renamed.name, "Trips");
        assert_eq!(renamed.description.as_deref(), Some("trip words"));
        assert_eq!(renamed.color.as_deref(), Some("#ff0000"));

        let _ = std::fs::remove_file(db.path.as_path());
    }
}
