pub mod db;
pub mod flashcards;
pub mod groups;
pub mod reviews;
pub mod stats;

pub use db::Database;
pub use flashcards::{Flashcard, FlashcardStore, NewFlashcard, SearchFilter};
pub use groups::{DEFAULT_GROUP_ID, Group, GroupStore};
pub use reviews::{ReviewRecord, ReviewStore};
pub use stats::{DailyStats, StatsStore};

/// Domain failures the storage layer distinguishes for callers. Everything
/// else (I/O, SQL) surfaces as a plain anyhow error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("flashcard not found: {0}")]
    CardNotFound(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("a card for '{word}' ({source_lang} -> {target_lang}) already exists")]
    Duplicate {
        word: String,
        source_lang: String,
        target_lang: String,
    },

    #[error("record too large: {size} bytes (limit {limit})")]
    QuotaExceeded { size: usize, limit: usize },

    #[error("the default group cannot be deleted")]
    DefaultGroupProtected,
}
