use serde::{Deserialize, Serialize};

use crate::storage::{Database, Flashcard, FlashcardStore, Group, GroupStore};
use crate::translate::Translation;

/// Requests accepted at the external boundary. A closed tagged union:
/// anything outside these shapes is rejected at parse time instead of
/// leaking into the core as a loosely typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetFlashcards,
    GetFlashcardGroups,
    CreateFlashcard {
        translation: TranslationPayload,
        #[serde(default)]
        group_id: Option<String>,
    },
    CheckFlashcardExists {
        word: String,
        source_lang: String,
        target_lang: String,
    },
}

/// Translation-result payload carried by `CREATE_FLASHCARD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationPayload {
    pub text: String,
    pub translation: String,
    pub source_lang: String,
    pub target_lang: String,
    #[serde(default)]
    pub pronunciation: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl From<TranslationPayload> for Translation {
    fn from(p: TranslationPayload) -> Self {
        Translation {
            text: p.text,
            translation: p.translation,
            source_lang: p.source_lang,
            target_lang: p.target_lang,
            pronunciation: p.pronunciation,
            examples: p.examples,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Flashcards { flashcards: Vec<FlashcardDto> },
    Groups { groups: Vec<GroupDto> },
    Created { flashcard: FlashcardDto },
    Exists { exists: bool },
    Error { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardDto {
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
    pub proficiency: String,
    pub next_review: String,
    pub total_reviews: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Flashcard> for FlashcardDto {
    fn from(c: Flashcard) -> Self {
        Self {
            next_review: c.next_review().to_rfc3339(),
            id: c.id,
            word: c.word,
            translation: c.translation,
            source_lang: c.source_lang,
            target_lang: c.target_lang,
            pronunciation: c.pronunciation,
            examples: c.examples,
            notes: c.notes,
            tags: c.tags,
            group_id: c.group_id,
            favorite: c.favorite,
            proficiency: c.proficiency.as_str().to_string(),
            total_reviews: c.total_reviews,
            correct_count: c.correct_count,
            wrong_count: c.wrong_count,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub card_count: i64,
}

impl From<Group> for GroupDto {
    fn from(g: Group) -> Self {
        Self {
            id: g.id,
            name: g.name,
            description: g.description,
            color: g.color,
            card_count: g.card_count,
        }
    }
}

/// Dispatch one request against the store. Never panics; failures come
/// back as `Response::Error` strings.
pub fn handle(db: &Database, request: Request) -> Response {
    match request {
        Request::GetFlashcards => match FlashcardStore::new(db).get_all() {
            Ok(cards) => Response::Flashcards {
                flashcards: cards.into_iter().map(FlashcardDto::from).collect(),
            },
            Err(e) => Response::Error {
                error: e.to_string(),
            },
        },
        Request::GetFlashcardGroups => match GroupStore::new(db).get_all() {
            Ok(groups) => Response::Groups {
                groups: groups.into_iter().map(GroupDto::from).collect(),
            },
            Err(e) => Response::Error {
                error: e.to_string(),
            },
        },
        Request::CreateFlashcard {
            translation,
            group_id,
        } => {
            let translation: Translation = translation.into();
            match FlashcardStore::new(db).create_from_translation(&translation, group_id.as_deref())
            {
                Ok(card) => Response::Created {
                    flashcard: card.into(),
                },
                Err(e) => Response::Error {
                    error: e.to_string(),
                },
            }
        }
        Request::CheckFlashcardExists {
            word,
            source_lang,
            target_lang,
        } => {
            // A failed check must not block card creation downstream.
            let exists = FlashcardStore::new(db)
                .exists(&word, &source_lang, &target_lang)
                .unwrap_or(false);
            Response::Exists { exists }
        }
    }
}

/// JSON-in, JSON-out entry point for the `api` subcommand.
pub fn handle_json(db: &Database, input: &str) -> String {
    let response = match serde_json::from_str::<Request>(input) {
        Ok(request) => handle(db, request),
        Err(e) => Response::Error {
            error: format!("invalid request: {}", e),
        },
    };

    to_json(&response)
}

/// Serialize a response, degrading to an error payload that is still
/// produced by the serializer so the output is always valid JSON.
fn to_json(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        let fallback = Response::Error {
            error: format!("serialization failed: {}", e),
        };
        serde_json::to_string(&fallback)
            .unwrap_or_else(|_| r#"{"result":"error","error":"serialization failed"}"#.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_db(name: &str) -> Database {
        let path = PathBuf::from(format!(
            "/tmp/lexideck_api_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Database::open_at_path(path).unwrap()
    }

    fn payload(word: &str) -> TranslationPayload {
        TranslationPayload {
            text: word.to_string(),
            translation: "hola".to_string(),
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            pronunciation: None,
            examples: Vec::new(),
        }
    }

    #[test]
    fn request_tags_match_the_wire_names() {
        let req: Request = serde_json::from_str(
            r#"{"action": "CHECK_FLASHCARD_EXISTS", "word": "hi",
                "source_lang": "en", "target_lang": "es"}"#,
        )
        .unwrap();
        assert!(matches!(req, Request::CheckFlashcardExists { .. }));

        let json = serde_json::to_string(&Request::GetFlashcards).unwrap();
        assert!(json.contains("GET_FLASHCARDS"));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let db = test_db("unknown");
        let out = handle_json(&db, r#"{"action": "DROP_EVERYTHING"}"#);
        assert!(out.contains("invalid request"));
        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn create_then_duplicate_then_exists() {
        let db = test_db("create");

        let created = handle(
            &db,
            Request::CreateFlashcard {
                translation: payload("hello"),
                group_id: None,
            },
        );
        assert!(matches!(created, Response::Created { .. }));

        // Second create with the same (word, source, target) tuple fails.
        let duplicate = handle(
            &db,
            Request::CreateFlashcard {
                translation: payload("hello"),
                group_id: None,
            },
        );
        assert!(matches!(duplicate, Response::Error { .. }));

        // Case/whitespace variations hit the same card.
        let exists = handle(
            &db,
            Request::CheckFlashcardExists {
                word: "  HELLO ".to_string(),
                source_lang: "en".to_string(),
                target_lang: "es".to_string(),
            },
        );
        assert!(matches!(exists, Response::Exists { exists: true }));

        let _ = std::fs::remove_file(db.path.as_path());
    }

    #[test]
    fn error_payloads_are_valid_json_even_with_quotes() {
        let out = to_json(&Response::Error {
            error: r#"a card for 'say "hi"' (en -> es) already exists"#.to_string(),
        });

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["result"], "error");
        assert!(value["error"].as_str().unwrap().contains(r#""hi""#));
    }

    #[test]
    fn groups_listing_includes_default() {
        let db = test_db("groups");
        match handle(&db, Request::GetFlashcardGroups) {
            Response::Groups { groups } => {
                assert!(groups.iter().any(|g| g.id == "default"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
        let _ = std::fs::remove_file(db.path.as_path());
    }
}
