use serde::Deserialize;
use std::time::Duration;

const TRANSLATE_API_URL: &str = "https://translate.googleapis.com/translate_a/single";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed-count retry with a doubling delay; only network-class and
/// 5xx-class failures are retried.
const MAX_RETRIES: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_secs(1);

pub const MAX_TEXT_LENGTH: usize = 5000;

/// Language pairs the public endpoint accepts from us.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("auto", "Auto detect"),
    ("en", "English"),
    ("zh-CN", "Chinese (Simplified)"),
    ("zh-TW", "Chinese (Traditional)"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("ru", "Russian"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ar", "Arabic"),
];

/// A completed translation, ready to be shown or turned into a flashcard.
#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    pub translation: String,
    /// Detected source language when the request used `auto`.
    pub source_lang: String,
    pub target_lang: String,
    pub pronunciation: Option<String>,
    pub examples: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("{0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("translation API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("empty translation result")]
    EmptyResult,
}

impl TranslateError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    sentences: Option<Vec<Sentence>>,
    src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Sentence {
    trans: Option<String>,
    translit: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Translator {
    client: reqwest::Client,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Translate `text` from `source_lang` (or `auto`) into `target_lang`.
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Translation, TranslateError> {
        let text = validate_text(text)?;
        if target_lang == "auto" {
            return Err(TranslateError::Validation(
                "Target language cannot be 'auto'".into(),
            ));
        }

        let mut delay = RETRY_DELAY;
        let mut attempt = 0;

        loop {
            match self.request_once(&text, source_lang, target_lang).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort language detection; falls back to `auto` on any failure,
    /// including invalid input, without surfacing an error.
    pub async fn detect_language(&self, text: &str) -> String {
        let text = match validate_text(text) {
            Ok(t) => t,
            Err(_) => return "auto".to_string(),
        };
        detected_or_auto(self.request_once(&text, "auto", "en").await)
    }

    async fn request_once(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Translation, TranslateError> {
        let response = self
            .client
            .get(TRANSLATE_API_URL)
            .query(&[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("dt", "rm"),
                ("ie", "UTF-8"),
                ("oe", "UTF-8"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse = response.json().await.map_err(|e| {
            TranslateError::Api {
                status: status.as_u16(),
                message: format!("unparseable response: {}", e),
            }
        })?;

        parse_response(body, text, source_lang, target_lang)
    }
}

fn detected_or_auto(result: Result<Translation, TranslateError>) -> String {
    match result {
        Ok(t) => t.source_lang,
        Err(_) => "auto".to_string(),
    }
}

fn validate_text(text: &str) -> Result<String, TranslateError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TranslateError::Validation("Nothing to translate".into()));
    }
    if text.len() > MAX_TEXT_LENGTH {
        return Err(TranslateError::Validation(format!(
            "Text too long: {} bytes (limit {})",
            text.len(),
            MAX_TEXT_LENGTH
        )));
    }
    Ok(text.to_string())
}

fn request_error(e: reqwest::Error) -> TranslateError {
    if e.is_timeout() {
        TranslateError::Network("request timed out".into())
    } else {
        TranslateError::Network(e.to_string())
    }
}

fn parse_response(
    body: ApiResponse,
    text: &str,
    source_lang: &str,
    target_lang: &str,
) -> Result<Translation, TranslateError> {
    let sentences = body.sentences.unwrap_or_default();

    let translation: String = sentences
        .iter()
        .filter_map(|s| s.trans.as_deref())
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string();

    if translation.is_empty() {
        return Err(TranslateError::EmptyResult);
    }

    let pronunciation = sentences
        .iter()
        .filter_map(|s| s.translit.as_deref())
        .find(|t| !t.is_empty())
        .map(|t| t.to_string());

    let detected = body
        .src
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| source_lang.to_string());

    Ok(Translation {
        text: text.to_string(),
        translation,
        source_lang: detected,
        target_lang: target_lang.to_string(),
        pronunciation,
        examples: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_oversized_text() {
        assert!(matches!(
            validate_text("   "),
            Err(TranslateError::Validation(_))
        ));

        let huge = "x".repeat(MAX_TEXT_LENGTH + 1);
        assert!(matches!(
            validate_text(&huge),
            Err(TranslateError::Validation(_))
        ));

        assert_eq!(validate_text("  hello ").unwrap(), "hello");
    }

    #[test]
    fn retries_only_network_and_server_errors() {
        assert!(TranslateError::Network("boom".into()).is_retryable());
        assert!(
            TranslateError::Api {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !TranslateError::Api {
                status: 429,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!TranslateError::Validation("bad".into()).is_retryable());
        assert!(!TranslateError::EmptyResult.is_retryable());
    }

    #[test]
    fn parses_sentences_and_detected_language() {
        let body: ApiResponse = serde_json::from_str(
            r#"{
                "sentences": [
                    {"trans": "Hola ", "orig": "Hello "},
                    {"trans": "mundo", "orig": "world"},
                    {"translit": "ola mundo"}
                ],
                "src": "en"
            }"#,
        )
        .unwrap();

        let t = parse_response(body, "Hello world", "auto", "es").unwrap();
        assert_eq!(t.translation, "Hola mundo");
        assert_eq!(t.source_lang, "en");
        assert_eq!(t.target_lang, "es");
        assert_eq!(t.pronunciation.as_deref(), Some("ola mundo"));
    }

    #[test]
    fn detection_uses_the_reported_source_or_falls_back() {
        let hit = Translation {
            text: "bonjour".to_string(),
            translation: "hello".to_string(),
            source_lang: "fr".to_string(),
            target_lang: "en".to_string(),
            pronunciation: None,
            examples: Vec::new(),
        };
        assert_eq!(detected_or_auto(Ok(hit)), "fr");
        assert_eq!(
            detected_or_auto(Err(TranslateError::Network("down".into()))),
            "auto"
        );
        assert_eq!(detected_or_auto(Err(TranslateError::EmptyResult)), "auto");
    }

    #[tokio::test]
    async fn detection_of_invalid_text_never_touches_the_network() {
        let translator = Translator::new();
        assert_eq!(translator.detect_language("   ").await, "auto");

        let huge = "x".repeat(MAX_TEXT_LENGTH + 1);
        assert_eq!(translator.detect_language(&huge).await, "auto");
    }

    #[test]
    fn empty_translation_is_an_error() {
        let body: ApiResponse = serde_json::from_str(r#"{"sentences": [], "src": "en"}"#).unwrap();
        assert!(matches!(
            parse_response(body, "x", "en", "es"),
            Err(TranslateError::EmptyResult)
        ));
    }
}
