//! Google Cloud Translation (v2) backend.
//!
//! The key comes from `GOOGLE_TRANSLATE_API_KEY`. A batch is cut into requests of
//! at most [`GoogleTranslateProvider::MAX_TEXTS_PER_REQUEST`] texts and
//! [`GoogleTranslateProvider::MAX_REQUEST_CHARS`] characters; the answers are
//! concatenated in request order.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MtError, MtResult};
use crate::translator::{MachineTranslator, normalize_locale, validate_locale};

const ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";
const API_KEY_VAR: &str = "GOOGLE_TRANSLATE_API_KEY";

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a [String],
    source: String,
    target: String,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslationList,
}

#[derive(Debug, Deserialize)]
struct TranslationList {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct GoogleTranslateProvider {
    api_key: String,
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl GoogleTranslateProvider {
    /// Texts per request accepted by the v2 API
    pub const MAX_TEXTS_PER_REQUEST: usize = 128;

    /// Characters per request; a single longer text is rejected up front
    pub const MAX_REQUEST_CHARS: usize = 30_000;

    /// Create a provider with an explicit key and the default 30 s timeout.
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - Ready to send requests
    /// * `Err(MtError::ConfigError)` - The key is blank
    /// * `Err(MtError::NetworkError)` - The HTTP client could not be built
    pub fn new(api_key: String) -> MtResult<Self> {
        Self::with_timeout(api_key, Duration::from_secs(30))
    }

    /// Build a provider whose HTTP requests give up after `timeout`.
    pub fn with_timeout(api_key: String, timeout: Duration) -> MtResult<Self> {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(MtError::ConfigError(format!("{} is empty", API_KEY_VAR)));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MtError::NetworkError(format!("cannot build HTTP client: {}", e)))?;

        Ok(GoogleTranslateProvider {
            api_key,
            http,
            endpoint: ENDPOINT.to_string(),
            timeout,
        })
    }

    /// Send requests to another endpoint that speaks the v2 protocol.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Create a provider from the `GOOGLE_TRANSLATE_API_KEY` environment variable.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let provider = GoogleTranslateProvider::from_env()?;
    /// let pipeline = Pipeline::default().with_translator(Arc::new(provider));
    /// ```
    pub fn from_env() -> MtResult<Self> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) => Self::new(key),
            Err(_) => Err(MtError::ConfigError(format!("{} is not set", API_KEY_VAR))),
        }
    }

    /// Group `texts` into request-sized slices, keeping their order.
    fn requests(texts: &[String]) -> MtResult<Vec<&[String]>> {
        let mut groups = Vec::new();
        let mut start = 0;
        let mut chars = 0;
        for (i, text) in texts.iter().enumerate() {
            let len = text.chars().count();
            if len > Self::MAX_REQUEST_CHARS {
                return Err(MtError::TranslationError(format!(
                    "text {} has {} characters, more than the {} a request may carry",
                    i,
                    len,
                    Self::MAX_REQUEST_CHARS
                )));
            }
            if i > start
                && (i - start == Self::MAX_TEXTS_PER_REQUEST || chars + len > Self::MAX_REQUEST_CHARS)
            {
                groups.push(&texts[start..i]);
                start = i;
                chars = 0;
            }
            chars += len;
        }
        if start < texts.len() {
            groups.push(&texts[start..]);
        }
        Ok(groups)
    }

    async fn send(&self, texts: &[String], source: &str, target: &str) -> MtResult<Vec<String>> {
        let request = TranslateRequest {
            q: texts,
            source: normalize_locale(source),
            target: normalize_locale(target),
            format: "text",
        };

        let response = self
            .http
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MtError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    // the URL carries the key
                    MtError::from(e.without_url())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| MtError::from(e.without_url()))?;
        if !status.is_success() {
            let message = api_error_message(&body);
            // Unsupported languages come back as 400
            return Err(if status.is_client_error() {
                MtError::ConfigError(format!("request rejected ({}): {}", status, message))
            } else {
                MtError::TranslationError(format!("service error ({}): {}", status, message))
            });
        }

        parse_translations(&body)
    }
}

fn parse_translations(body: &str) -> MtResult<Vec<String>> {
    let response: TranslateResponse = serde_json::from_str(body)
        .map_err(|e| MtError::TranslationError(format!("unexpected response: {}", e)))?;
    Ok(response
        .data
        .translations
        .into_iter()
        .map(|translation| translation.translated_text)
        .collect())
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|response| response.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

impl std::fmt::Debug for GoogleTranslateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslateProvider")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for GoogleTranslateProvider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        let results = self
            .translate_batch(&[text.to_string()], source_locale, target_locale)
            .await?;
        let actual = results.len();
        match <[String; 1]>::try_from(results) {
            Ok([result]) => Ok(result),
            Err(_) => Err(MtError::ResponseMismatch { expected: 1, actual }),
        }
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        let mut translations = Vec::with_capacity(texts.len());
        for group in Self::requests(texts)? {
            debug!(texts = group.len(), target = target_locale, "google translate request");
            let answers = self.send(group, source_locale, target_locale).await?;
            if answers.len() != group.len() {
                return Err(MtError::ResponseMismatch {
                    expected: group.len(),
                    actual: answers.len(),
                });
            }
            translations.extend(answers);
        }
        Ok(translations)
    }

    fn provider_name(&self) -> &str {
        "Google Translate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleTranslateProvider {
        GoogleTranslateProvider::new("dummy-key".to_string()).unwrap()
    }

    fn texts(count: usize, len: usize) -> Vec<String> {
        (0..count).map(|_| "a".repeat(len)).collect()
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(
            GoogleTranslateProvider::new(" \n".to_string()),
            Err(MtError::ConfigError(_))
        ));
        assert_eq!(provider().provider_name(), "Google Translate");
    }

    #[test]
    fn test_missing_env_key() {
        unsafe {
            std::env::remove_var(API_KEY_VAR);
        }
        match GoogleTranslateProvider::from_env() {
            Err(MtError::ConfigError(msg)) => assert!(msg.contains("not set")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_requests_split_on_count() {
        let batch = texts(300, 3);
        let groups = GoogleTranslateProvider::requests(&batch).unwrap();
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![128, 128, 44]);
    }

    #[test]
    fn test_requests_split_on_characters() {
        let batch = texts(3, 12_000);
        let groups = GoogleTranslateProvider::requests(&batch).unwrap();
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_oversized_text_rejected() {
        let mut batch = texts(2, 5);
        batch.push("b".repeat(GoogleTranslateProvider::MAX_REQUEST_CHARS + 1));
        match GoogleTranslateProvider::requests(&batch) {
            Err(MtError::TranslationError(msg)) => assert!(msg.starts_with("text 2")),
            other => panic!("unexpected {:?}", other.map(|g| g.len())),
        }
    }

    #[test]
    fn test_no_requests_for_empty_batch() {
        assert!(GoogleTranslateProvider::requests(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_translations() {
        let body = r#"{"data": {"translations": [
            {"translatedText": "Resultaten"},
            {"translatedText": "Belasting 777001", "detectedSourceLanguage": "en"}
        ]}}"#;
        assert_eq!(
            parse_translations(body).unwrap(),
            vec!["Resultaten", "Belasting 777001"]
        );
        assert!(parse_translations(r#"{"data": {}}"#).is_err());
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 400, "message": "Bad language pair: en|xx"}}"#;
        assert_eq!(api_error_message(body), "Bad language pair: en|xx");
        assert_eq!(api_error_message("  gateway down \n"), "gateway down");
    }

    #[test]
    fn test_request_body_shape() {
        let q = vec!["Results".to_string()];
        let request = TranslateRequest {
            q: &q,
            source: normalize_locale("en-GB"),
            target: normalize_locale("nl_BE"),
            format: "text",
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"q": ["Results"], "source": "en", "target": "nl", "format": "text"})
        );
    }

    #[tokio::test]
    async fn test_invalid_locale_fails_before_network() {
        let result = provider().translate("Results", "en", "n l").await;
        assert!(matches!(result, Err(MtError::InvalidLocale(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let unreachable = provider().with_endpoint("http://127.0.0.1:9/v2");
        assert!(unreachable.translate_batch(&[], "en", "nl").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let provider =
            GoogleTranslateProvider::with_timeout("dummy-key".to_string(), Duration::from_secs(2))
                .unwrap()
                .with_endpoint("http://127.0.0.1:9/v2");
        assert!(provider.translate("Results", "en", "nl").await.is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", provider());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("dummy-key"));
    }

    #[tokio::test]
    #[ignore] // needs GOOGLE_TRANSLATE_API_KEY
    async fn test_live_batch() {
        let Ok(provider) = GoogleTranslateProvider::from_env() else {
            eprintln!("Skipping: {} not set", API_KEY_VAR);
            return;
        };
        let batch = vec!["Results".to_string(), "Load case".to_string()];
        let answers = provider.translate_batch(&batch, "en", "nl").await.unwrap();
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().all(|a| !a.is_empty()));
    }

    #[tokio::test]
    #[ignore] // needs GOOGLE_TRANSLATE_API_KEY
    async fn test_live_anchor_tokens_survive() {
        let Ok(provider) = GoogleTranslateProvider::from_env() else {
            eprintln!("Skipping: {} not set", API_KEY_VAR);
            return;
        };
        let answer = provider
            .translate("The load 777001 acts on support 777002", "en", "de")
            .await
            .unwrap();
        assert!(answer.contains("777001") && answer.contains("777002"));
    }
}
