// src/services/translator.rs
use crate::errors::CropsightError;
use log::error;
use reqwest::Client;
use serde_json::json;
use tokio::sync::Mutex;

const AUTH_URL: &str = "https://meity-auth.ulcacontrib.org/ulca/apis/v0/model/getModelsPipeline";
const PIPELINE_URL: &str = "https://dhruva-api.bhashini.gov.in/services/inference/pipeline";
const PIPELINE_ID: &str = "64392f96daac500b55c543cd";
const TRANSLATION_SERVICE_ID: &str = "ai4bharat/indictrans-v2-all-gpu--t4";

/// Process-wide auth token for the translation provider. Fetched lazily on
/// first use and never refreshed within the process lifetime; if the upstream
/// token expires, translation degrades to identity until restart. Concurrent
/// first-time fetches may race, which only costs a duplicate auth call since
/// both fetch the same token.
pub struct TokenCache {
    slot: Mutex<Option<String>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Pre-seeded cache, for wiring tests without an auth round-trip.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }

    pub async fn cached(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }

    pub async fn store(&self, token: String) {
        *self.slot.lock().await = Some(token);
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay to the machine-translation pipeline. Best-effort: every failure path
/// degrades to returning the caller's original text rather than an error the
/// UI would have to render.
pub struct TranslatorService {
    credentials: Option<(String, String)>,
    token: TokenCache,
    client: Client,
}

impl TranslatorService {
    pub fn new(api_key: Option<String>, user_id: Option<String>, token: TokenCache) -> Self {
        Self {
            credentials: api_key.zip(user_id),
            token,
            client: Client::new(),
        }
    }

    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, CropsightError> {
        if self.credentials.is_none() {
            return Err(CropsightError::NotConfigured("translation"));
        }

        let auth_token = self
            .auth_token()
            .await
            .ok_or_else(|| CropsightError::Provider("Translation service unavailable".to_string()))?;

        let response = self
            .client
            .post(PIPELINE_URL)
            .header("Authorization", auth_token)
            .json(&json!({
                "pipelineTasks": [{
                    "taskType": "translation",
                    "config": {
                        "language": {
                            "sourceLanguage": source_lang,
                            "targetLanguage": target_lang,
                        },
                        "serviceId": TRANSLATION_SERVICE_ID,
                    },
                }],
                "inputData": {
                    "input": [{ "source": text }],
                },
            }))
            .send()
            .await
            .map_err(|e| CropsightError::Provider(format!("Translation request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CropsightError::Provider(format!(
                "Translation provider returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            CropsightError::Provider(format!("Malformed translation response: {}", e))
        })?;

        Ok(extract_translation(&body, text))
    }

    /// Get-or-fetch on the shared token cache. Fetch errors are swallowed into
    /// `None`, which callers treat as "service unavailable".
    async fn auth_token(&self) -> Option<String> {
        if let Some(token) = self.token.cached().await {
            return Some(token);
        }

        match self.fetch_token().await {
            Ok(Some(token)) => {
                self.token.store(token.clone()).await;
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Translation auth error: {}", e);
                None
            }
        }
    }

    async fn fetch_token(&self) -> Result<Option<String>, CropsightError> {
        let (api_key, user_id) = self
            .credentials
            .as_ref()
            .ok_or(CropsightError::NotConfigured("translation"))?;

        let response = self
            .client
            .post(AUTH_URL)
            .header("ulcaApiKey", api_key.as_str())
            .header("userID", user_id.as_str())
            .json(&json!({
                "pipelineTasks": [
                    { "taskType": "asr" },
                    { "taskType": "translation" },
                    { "taskType": "tts" },
                ],
                "pipelineRequestConfig": {
                    "pipelineId": PIPELINE_ID,
                },
            }))
            .send()
            .await
            .map_err(|e| CropsightError::Provider(format!("Auth request failed: {}", e)))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CropsightError::Provider(format!("Malformed auth response: {}", e)))?;

        Ok(body["pipelineInferenceAPIEndPoint"]["inferenceApiKey"]["value"]
            .as_str()
            .map(|s| s.to_string()))
    }
}

/// The provider answers with `output` as either an array of `{target}`
/// objects or one bare `{target}` object; both shapes are undocumented
/// upstream, so both are accepted here. Anything else falls back to the
/// original text.
fn extract_translation(body: &serde_json::Value, original: &str) -> String {
    let output = &body["pipelineResponse"]["output"];

    if let Some(entries) = output.as_array() {
        return entries
            .first()
            .and_then(|entry| entry["target"].as_str())
            .unwrap_or(original)
            .to_string();
    }

    output["target"]
        .as_str()
        .unwrap_or(original)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_shaped_output() {
        let body = json!({
            "pipelineResponse": {
                "output": [{ "source": "hello", "target": "नमस्ते" }]
            }
        });
        assert_eq!(extract_translation(&body, "hello"), "नमस्ते");
    }

    #[test]
    fn object_shaped_output() {
        let body = json!({
            "pipelineResponse": {
                "output": { "source": "hello", "target": "नमस्ते" }
            }
        });
        assert_eq!(extract_translation(&body, "hello"), "नमस्ते");
    }

    #[test]
    fn unrecognized_shape_returns_original_text() {
        assert_eq!(extract_translation(&json!({}), "hello"), "hello");
        assert_eq!(
            extract_translation(&json!({"pipelineResponse": {"output": 42}}), "hello"),
            "hello"
        );
        assert_eq!(
            extract_translation(&json!({"pipelineResponse": {"output": []}}), "hello"),
            "hello"
        );
    }

    #[tokio::test]
    async fn token_cache_get_after_store() {
        let cache = TokenCache::new();
        assert_eq!(cache.cached().await, None);
        cache.store("tok".to_string()).await;
        assert_eq!(cache.cached().await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn preseeded_cache_skips_the_fetch() {
        let cache = TokenCache::with_token("seeded");
        let service = TranslatorService::new(
            Some("key".to_string()),
            Some("user".to_string()),
            cache,
        );
        assert_eq!(service.auth_token().await.as_deref(), Some("seeded"));
    }

    #[tokio::test]
    async fn missing_credentials_are_not_configured() {
        let service = TranslatorService::new(None, None, TokenCache::new());
        assert!(matches!(
            service.translate("hello", "en", "hi").await,
            Err(CropsightError::NotConfigured(_))
        ));
    }
}
