// src/services/advisor.rs
use crate::errors::CropsightError;
use crate::models::{ChatContext, ChatMessage, ChatRequest, Role};
use log::error;
use reqwest::Client;
use serde_json::json;

const CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const CHAT_MODEL: &str = "llama-3.3-70b-versatile";

/// Canned reply when the provider response carries no usable text.
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't process that.";

/// Relay to the chat-completion provider. Composes the agronomy system
/// prompt, conversation history and the new message into one request.
pub struct AdvisorService {
    api_key: Option<String>,
    client: Client,
}

impl AdvisorService {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: Client::new(),
        }
    }

    pub async fn reply(&self, request: &ChatRequest) -> Result<String, CropsightError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CropsightError::NotConfigured("chat"))?;

        let messages = build_messages(&request.context, &request.history, &request.message);

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&json!({
                "model": CHAT_MODEL,
                "messages": messages,
                "temperature": 0.7,
                "max_tokens": 200,
            }))
            .send()
            .await
            .map_err(|e| CropsightError::Provider(format!("Chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Chat provider error ({}): {}", status, body);
            return Err(CropsightError::Provider(format!(
                "Chat provider returned {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CropsightError::Provider(format!("Malformed chat response: {}", e)))?;

        Ok(extract_reply(&body))
    }
}

/// First choice's text, or the canned fallback when the shape is off.
fn extract_reply(body: &serde_json::Value) -> String {
    body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or(FALLBACK_REPLY)
        .to_string()
}

fn build_messages(
    context: &ChatContext,
    history: &[ChatMessage],
    message: &str,
) -> Vec<serde_json::Value> {
    let mut messages = vec![json!({
        "role": "system",
        "content": system_prompt(context),
    })];

    for entry in history {
        let role = match entry.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        messages.push(json!({ "role": role, "content": entry.content }));
    }

    messages.push(json!({ "role": "user", "content": message }));
    messages
}

fn system_prompt(context: &ChatContext) -> String {
    let mut prompt = String::from(
        "You are an expert agricultural AI assistant specialized in crop disease \
         management and farming advice.\n\
         \n\
         Your role:\n\
         - Provide SHORT, BRIEF, and RELEVANT answers (2-3 sentences max)\n\
         - Focus on ACTIONABLE advice for farmers\n\
         - Discuss crop diseases, treatments, prevention, and organic solutions\n\
         - Suggest appropriate fertilization schedules and pest control\n\
         - Provide weather-based farming recommendations\n\
         \n\
         Context:\n",
    );

    if let Some(location) = context.location {
        prompt.push_str(&format!(
            "- Farmer location: {}, {}\n",
            location.lat, location.lng
        ));
    }
    if !context.recent_detections.is_empty() {
        prompt.push_str(&format!(
            "- Recent disease detections: {}\n",
            context.recent_detections.join(", ")
        ));
    }

    prompt.push_str(
        "\nGuidelines:\n\
         - Keep answers under 50 words when possible\n\
         - Be practical and farmer-friendly\n\
         - Avoid overly technical jargon\n\
         - Provide specific solutions, not general advice",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use serde_json::json;

    #[test]
    fn reply_comes_from_first_choice() {
        let body = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Spray neem oil weekly."}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        });
        assert_eq!(extract_reply(&body), "Spray neem oil weekly.");
    }

    #[test]
    fn malformed_response_yields_fallback() {
        assert_eq!(extract_reply(&json!({})), FALLBACK_REPLY);
        assert_eq!(extract_reply(&json!({"choices": []})), FALLBACK_REPLY);
        assert_eq!(
            extract_reply(&json!({"choices": [{"message": {}}]})),
            FALLBACK_REPLY
        );
    }

    #[test]
    fn prompt_embeds_context_only_when_present() {
        let empty = system_prompt(&ChatContext::default());
        assert!(!empty.contains("Farmer location"));
        assert!(!empty.contains("Recent disease detections"));

        let full = system_prompt(&ChatContext {
            location: Some(GeoPoint { lat: 12.9, lng: 77.6 }),
            recent_detections: vec!["Leaf Blight".to_string(), "Rust".to_string()],
        });
        assert!(full.contains("Farmer location: 12.9, 77.6"));
        assert!(full.contains("Recent disease detections: Leaf Blight, Rust"));
    }

    #[test]
    fn history_sits_between_system_prompt_and_new_message() {
        let history = vec![
            ChatMessage {
                id: "1".to_string(),
                role: Role::User,
                content: "My tomato leaves have spots".to_string(),
                timestamp: 1,
            },
            ChatMessage {
                id: "2".to_string(),
                role: Role::Assistant,
                content: "Likely early blight.".to_string(),
                timestamp: 2,
            },
        ];
        let messages = build_messages(&ChatContext::default(), &history, "What should I spray?");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "What should I spray?");
    }
}
