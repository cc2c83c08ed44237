// src/services/store.rs
use crate::errors::CropsightError;
use crate::models::*;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;

const DETECTIONS_KEY: &str = "cropsight:detections";
const CHAT_KEY: &str = "cropsight:chat";
const PREFERENCES_KEY: &str = "cropsight:preferences";

pub const DETECTION_CAP: usize = 50;
pub const CHAT_CAP: usize = 100;

const DAY_SECS: usize = 24 * 60 * 60;
const DETECTIONS_TTL: usize = 365 * DAY_SECS;
const CHAT_TTL: usize = 30 * DAY_SECS;
const PREFERENCES_TTL: usize = 365 * DAY_SECS;

/// History store over three fixed partitions: detections (newest first,
/// capped at 50), chat (oldest first, capped at 100) and preferences. Each
/// partition is one JSON blob under its own key; every write is a full
/// read-modify-write with the partition TTL refreshed, so across concurrent
/// writers the last one wins.
pub struct HistoryStore {
    client: Client,
}

impl HistoryStore {
    pub async fn new(redis_url: &str) -> Result<Self, CropsightError> {
        let client = Client::open(redis_url).map_err(|e| CropsightError::Storage(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| CropsightError::Storage(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| CropsightError::Storage(e.to_string()))?;

        Ok(Self { client })
    }

    pub async fn detection_history(&self) -> Result<Vec<DetectionResult>, CropsightError> {
        self.read_partition(DETECTIONS_KEY).await
    }

    pub async fn save_detection(&self, result: DetectionResult) -> Result<(), CropsightError> {
        let mut history = self.detection_history().await?;
        prepend_capped(&mut history, result, DETECTION_CAP);
        self.write_partition(DETECTIONS_KEY, &history, DETECTIONS_TTL)
            .await
    }

    pub async fn clear_detections(&self) -> Result<(), CropsightError> {
        self.delete_partition(DETECTIONS_KEY).await
    }

    pub async fn chat_history(&self) -> Result<Vec<ChatMessage>, CropsightError> {
        self.read_partition(CHAT_KEY).await
    }

    pub async fn save_chat_message(&self, message: ChatMessage) -> Result<(), CropsightError> {
        let mut history = self.chat_history().await?;
        append_capped(&mut history, message, CHAT_CAP);
        self.write_partition(CHAT_KEY, &history, CHAT_TTL).await
    }

    pub async fn clear_chat(&self) -> Result<(), CropsightError> {
        self.delete_partition(CHAT_KEY).await
    }

    pub async fn preferences(&self) -> Result<UserPreferences, CropsightError> {
        self.read_partition(PREFERENCES_KEY).await
    }

    pub async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), CropsightError> {
        self.write_partition(PREFERENCES_KEY, prefs, PREFERENCES_TTL)
            .await
    }

    async fn read_partition<T: DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<T, CropsightError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| CropsightError::Storage(e.to_string()))?;

        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| CropsightError::Storage(e.to_string()))?;

        Ok(decode_or_default(raw.as_deref()))
    }

    async fn write_partition<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: usize,
    ) -> Result<(), CropsightError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| CropsightError::Storage(e.to_string()))?;

        let payload = serde_json::to_string(value)
            .map_err(|e| CropsightError::Serialization(e.to_string()))?;

        conn.set_ex::<_, _, ()>(key, payload, ttl_secs)
            .await
            .map_err(|e| CropsightError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn delete_partition(&self, key: &str) -> Result<(), CropsightError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| CropsightError::Storage(e.to_string()))?;

        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CropsightError::Storage(e.to_string()))?;

        Ok(())
    }
}

/// An absent or unparseable partition reads as the default value. Corrupt
/// payloads are indistinguishable from "no data"; they never surface as
/// errors.
pub fn decode_or_default<T: DeserializeOwned + Default>(raw: Option<&str>) -> T {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Newest entry goes in front; the oldest entries fall off the end.
pub fn prepend_capped<T>(history: &mut Vec<T>, entry: T, cap: usize) {
    history.insert(0, entry);
    history.truncate(cap);
}

/// Newest entry goes at the tail; the oldest entries fall off the front.
pub fn append_capped<T>(history: &mut Vec<T>, entry: T, cap: usize) {
    history.push(entry);
    if history.len() > cap {
        let excess = history.len() - cap;
        history.drain(..excess);
    }
}
