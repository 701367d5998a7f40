//! Interaction records
//!
//! Wire representation of one user-item interaction as exported by the
//! interaction provider, and the validated form used for training.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const PROVIDER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Interaction record as received from the provider.
///
/// Required fields stay optional here so that a record missing one of them
/// is reported by the matrix builder instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub interaction_type: Option<String>,
    #[serde(default, with = "provider_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl InteractionRecord {
    /// Complete rating record without a timestamp
    pub fn rating(user_id: i64, item_id: i64, rating: f64) -> Self {
        Self {
            user_id: Some(user_id),
            item_id: Some(item_id),
            rating: Some(rating),
            interaction_type: Some("rating".to_string()),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Validated interaction used by the training pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: i64,
    pub item_id: i64,
    pub rating: f32,
}

/// Parse a provider timestamp: `YYYY-MM-DD HH:MM:SS` (UTC) or RFC 3339
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, PROVIDER_TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

mod provider_timestamp {
    use super::{parse_timestamp, PROVIDER_TIMESTAMP_FORMAT};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => {
                serializer.serialize_some(&ts.format(PROVIDER_TIMESTAMP_FORMAT).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    // Unparseable timestamps degrade to "no timestamp".
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    }
}
