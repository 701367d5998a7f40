//! Request handlers for the Factorec API
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::error::ApiError;
use factorec_engine::{
    HealthReport, ModelMetadata, RecommendOutcome, RecommendationEngine, RetrainParams,
    StatsReport,
};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
}

impl AppState {
    pub fn new(engine: Arc<RecommendationEngine>) -> Self {
        Self { engine }
    }
}

/// Recommendation request, from a query string or a JSON body.
///
/// Fields stay loosely typed so that `"7"` and `7` are both accepted and
/// anything else is reported as a 400 in the standard error shape.
#[derive(Debug, Default, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub top_n: Option<Value>,
}

impl RecommendRequest {
    fn from_query(params: HashMap<String, String>) -> Self {
        Self {
            user_id: params.get("user_id").cloned().map(Value::String),
            top_n: params.get("top_n").cloned().map(Value::String),
        }
    }

    fn user_id(&self) -> Result<i64, ApiError> {
        match &self.user_id {
            Some(value) => parse_integer("user_id", value),
            None => Err(ApiError::bad_request("user_id is required")),
        }
    }

    fn top_n(&self) -> Result<Option<usize>, ApiError> {
        let Some(value) = &self.top_n else {
            return Ok(None);
        };
        let top_n = parse_integer("top_n", value)?;
        usize::try_from(top_n)
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("top_n must not be negative, got {}", top_n)))
    }
}

fn parse_integer(field: &str, value: &Value) -> Result<i64, ApiError> {
    let parsed = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::bad_request(format!("{} must be an integer, got {}", field, value)))
}

/// Recommendation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub item_ids: Vec<i64>,
    /// Item id (as string) -> predicted rating
    pub predictions: BTreeMap<String, f32>,
    pub total_available: usize,
    pub seen_items_count: usize,
}

impl From<RecommendOutcome> for RecommendResponse {
    fn from(outcome: RecommendOutcome) -> Self {
        match outcome {
            RecommendOutcome::Recommended(set) => Self {
                user_id: set.user_id,
                message: None,
                item_ids: set.item_ids(),
                predictions: set
                    .items
                    .iter()
                    .map(|item| (item.item_id.to_string(), item.predicted_rating))
                    .collect(),
                total_available: set.total_available,
                seen_items_count: set.seen_items_count,
            },
            RecommendOutcome::NoNewItems {
                user_id,
                seen_items_count,
            } => Self {
                user_id,
                message: Some("No new items to recommend".to_string()),
                item_ids: Vec::new(),
                predictions: BTreeMap::new(),
                total_available: 0,
                seen_items_count,
            },
        }
    }
}

/// Retrain response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub message: String,
    pub interactions_count: usize,
    pub model_path: String,
    pub model_metadata: ModelMetadata,
    pub timestamp: DateTime<Utc>,
}

/// Service index
pub async fn index() -> Json<Value> {
    Json(json!({
        "service": "Factorec Recommendation Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/recommend": "GET/POST - Recommendations for a user",
            "/retrain": "POST - Retrain the model from fresh interactions",
            "/health": "GET - Service health",
            "/stats": "GET - Active model statistics",
        }
    }))
}

/// `GET /recommend?user_id=..&top_n=..`
pub async fn recommend_query(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<RecommendResponse>, ApiError> {
    recommend(&state, RecommendRequest::from_query(params)).await
}

/// `POST /recommend` with a JSON body
pub async fn recommend_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RecommendResponse>, ApiError> {
    let request: RecommendRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Request body must be a JSON object: {}", e)))?;
    recommend(&state, request).await
}

#[instrument(level = "debug", skip(state))]
async fn recommend(
    state: &AppState,
    request: RecommendRequest,
) -> Result<Json<RecommendResponse>, ApiError> {
    let user_id = request.user_id()?;
    let top_n = request.top_n()?;
    let outcome = state.engine.recommend(user_id, top_n).await?;
    Ok(Json(RecommendResponse::from(outcome)))
}

/// `POST /retrain` with an optional JSON body of overrides
#[instrument(level = "debug", skip_all)]
pub async fn retrain(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RetrainResponse>, ApiError> {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        RetrainParams::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid retrain parameters: {}", e)))?
    };

    info!("🔄 Retrain requested with {:?}", params);
    let report = state.engine.retrain(params).await?;

    Ok(Json(RetrainResponse {
        message: "Model retrained successfully".to_string(),
        interactions_count: report.interactions_count,
        model_path: report.model_path,
        model_metadata: report.metadata,
        timestamp: report.timestamp,
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.engine.health().await)
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsReport>, ApiError> {
    Ok(Json(state.engine.stats().await?))
}
