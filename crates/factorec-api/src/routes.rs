//! API routes for Factorec
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::time::Duration;

use axum::{
    extract::MatchedPath,
    http::{header, Method, Request},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/recommend",
            get(handlers::recommend_query).post(handlers::recommend_json),
        )
        .route("/retrain", post(handlers::retrain))
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let path = match request.extensions().get::<MatchedPath>() {
                    Some(path) => path.as_str(),
                    None => request.uri().path(),
                };
                tracing::info_span!("http_request", method = %request.method(), %path)
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .max_age(Duration::from_secs(86400)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorResponse;
    use crate::handlers::{RecommendResponse, RetrainResponse};
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        response::Response,
    };
    use factorec_engine::{
        store::{FileArtifactStorage, ManualClock, ModelCache, ModelStore},
        EngineConfig, FileInteractionSource, InteractionRecord, RecommendationEngine,
    };
    use serde::de::DeserializeOwned;
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn app_with_export(records: Option<&[InteractionRecord]>) -> (Router, TempDir) {
        let dir = tempdir().unwrap();
        let export = dir.path().join("interactions.json");
        if let Some(records) = records {
            std::fs::write(&export, serde_json::to_vec(records).unwrap()).unwrap();
        }

        let engine = RecommendationEngine::new(
            EngineConfig::default(),
            Arc::new(FileInteractionSource::new(export)),
            Arc::new(ModelStore::new(
                Arc::new(FileArtifactStorage::new(dir.path().join("model.bin"))),
                ModelCache::new(Duration::from_secs(3600), Arc::new(ManualClock::new())),
            )),
        );
        (create_router(AppState::new(Arc::new(engine))), dir)
    }

    fn scenario() -> Vec<InteractionRecord> {
        vec![
            InteractionRecord::rating(1, 10, 5.0),
            InteractionRecord::rating(1, 20, 3.0),
            InteractionRecord::rating(2, 10, 4.0),
            InteractionRecord::rating(2, 30, 5.0),
        ]
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index_endpoint() {
        let (app, _dir) = app_with_export(None);
        let response = send(&app, get_request("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response).await;
        assert!(body["endpoints"]["/recommend"].is_string());
    }

    #[tokio::test]
    async fn test_health_without_model() {
        let (app, _dir) = app_with_export(None);
        let response = send(&app, get_request("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], false);
    }

    #[tokio::test]
    async fn test_recommend_before_training() {
        let (app, _dir) = app_with_export(None);
        let response = send(&app, get_request("/recommend?user_id=1")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "not_trained");

        let response = send(&app, get_request("/stats")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recommend_rejects_bad_input() {
        let (app, _dir) = app_with_export(None);

        let response = send(&app, get_request("/recommend")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "bad_request");

        let response = send(&app, get_request("/recommend?user_id=abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, post_request("/recommend", "not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, post_request("/recommend", r#"{"user_id": 1, "top_n": -2}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_retrain_then_recommend() {
        let records = scenario();
        let (app, _dir) = app_with_export(Some(&records));

        let response = send(&app, post_request("/retrain", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let retrain: RetrainResponse = body_json(response).await;
        assert_eq!(retrain.interactions_count, 4);
        assert_eq!(retrain.model_metadata.n_users, 2);
        assert_eq!(retrain.model_metadata.n_items, 3);

        let response = send(&app, get_request("/recommend?user_id=1&top_n=5")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: RecommendResponse = body_json(response).await;
        assert_eq!(body.user_id, 1);
        assert!(body.item_ids.iter().all(|id| *id == 30));
        assert_eq!(body.seen_items_count, 2);
        assert!(body
            .predictions
            .values()
            .all(|rating| (1.0..=5.0).contains(rating)));

        let response = send(&app, post_request("/recommend", r#"{"user_id": "2"}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: RecommendResponse = body_json(response).await;
        assert!(body.item_ids.iter().all(|id| *id == 20));

        let response = send(&app, get_request("/recommend?user_id=99")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "unknown_user");

        let response = send(&app, get_request("/stats")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response).await;
        assert_eq!(body["users"], 2);
        assert_eq!(body["items"], 3);
        assert_eq!(body["cache_status"]["cached"], true);

        let body: Value = body_json(send(&app, get_request("/health")).await).await;
        assert_eq!(body["model_loaded"], true);
    }

    #[tokio::test]
    async fn test_retrain_parameter_validation() {
        let records = scenario();
        let (app, _dir) = app_with_export(Some(&records));

        let response = send(&app, post_request("/retrain", r#"{"max_components": 51}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "validation_error");

        let response = send(&app, post_request("/retrain", r#"{"max_iter": "many"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, post_request("/retrain", r#"{"max_components": 2, "max_iter": 10}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: RetrainResponse = body_json(response).await;
        assert_eq!(body.model_metadata.max_iter, 10);
    }

    #[tokio::test]
    async fn test_retrain_failures_map_to_status() {
        let (app, _dir) = app_with_export(None);
        let response = send(&app, post_request("/retrain", "")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "data_unavailable");

        let (app, _dir) = app_with_export(Some(&[]));
        let response = send(&app, post_request("/retrain", "")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let single = [InteractionRecord::rating(1, 10, 4.0)];
        let (app, _dir) = app_with_export(Some(&single));
        let response = send(&app, post_request("/retrain", "")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "training_error");
    }
}
