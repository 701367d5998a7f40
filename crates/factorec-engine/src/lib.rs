//! Factorec Engine
//!
//! Collaborative-filtering recommendation pipeline built on non-negative
//! matrix factorization:
//!
//! - [`fetcher`]: pulls interaction records from the provider
//! - [`matrix`]: pivots records into a dense rating matrix
//! - [`trainer`]: factorizes the matrix by coordinate descent
//! - [`predictions`]: precomputes the reconstructed ratings
//! - [`store`]: persists and caches the active [`artifact::ModelArtifact`]
//! - [`recommender`]: ranks unseen items for a user
//! - [`engine`]: orchestrates retrain and serving
//! - [`scheduler`]: periodic background retrains
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

pub mod artifact;
pub mod config;
pub mod engine;
pub mod fetcher;
pub mod interaction;
pub mod matrix;
pub mod predictions;
pub mod recommender;
pub mod scheduler;
pub mod store;
pub mod trainer;

pub use artifact::{ModelArtifact, ModelMetadata};
pub use config::EngineConfig;
pub use engine::{HealthReport, RecommendationEngine, RetrainParams, RetrainReport, StatsReport};
pub use fetcher::{
    FetchFailure, FetchFailureKind, FetchOutcome, FileInteractionSource, HttpInteractionSource,
    InteractionSource,
};
pub use interaction::{Interaction, InteractionRecord};
pub use recommender::{RecommendOutcome, RecommendationSet, ScoredItem};
pub use scheduler::RetrainScheduler;
pub use store::{CacheStatus, ModelStore};
