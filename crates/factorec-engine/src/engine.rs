//! Factorec Engine - Recommendation Engine
//!
//! Ties the pipeline together: fetch → build → train → precompute → store
//! on retrain, and store → rank on recommend. The CPU-bound part of a
//! retrain runs on the blocking pool so serving continues from the
//! previously active artifact, which is only replaced after a fully
//! successful run.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::artifact::{ModelArtifact, ModelMetadata};
use crate::config::{EngineConfig, TrainerConfig};
use crate::fetcher::{FetchOutcome, HttpInteractionSource, InteractionSource};
use crate::matrix::MatrixBuilder;
use crate::predictions::precompute;
use crate::recommender::{RecommendOutcome, Recommender};
use crate::store::{CacheStatus, ModelStore};
use crate::trainer::FactorizationTrainer;
use factorec_common::{FactorecError, Result};

/// Accepted range of `max_components` on a retrain request
pub const MAX_COMPONENTS_RANGE: std::ops::RangeInclusive<usize> = 1..=50;

/// Accepted range of `max_iter` on a retrain request
pub const MAX_ITER_RANGE: std::ops::RangeInclusive<usize> = 1..=100;

/// Per-run overrides of the trainer configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrainParams {
    #[serde(default)]
    pub max_components: Option<usize>,
    #[serde(default)]
    pub max_iter: Option<usize>,
}

impl RetrainParams {
    pub fn validate(&self) -> Result<()> {
        if let Some(k) = self.max_components {
            if !MAX_COMPONENTS_RANGE.contains(&k) {
                return Err(FactorecError::Validation(format!(
                    "max_components must be between {} and {}, got {}",
                    MAX_COMPONENTS_RANGE.start(),
                    MAX_COMPONENTS_RANGE.end(),
                    k
                )));
            }
        }
        if let Some(iters) = self.max_iter {
            if !MAX_ITER_RANGE.contains(&iters) {
                return Err(FactorecError::Validation(format!(
                    "max_iter must be between {} and {}, got {}",
                    MAX_ITER_RANGE.start(),
                    MAX_ITER_RANGE.end(),
                    iters
                )));
            }
        }
        Ok(())
    }

    fn apply(&self, base: &TrainerConfig) -> TrainerConfig {
        TrainerConfig {
            max_components: self.max_components.unwrap_or(base.max_components),
            max_iter: self.max_iter.unwrap_or(base.max_iter),
            ..base.clone()
        }
    }
}

/// Summary of a successful retrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainReport {
    /// Records received from the interaction source
    pub interactions_count: usize,
    pub metadata: ModelMetadata,
    pub model_path: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub model_loaded: bool,
    pub model_metadata: Option<ModelMetadata>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub users: usize,
    pub items: usize,
    pub metadata: ModelMetadata,
    pub cache_status: CacheStatus,
}

/// Recommendation engine
pub struct RecommendationEngine {
    config: EngineConfig,
    source: Arc<dyn InteractionSource>,
    store: Arc<ModelStore>,
    recommender: Recommender,
    retrain_lock: Mutex<()>,
}

impl std::fmt::Debug for RecommendationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationEngine")
            .field("source", &self.source.describe())
            .field("store", &self.store)
            .finish()
    }
}

impl RecommendationEngine {
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn InteractionSource>,
        store: Arc<ModelStore>,
    ) -> Self {
        let recommender = Recommender::new(config.recommend.clone());
        Self {
            config,
            source,
            store,
            recommender,
            retrain_lock: Mutex::new(()),
        }
    }

    /// Engine fed by the HTTP provider with a file-backed store
    #[instrument(level = "debug", skip_all)]
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let start = Instant::now();
        info!("🔧 Initializing recommendation engine");

        let source = Arc::new(HttpInteractionSource::new(&config.fetcher)?);
        let store = Arc::new(ModelStore::from_config(&config.store));
        let engine = Self::new(config, source, store);

        info!("✅ Recommendation engine initialized in {:?}", start.elapsed());
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// Preload the persisted artifact; absence is not an error
    #[instrument(level = "debug", skip(self))]
    pub async fn warm_up(&self) -> Result<bool> {
        match self.store.load().await? {
            Some(artifact) => {
                info!(
                    "✅ Loaded model trained at {} ({} users x {} items)",
                    artifact.metadata.trained_at,
                    artifact.n_users(),
                    artifact.n_items()
                );
                Ok(true)
            }
            None => {
                warn!(
                    "⚠️ No trained model at {}; call retrain to create one",
                    self.store.location()
                );
                Ok(false)
            }
        }
    }

    /// Retrain from fresh interactions and swap the active artifact
    #[instrument(level = "debug", skip(self))]
    pub async fn retrain(&self, params: RetrainParams) -> Result<RetrainReport> {
        params.validate()?;

        let _guard = self.retrain_lock.lock().await;
        let start = Instant::now();
        info!("🔄 Retraining model from {}", self.source.describe());

        let result = self.run_retrain(params).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        counter!("factorec_retrains_total", "outcome" => outcome).increment(1);
        histogram!("factorec_retrain_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(report) => info!(
                "✅ Retrain finished in {:?}: {} interactions, rank {}, {} iterations",
                start.elapsed(),
                report.interactions_count,
                report.metadata.rank,
                report.metadata.iterations
            ),
            Err(e) => e.log(),
        }
        result
    }

    async fn run_retrain(&self, params: RetrainParams) -> Result<RetrainReport> {
        let records = match self.source.fetch(self.config.fetcher.max_records).await {
            FetchOutcome::Fetched(records) => records,
            FetchOutcome::Unavailable(failure) => {
                return Err(FactorecError::DataUnavailable(format!(
                    "{} ({})",
                    failure,
                    self.source.describe()
                )));
            }
        };

        if records.is_empty() {
            return Err(FactorecError::Validation(
                "No interactions available for training".to_string(),
            ));
        }

        let interactions_count = records.len();
        debug!("Fetched {} interaction records", interactions_count);

        let matrix_config = self.config.matrix.clone();
        let trainer_config = params.apply(&self.config.trainer);
        let artifact = tokio::task::spawn_blocking(move || -> Result<ModelArtifact> {
            let built = MatrixBuilder::new(matrix_config).build(&records)?;
            let max_iter = trainer_config.max_iter;
            let factorization = FactorizationTrainer::new(trainer_config).train(&built.matrix)?;
            let cache = precompute(&factorization, &built);
            Ok(ModelArtifact::assemble(factorization, cache, built, max_iter))
        })
        .await??;

        let saved = self.store.save(artifact).await?;

        Ok(RetrainReport {
            interactions_count,
            metadata: saved.metadata.clone(),
            model_path: self.store.location(),
            timestamp: Utc::now(),
        })
    }

    /// Top-N unseen items for `user_id`
    #[instrument(level = "debug", skip(self))]
    pub async fn recommend(&self, user_id: i64, top_n: Option<usize>) -> Result<RecommendOutcome> {
        let result = match self.store.load().await {
            Ok(Some(artifact)) => self.recommender.recommend(&artifact, user_id, top_n),
            Ok(None) => Err(FactorecError::NotTrained(
                "no model has been trained yet; call retrain first".to_string(),
            )),
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(RecommendOutcome::Recommended(_)) => "recommended",
            Ok(RecommendOutcome::NoNewItems { .. }) => "no_new_items",
            Err(e) => e.kind(),
        };
        counter!("factorec_recommendations_total", "outcome" => outcome).increment(1);
        result
    }

    /// Liveness plus whether a model can be served; never fails
    pub async fn health(&self) -> HealthReport {
        let model_metadata = match self.store.load().await {
            Ok(artifact) => artifact.map(|artifact| artifact.metadata.clone()),
            Err(e) => {
                warn!("⚠️ Health check could not load model: {}", e);
                None
            }
        };

        HealthReport {
            status: "healthy".to_string(),
            model_loaded: model_metadata.is_some(),
            model_metadata,
            timestamp: Utc::now(),
        }
    }

    pub async fn stats(&self) -> Result<StatsReport> {
        let artifact = self.store.load().await?.ok_or_else(|| {
            FactorecError::NotTrained("no model has been trained yet".to_string())
        })?;

        Ok(StatsReport {
            users: artifact.n_users(),
            items: artifact.n_items(),
            metadata: artifact.metadata.clone(),
            cache_status: self.store.cache_status().await,
        })
    }
}
