//! Factorec Engine - Configuration Module
//!
//! Configuration types for every stage of the recommendation pipeline:
//! interaction fetching, matrix building, factorization, model storage,
//! serving and scheduled retraining.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Interaction provider settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Rating matrix settings
    #[serde(default)]
    pub matrix: MatrixConfig,

    /// Factorization settings
    #[serde(default)]
    pub trainer: TrainerConfig,

    /// Artifact persistence settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Serving settings
    #[serde(default)]
    pub recommend: RecommendConfig,

    /// Periodic retrain settings
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Interaction provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Base URL of the interaction provider
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the JSON export endpoint
    #[serde(default = "default_export_path")]
    pub export_path: String,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Maximum number of records kept from one fetch
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// User agent sent to the provider
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Rating matrix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Records above this count are down-sampled
    #[serde(default = "default_max_interactions")]
    pub max_interactions: usize,

    /// Seed of the down-sampling RNG
    #[serde(default = "default_seed")]
    pub sample_seed: u64,
}

/// Factorization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Upper bound on the factorization rank
    #[serde(default = "default_max_components")]
    pub max_components: usize,

    /// Iteration budget
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Relative stopping tolerance on the projected gradient
    #[serde(default = "default_tol")]
    pub tol: f32,

    /// Regularization strength on W
    #[serde(default = "default_alpha")]
    pub alpha_w: f32,

    /// Regularization strength on H
    #[serde(default = "default_alpha")]
    pub alpha_h: f32,

    /// Share of the penalty that is L1 (0.0 = pure L2)
    #[serde(default)]
    pub l1_ratio: f32,

    /// Seed of the factor initialization
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Largest user x item matrix the trainer will allocate
    #[serde(default = "default_max_matrix_cells")]
    pub max_matrix_cells: usize,
}

/// Artifact persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Location of the serialized model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// In-process cache time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Serving configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    /// Count used when the caller does not ask for one
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// Hard upper bound on returned recommendations
    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,
}

/// Periodic retrain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether scheduled retraining is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Interval between retrains in seconds
    #[serde(default = "default_schedule_interval_secs")]
    pub interval_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_export_path() -> String {
    "/api/interactions/export-json".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_max_records() -> usize {
    10_000
}

fn default_user_agent() -> String {
    format!("factorec/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_interactions() -> usize {
    5_000
}

fn default_seed() -> u64 {
    42
}

fn default_max_components() -> usize {
    10
}

fn default_max_iter() -> usize {
    30
}

fn default_tol() -> f32 {
    1e-4
}

fn default_alpha() -> f32 {
    0.01
}

fn default_max_matrix_cells() -> usize {
    25_000_000
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/recommendation_model.bin")
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_top_n() -> usize {
    5
}

fn default_max_top_n() -> usize {
    20
}

fn default_schedule_interval_secs() -> u64 {
    3600
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            export_path: default_export_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            max_records: default_max_records(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetcherConfig {
    /// Full URL of the export endpoint
    pub fn export_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.export_path.trim_start_matches('/')
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            max_interactions: default_max_interactions(),
            sample_seed: default_seed(),
        }
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_components: default_max_components(),
            max_iter: default_max_iter(),
            tol: default_tol(),
            alpha_w: default_alpha(),
            alpha_h: default_alpha(),
            l1_ratio: 0.0,
            seed: default_seed(),
            max_matrix_cells: default_max_matrix_cells(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl StoreConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            default_top_n: default_top_n(),
            max_top_n: default_max_top_n(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_schedule_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.matrix.max_interactions, 5_000);
        assert_eq!(config.matrix.sample_seed, 42);
        assert_eq!(config.trainer.max_components, 10);
        assert_eq!(config.trainer.max_iter, 30);
        assert_eq!(config.trainer.alpha_w, 0.01);
        assert_eq!(config.store.cache_ttl_secs, 3600);
        assert_eq!(config.recommend.max_top_n, 20);
        assert!(!config.schedule.enabled);
    }

    #[test]
    fn test_export_url_joins_cleanly() {
        let config = FetcherConfig {
            base_url: "http://provider:8000/".to_string(),
            ..FetcherConfig::default()
        };
        assert_eq!(
            config.export_url(),
            "http://provider:8000/api/interactions/export-json"
        );
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"trainer": {"max_components": 4}}"#).unwrap();
        assert_eq!(config.trainer.max_components, 4);
        assert_eq!(config.trainer.max_iter, 30);
        assert_eq!(config.fetcher.connect_timeout(), Duration::from_secs(5));
    }
}
