//! Scheduled retraining for Factorec
//!
//! Periodically retrains the active model in the background
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::{sync::Arc, time::Duration};
use tokio::time;
use tracing::{error, info, instrument};

use crate::config::ScheduleConfig;
use crate::engine::{RecommendationEngine, RetrainParams};
use factorec_common::{FactorecError, Result};

/// Manages the periodic retrain task
#[derive(Debug)]
pub struct RetrainScheduler {
    interval: Duration,
    engine: Arc<RecommendationEngine>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl RetrainScheduler {
    pub fn new(config: &ScheduleConfig, engine: Arc<RecommendationEngine>) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            engine,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start the retrain loop
    #[instrument(level = "debug", skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(FactorecError::Internal(
                "Retrain scheduler already running".to_string(),
            ));
        }

        let engine = Arc::clone(&self.engine);
        let interval = self.interval;
        self.handle = Some(tokio::spawn(async move {
            Self::run_scheduled_retrains(engine, interval).await;
        }));

        info!("⏰ Retrain scheduler started (every {:?})", self.interval);
        Ok(())
    }

    /// Stop the retrain loop
    #[instrument(level = "debug", skip(self))]
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            info!("🛑 Retrain scheduler stopped");
        }
    }

    async fn run_scheduled_retrains(engine: Arc<RecommendationEngine>, interval: Duration) {
        let mut interval = time::interval(interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        interval.tick().await; // Skip immediate first tick

        loop {
            interval.tick().await;

            info!("⏰ Running scheduled retrain");
            if let Err(e) = engine.retrain(RetrainParams::default()).await {
                error!("❌ Scheduled retrain failed: {}", e);
            }
        }
    }
}

impl Drop for RetrainScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
