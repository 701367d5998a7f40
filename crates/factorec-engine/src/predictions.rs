//! Prediction cache builder
//!
//! Reconstructs the full rating matrix once at train time and records which
//! items every user already interacted with.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matrix::BuiltMatrix;
use crate::trainer::Factorization;

pub const MIN_RATING: f32 = 1.0;
pub const MAX_RATING: f32 = 5.0;

/// Precomputed predictions and seen sets for one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionCache {
    /// Predicted ratings, n_users x n_items, within [1, 5]
    pub predictions: Array2<f32>,
    /// External user id -> external item ids seen during training
    pub user_seen_items: BTreeMap<i64, BTreeSet<i64>>,
}

/// Rescale a normalized score back onto the rating scale
pub fn rescale(score: f32) -> f32 {
    (4.0 * score + 1.0).clamp(MIN_RATING, MAX_RATING)
}

pub fn precompute(factorization: &Factorization, built: &BuiltMatrix) -> PredictionCache {
    let predictions = factorization.w.dot(&factorization.h).mapv(rescale);

    let mut user_seen_items: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for interaction in &built.interactions {
        user_seen_items
            .entry(interaction.user_id)
            .or_default()
            .insert(interaction.item_id);
    }

    debug!(
        "Precomputed {:?} predictions for {} users with history",
        predictions.dim(),
        user_seen_items.len()
    );

    PredictionCache {
        predictions,
        user_seen_items,
    }
}
