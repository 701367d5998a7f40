//! Factorec Engine - Factorization Trainer
//!
//! Non-negative matrix factorization of the normalized rating matrix by
//! coordinate descent on the Frobenius loss, with elastic-net penalties on
//! both factors and a rank that adapts to the matrix size.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::time::Instant;

use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::TrainerConfig;
use crate::matrix::RatingMatrix;
use factorec_common::{FactorecError, Result};

/// Trained factors plus run diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factorization {
    /// User factors, n_users x rank
    pub w: Array2<f32>,
    /// Item factors, rank x n_items
    pub h: Array2<f32>,
    pub rank: usize,
    pub iterations: usize,
    /// Mean squared error of W·H against the normalized matrix
    pub reconstruction_mse: f32,
}

/// Coordinate-descent NMF trainer
#[derive(Debug, Clone)]
pub struct FactorizationTrainer {
    config: TrainerConfig,
}

impl FactorizationTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Rank used for an `n_users` x `n_items` matrix
    pub fn rank_for(&self, n_users: usize, n_items: usize) -> usize {
        self.config
            .max_components
            .min(n_users.min(n_items).saturating_sub(1))
            .max(1)
    }

    #[instrument(level = "debug", skip_all, fields(users = matrix.n_users(), items = matrix.n_items()))]
    pub fn train(&self, matrix: &RatingMatrix) -> Result<Factorization> {
        let start = Instant::now();
        let (n_users, n_items) = (matrix.n_users(), matrix.n_items());

        if n_users < 2 || n_items < 2 {
            return Err(FactorecError::Training(format!(
                "Need at least 2 users and 2 items, got {} users and {} items",
                n_users, n_items
            )));
        }

        let cells = n_users.checked_mul(n_items).unwrap_or(usize::MAX);
        if cells > self.config.max_matrix_cells {
            return Err(FactorecError::ResourceExhausted(format!(
                "Rating matrix of {} x {} exceeds the budget of {} cells",
                n_users, n_items, self.config.max_matrix_cells
            )));
        }

        let rank = self.rank_for(n_users, n_items);
        info!(
            "🔧 Training NMF: {} users x {} items, rank {}, max_iter {}",
            n_users, n_items, rank, self.config.max_iter
        );

        let x = normalize(&matrix.ratings);
        let xt = x.t().to_owned();
        let (mut w, mut ht) = self.initialize(&x, rank);

        let penalties = Penalties::new(&self.config, n_users, n_items);
        let mut violation_init = 0.0_f64;
        let mut iterations = 0;
        let mut converged = false;

        for n_iter in 1..=self.config.max_iter.max(1) {
            iterations = n_iter;
            let mut violation =
                update_coordinate_descent(&x, &mut w, &ht, penalties.l1_w, penalties.l2_w);
            violation +=
                update_coordinate_descent(&xt, &mut ht, &w, penalties.l1_h, penalties.l2_h);

            if n_iter == 1 {
                violation_init = violation;
            }
            if violation_init == 0.0 || violation / violation_init <= f64::from(self.config.tol) {
                converged = true;
                break;
            }
        }

        if !converged {
            debug!("Iteration budget of {} exhausted before convergence", iterations);
        }

        let h = ht.t().to_owned();
        let reconstruction = w.dot(&h);
        let reconstruction_mse = (&x - &reconstruction)
            .mapv(|d| d * d)
            .mean()
            .unwrap_or(0.0);

        if !reconstruction_mse.is_finite() {
            warn!("⚠️ Factorization diverged (mse {})", reconstruction_mse);
            return Err(FactorecError::Training(
                "Factorization produced non-finite values".to_string(),
            ));
        }

        info!(
            "✅ NMF trained in {:?}: {} iterations, mse {:.6}",
            start.elapsed(),
            iterations,
            reconstruction_mse
        );

        Ok(Factorization {
            w,
            h,
            rank,
            iterations,
            reconstruction_mse,
        })
    }

    /// Seeded non-negative factors scaled to the data mean; returns (W, Hᵀ)
    fn initialize(&self, x: &Array2<f32>, rank: usize) -> (Array2<f32>, Array2<f32>) {
        let (n_users, n_items) = x.dim();
        let mean = x.mean().unwrap_or(0.0).max(0.0);
        let scale = (mean / rank as f32).sqrt();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let h = Array2::from_shape_simple_fn((rank, n_items), || scale * rng.gen::<f32>());
        let w = Array2::from_shape_simple_fn((n_users, rank), || scale * rng.gen::<f32>());
        (w, h.t().to_owned())
    }
}

/// Map ratings from [1, 5] onto [0, 1]; unrated zeros land at 0
pub fn normalize(ratings: &Array2<f32>) -> Array2<f32> {
    ratings.mapv(|r| ((r - 1.0) / 4.0).clamp(0.0, 1.0))
}

#[derive(Debug, Clone, Copy)]
struct Penalties {
    l1_w: f32,
    l2_w: f32,
    l1_h: f32,
    l2_h: f32,
}

impl Penalties {
    fn new(config: &TrainerConfig, n_users: usize, n_items: usize) -> Self {
        let l1_ratio = config.l1_ratio.clamp(0.0, 1.0);
        let (n_users, n_items) = (n_users as f32, n_items as f32);
        Self {
            l1_w: n_items * config.alpha_w * l1_ratio,
            l2_w: n_items * config.alpha_w * (1.0 - l1_ratio),
            l1_h: n_users * config.alpha_h * l1_ratio,
            l2_h: n_users * config.alpha_h * (1.0 - l1_ratio),
        }
    }
}

/// One sweep over every coordinate of `w` for `x ≈ w · htᵀ`.
///
/// Returns the projected-gradient violation accumulated over the sweep.
fn update_coordinate_descent(
    x: &Array2<f32>,
    w: &mut Array2<f32>,
    ht: &Array2<f32>,
    l1: f32,
    l2: f32,
) -> f64 {
    let rank = w.ncols();

    let mut hht = ht.t().dot(ht);
    if l2 != 0.0 {
        hht.diag_mut().mapv_inplace(|d| d + l2);
    }
    let mut xht = x.dot(ht);
    if l1 != 0.0 {
        xht.mapv_inplace(|v| v - l1);
    }

    let mut violation = 0.0_f64;
    for t in 0..rank {
        let hess = hht[[t, t]];
        for (i, mut row) in w.axis_iter_mut(Axis(0)).enumerate() {
            let mut grad = -xht[[i, t]];
            for r in 0..rank {
                grad += row[r] * hht[[r, t]];
            }

            let projected = if row[t] == 0.0 { grad.min(0.0) } else { grad };
            violation += f64::from(projected.abs());

            if hess != 0.0 {
                row[t] = (row[t] - grad / hess).max(0.0);
            }
        }
    }
    violation
}
