//! Recommendation serving
//!
//! Ranks the unseen items of one user by their precomputed predicted rating.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::ModelArtifact;
use crate::config::RecommendConfig;
use factorec_common::{FactorecError, Result};

/// One recommended item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: i64,
    pub predicted_rating: f32,
}

/// Ranked recommendations for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub user_id: i64,
    pub items: Vec<ScoredItem>,
    /// Unseen items before truncation
    pub total_available: usize,
    pub seen_items_count: usize,
}

impl RecommendationSet {
    pub fn item_ids(&self) -> Vec<i64> {
        self.items.iter().map(|item| item.item_id).collect()
    }
}

/// Result of a recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecommendOutcome {
    Recommended(RecommendationSet),
    /// The user has already seen every known item
    NoNewItems { user_id: i64, seen_items_count: usize },
}

#[derive(Debug, Clone)]
pub struct Recommender {
    config: RecommendConfig,
}

impl Recommender {
    pub fn new(config: RecommendConfig) -> Self {
        Self { config }
    }

    /// Requested count clamped into `[1, max_top_n]`
    pub fn clamp_top_n(&self, requested: Option<usize>) -> usize {
        let max = self.config.max_top_n.max(1);
        requested
            .unwrap_or(self.config.default_top_n)
            .clamp(1, max)
    }

    pub fn recommend(
        &self,
        artifact: &ModelArtifact,
        user_id: i64,
        top_n: Option<usize>,
    ) -> Result<RecommendOutcome> {
        let user_index = artifact
            .users
            .index_of(user_id)
            .ok_or(FactorecError::UnknownUser(user_id))?;
        let top_n = self.clamp_top_n(top_n);

        let seen = artifact.seen_items(user_id);
        let seen_items_count = seen.map(|s| s.len()).unwrap_or(0);

        let mut candidates: Vec<(usize, f32)> = artifact
            .predictions
            .row(user_index)
            .iter()
            .copied()
            .enumerate()
            .filter(|(item_index, _)| {
                match (artifact.items.id_at(*item_index), seen) {
                    (Some(item_id), Some(seen)) => !seen.contains(&item_id),
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            })
            .collect();

        if candidates.is_empty() {
            debug!("User {} has no unseen items", user_id);
            return Ok(RecommendOutcome::NoNewItems {
                user_id,
                seen_items_count,
            });
        }

        let total_available = candidates.len();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        candidates.truncate(top_n);

        let items = candidates
            .into_iter()
            .filter_map(|(item_index, predicted_rating)| {
                artifact.items.id_at(item_index).map(|item_id| ScoredItem {
                    item_id,
                    predicted_rating,
                })
            })
            .collect();

        Ok(RecommendOutcome::Recommended(RecommendationSet {
            user_id,
            items,
            total_available,
            seen_items_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::tests::scenario_artifact;
    use crate::matrix::IdIndex;
    use ndarray::Array2;
    use std::collections::{BTreeMap, BTreeSet};

    fn recommender() -> Recommender {
        Recommender::new(RecommendConfig::default())
    }

    /// Users 7 and 8 over 25 items; user 7 has seen items 0 and 1
    fn wide_artifact() -> ModelArtifact {
        let mut artifact = scenario_artifact();
        let n_items = 25;
        artifact.users = IdIndex::from_ids([7, 8]);
        artifact.items = IdIndex::from_ids(0..n_items as i64);
        artifact.predictions = Array2::from_shape_fn((2, n_items), |(_, i)| {
            1.0 + (i % 5) as f32
        });
        artifact.user_seen_items = BTreeMap::from([(7, BTreeSet::from([0, 1]))]);
        artifact
    }

    fn expect_set(outcome: RecommendOutcome) -> RecommendationSet {
        match outcome {
            RecommendOutcome::Recommended(set) => set,
            other => panic!("expected recommendations, got {:?}", other),
        }
    }

    #[test]
    fn test_scenario_excludes_seen_items() {
        let artifact = scenario_artifact();
        let set = expect_set(recommender().recommend(&artifact, 1, Some(5)).unwrap());
        assert_eq!(set.item_ids(), vec![30]);
        assert_eq!(set.total_available, 1);
        assert_eq!(set.seen_items_count, 2);
    }

    #[test]
    fn test_unknown_user() {
        let err = recommender()
            .recommend(&scenario_artifact(), 999, None)
            .unwrap_err();
        assert!(matches!(err, FactorecError::UnknownUser(999)));
    }

    #[test]
    fn test_top_n_is_clamped() {
        let r = recommender();
        assert_eq!(r.clamp_top_n(None), 5);
        assert_eq!(r.clamp_top_n(Some(0)), 1);
        assert_eq!(r.clamp_top_n(Some(100)), 20);

        let set = expect_set(r.recommend(&wide_artifact(), 7, Some(100)).unwrap());
        assert_eq!(set.items.len(), 20);
        assert_eq!(set.total_available, 23);
    }

    #[test]
    fn test_ordering_is_descending_with_index_tiebreak() {
        let set = expect_set(recommender().recommend(&wide_artifact(), 7, Some(6)).unwrap());
        // Rating 5.0 sits at indices 4, 9, 14, 19, 24; then 4.0 at 3, 8
        assert_eq!(set.item_ids(), vec![4, 9, 14, 19, 24, 3]);
        assert!(set
            .items
            .windows(2)
            .all(|pair| pair[0].predicted_rating >= pair[1].predicted_rating));
    }

    #[test]
    fn test_user_without_history_sees_everything() {
        let set = expect_set(recommender().recommend(&wide_artifact(), 8, Some(3)).unwrap());
        assert_eq!(set.seen_items_count, 0);
        assert_eq!(set.total_available, 25);
    }

    #[test]
    fn test_no_new_items() {
        let mut artifact = scenario_artifact();
        artifact.user_seen_items.insert(1, BTreeSet::from([10, 20, 30]));
        let outcome = recommender().recommend(&artifact, 1, None).unwrap();
        assert_eq!(
            outcome,
            RecommendOutcome::NoNewItems {
                user_id: 1,
                seen_items_count: 3
            }
        );
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let artifact = scenario_artifact();
        let r = recommender();
        assert_eq!(
            r.recommend(&artifact, 2, Some(3)).unwrap(),
            r.recommend(&artifact, 2, Some(3)).unwrap()
        );
    }
}
