//! Factorec Engine - Matrix Builder
//!
//! Pivots interaction records into a dense user x item rating matrix with
//! bidirectional ID <-> index mappings. Repeated (user, item) pairs are
//! averaged and oversized inputs are down-sampled with a fixed seed.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    time::Instant,
};

use ndarray::Array2;
use rand::{rngs::StdRng, seq::index, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::MatrixConfig;
use crate::interaction::{Interaction, InteractionRecord};
use factorec_common::{FactorecError, Result};

/// Bijection between external IDs and dense indices `0..len`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<i64>", into = "Vec<i64>")]
pub struct IdIndex {
    ids: Vec<i64>,
    positions: HashMap<i64, usize>,
}

impl IdIndex {
    /// Build from distinct IDs; index order follows iteration order
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut index = Self {
            ids: Vec::new(),
            positions: HashMap::new(),
        };
        for id in ids {
            if !index.positions.contains_key(&id) {
                index.positions.insert(id, index.ids.len());
                index.ids.push(id);
            }
        }
        index
    }

    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn id_at(&self, index: usize) -> Option<i64> {
        self.ids.get(index).copied()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<Vec<i64>> for IdIndex {
    fn from(ids: Vec<i64>) -> Self {
        Self::from_ids(ids)
    }
}

impl From<IdIndex> for Vec<i64> {
    fn from(index: IdIndex) -> Self {
        index.ids
    }
}

/// Dense user x item rating matrix; 0.0 marks "no rating"
#[derive(Debug, Clone, PartialEq)]
pub struct RatingMatrix {
    pub ratings: Array2<f32>,
    pub users: IdIndex,
    pub items: IdIndex,
}

impl RatingMatrix {
    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Rating for external IDs, 0.0 when unrated or unknown
    pub fn get(&self, user_id: i64, item_id: i64) -> f32 {
        match (self.users.index_of(user_id), self.items.index_of(item_id)) {
            (Some(u), Some(i)) => self.ratings[[u, i]],
            _ => 0.0,
        }
    }
}

/// Output of one build: the matrix plus the interactions it was built from
#[derive(Debug, Clone)]
pub struct BuiltMatrix {
    pub matrix: RatingMatrix,
    /// Validated interactions after sampling, in original relative order
    pub interactions: Vec<Interaction>,
    /// Record count before sampling
    pub input_count: usize,
}

/// Builds rating matrices from raw interaction records
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    config: MatrixConfig,
}

impl MatrixBuilder {
    pub fn new(config: MatrixConfig) -> Self {
        Self { config }
    }

    /// Validate, sample, aggregate and pivot `records`
    #[instrument(level = "debug", skip(self, records), fields(records = records.len()))]
    pub fn build(&self, records: &[InteractionRecord]) -> Result<BuiltMatrix> {
        let start = Instant::now();

        if records.is_empty() {
            return Err(FactorecError::Validation(
                "No interaction records available for training".to_string(),
            ));
        }

        let validated = validate(records)?;
        let input_count = validated.len();
        let interactions = self.sample(validated);

        // (sum, count) per pair; BTreeMap keeps pivot order deterministic
        let mut cells: BTreeMap<(i64, i64), (f64, u32)> = BTreeMap::new();
        for interaction in &interactions {
            let cell = cells
                .entry((interaction.user_id, interaction.item_id))
                .or_insert((0.0, 0));
            cell.0 += f64::from(interaction.rating);
            cell.1 += 1;
        }

        let user_ids: BTreeSet<i64> = interactions.iter().map(|i| i.user_id).collect();
        let item_ids: BTreeSet<i64> = interactions.iter().map(|i| i.item_id).collect();
        let users = IdIndex::from_ids(user_ids);
        let items = IdIndex::from_ids(item_ids);

        let mut ratings = Array2::<f32>::zeros((users.len(), items.len()));
        for ((user_id, item_id), (sum, count)) in &cells {
            if let (Some(u), Some(i)) = (users.index_of(*user_id), items.index_of(*item_id)) {
                ratings[[u, i]] = (sum / f64::from(*count)) as f32;
            }
        }

        debug!(
            "📊 Aggregated {} interactions into {} distinct pairs",
            interactions.len(),
            cells.len()
        );
        info!(
            "✅ Rating matrix {} users x {} items built in {:?}",
            users.len(),
            items.len(),
            start.elapsed()
        );

        Ok(BuiltMatrix {
            matrix: RatingMatrix {
                ratings,
                users,
                items,
            },
            interactions,
            input_count,
        })
    }

    /// Fixed-seed sample of at most `max_interactions` records
    pub fn sample(&self, interactions: Vec<Interaction>) -> Vec<Interaction> {
        let cap = self.config.max_interactions;
        if interactions.len() <= cap {
            return interactions;
        }

        warn!(
            "⚠️ Limiting training set from {} to {} interactions (seed {})",
            interactions.len(),
            cap,
            self.config.sample_seed
        );

        let mut rng = StdRng::seed_from_u64(self.config.sample_seed);
        let mut picked = index::sample(&mut rng, interactions.len(), cap).into_vec();
        picked.sort_unstable();
        picked.into_iter().map(|i| interactions[i]).collect()
    }
}

fn validate(records: &[InteractionRecord]) -> Result<Vec<Interaction>> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| {
            let missing: Vec<&str> = [
                ("user_id", record.user_id.is_none()),
                ("item_id", record.item_id.is_none()),
                ("rating", record.rating.is_none()),
            ]
            .iter()
            .filter(|(_, absent)| *absent)
            .map(|(name, _)| *name)
            .collect();

            match (record.user_id, record.item_id, record.rating) {
                (Some(user_id), Some(item_id), Some(rating)) if rating.is_finite() => {
                    Ok(Interaction {
                        user_id,
                        item_id,
                        rating: rating as f32,
                    })
                }
                (Some(_), Some(_), Some(rating)) => Err(FactorecError::Validation(format!(
                    "Record {} has a non-finite rating: {}",
                    position, rating
                ))),
                _ => Err(FactorecError::Validation(format!(
                    "Record {} is missing required fields: {}",
                    position,
                    missing.join(", ")
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn builder() -> MatrixBuilder {
        MatrixBuilder::new(MatrixConfig::default())
    }

    fn scenario() -> Vec<InteractionRecord> {
        vec![
            InteractionRecord::rating(1, 10, 5.0),
            InteractionRecord::rating(1, 20, 3.0),
            InteractionRecord::rating(2, 10, 4.0),
            InteractionRecord::rating(2, 30, 5.0),
        ]
    }

    #[test]
    fn test_build_scenario_dimensions() {
        let built = builder().build(&scenario()).unwrap();
        assert_eq!(built.matrix.n_users(), 2);
        assert_eq!(built.matrix.n_items(), 3);
        assert_eq!(built.matrix.users.ids(), &[1, 2]);
        assert_eq!(built.matrix.items.ids(), &[10, 20, 30]);
        assert_eq!(built.matrix.get(1, 10), 5.0);
        assert_eq!(built.matrix.get(1, 30), 0.0);
        assert_eq!(built.matrix.get(2, 30), 5.0);
    }

    #[test]
    fn test_duplicates_are_averaged() {
        let records = vec![
            InteractionRecord::rating(1, 10, 5.0),
            InteractionRecord::rating(1, 10, 2.0),
            InteractionRecord::rating(2, 20, 4.0),
        ];
        let built = builder().build(&records).unwrap();
        assert_eq!(built.matrix.get(1, 10), 3.5);
        assert_eq!(built.matrix.n_items(), 2);
    }

    #[test]
    fn test_empty_input_is_validation_error() {
        let err = builder().build(&[]).unwrap_err();
        assert!(matches!(err, FactorecError::Validation(_)));
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let mut records = scenario();
        records[2].rating = None;
        records[2].item_id = None;
        match builder().build(&records).unwrap_err() {
            FactorecError::Validation(msg) => {
                assert!(msg.contains("Record 2"));
                assert!(msg.contains("item_id"));
                assert!(msg.contains("rating"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let records: Vec<_> = (0..10_000)
            .map(|i| InteractionRecord::rating(i % 97, i % 89, f64::from((i % 5) as i32 + 1)))
            .collect();
        let first = builder().build(&records).unwrap();
        let second = builder().build(&records).unwrap();

        assert_eq!(first.input_count, 10_000);
        assert_eq!(first.interactions.len(), 5_000);
        assert_eq!(first.interactions, second.interactions);
        assert_eq!(first.matrix, second.matrix);
    }

    #[test]
    fn test_different_seed_changes_sample() {
        let interactions: Vec<_> = (0..1_000)
            .map(|i| Interaction {
                user_id: i,
                item_id: i,
                rating: 3.0,
            })
            .collect();
        let a = MatrixBuilder::new(MatrixConfig {
            max_interactions: 100,
            sample_seed: 1,
        })
        .sample(interactions.clone());
        let b = MatrixBuilder::new(MatrixConfig {
            max_interactions: 100,
            sample_seed: 2,
        })
        .sample(interactions);
        assert_eq!(a.len(), 100);
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_index_round_trips_through_serde() {
        let index = IdIndex::from_ids(vec![30, 10, 20, 10]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.index_of(20), Some(2));

        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, "[30,10,20]");
        let restored: IdIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, index);
        assert_eq!(restored.id_at(1), Some(10));
    }
}
