//! Factorec Engine - Model Artifact
//!
//! The persisted unit of a trained model. On disk an artifact is the
//! 4-byte magic `FREC`, a little-endian `u32` format version and a bincode
//! payload. Artifacts are immutable once assembled.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::matrix::{BuiltMatrix, IdIndex};
use crate::predictions::PredictionCache;
use crate::trainer::Factorization;
use factorec_common::{FactorecError, Result};

/// File magic of serialized artifacts
pub const ARTIFACT_MAGIC: [u8; 4] = *b"FREC";

/// Current artifact format version
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

/// Descriptive metadata stored alongside the factors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub rank: usize,
    pub n_users: usize,
    pub n_items: usize,
    pub interactions_used: usize,
    pub iterations: usize,
    pub max_iter: usize,
    pub reconstruction_mse: f32,
    pub trained_at: DateTime<Utc>,
    pub format_version: u32,
}

/// A trained, servable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub w: Array2<f32>,
    pub h: Array2<f32>,
    pub predictions: Array2<f32>,
    pub user_seen_items: BTreeMap<i64, BTreeSet<i64>>,
    pub users: IdIndex,
    pub items: IdIndex,
}

impl ModelArtifact {
    /// Assemble an artifact from the outputs of one training run
    pub fn assemble(
        factorization: Factorization,
        cache: PredictionCache,
        built: BuiltMatrix,
        max_iter: usize,
    ) -> Self {
        let metadata = ModelMetadata {
            rank: factorization.rank,
            n_users: built.matrix.n_users(),
            n_items: built.matrix.n_items(),
            interactions_used: built.interactions.len(),
            iterations: factorization.iterations,
            max_iter,
            reconstruction_mse: factorization.reconstruction_mse,
            trained_at: Utc::now(),
            format_version: FORMAT_VERSION,
        };

        Self {
            metadata,
            w: factorization.w,
            h: factorization.h,
            predictions: cache.predictions,
            user_seen_items: cache.user_seen_items,
            users: built.matrix.users,
            items: built.matrix.items,
        }
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Seen items of a user, `None` when the user has no history
    pub fn seen_items(&self, user_id: i64) -> Option<&BTreeSet<i64>> {
        self.user_seen_items.get(&user_id)
    }

    /// Check the dimensional invariants between factors, predictions and mappings
    pub fn validate(&self) -> Result<()> {
        let (n_users, n_items, rank) = (self.n_users(), self.n_items(), self.metadata.rank);

        let checks = [
            ("W", self.w.dim(), (n_users, rank)),
            ("H", self.h.dim(), (rank, n_items)),
            ("predictions", self.predictions.dim(), (n_users, n_items)),
        ];
        for (name, actual, expected) in checks {
            if actual != expected {
                return Err(FactorecError::IncompatibleArtifact(format!(
                    "{} has shape {:?}, expected {:?}",
                    name, actual, expected
                )));
            }
        }

        if self.metadata.n_users != n_users || self.metadata.n_items != n_items {
            return Err(FactorecError::IncompatibleArtifact(format!(
                "metadata reports {} x {}, mappings hold {} x {}",
                self.metadata.n_users, self.metadata.n_items, n_users, n_items
            )));
        }

        if let Some(user_id) = self
            .user_seen_items
            .keys()
            .find(|user_id| !self.users.contains(**user_id))
        {
            return Err(FactorecError::IncompatibleArtifact(format!(
                "seen items recorded for unmapped user {}",
                user_id
            )));
        }

        Ok(())
    }

    /// Serialize with magic and version header
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)
            .map_err(|e| FactorecError::Serialization(format!("Failed to encode artifact: {}", e)))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&ARTIFACT_MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Parse bytes written by [`ModelArtifact::encode`] and validate the result
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(FactorecError::IncompatibleArtifact(format!(
                "artifact is {} bytes, shorter than its header",
                bytes.len()
            )));
        }

        let (header, payload) = bytes.split_at(HEADER_LEN);
        if header[..4] != ARTIFACT_MAGIC {
            return Err(FactorecError::IncompatibleArtifact(
                "missing FREC magic".to_string(),
            ));
        }

        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != FORMAT_VERSION {
            return Err(FactorecError::IncompatibleArtifact(format!(
                "format version {} is not supported (expected {})",
                version, FORMAT_VERSION
            )));
        }

        let artifact: ModelArtifact = bincode::deserialize(payload).map_err(|e| {
            FactorecError::IncompatibleArtifact(format!("payload could not be decoded: {}", e))
        })?;
        artifact.validate()?;
        Ok(artifact)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{MatrixConfig, TrainerConfig};
    use crate::interaction::InteractionRecord;
    use crate::matrix::MatrixBuilder;
    use crate::predictions::precompute;
    use crate::trainer::FactorizationTrainer;

    /// Artifact trained on the four-record scenario
    pub(crate) fn scenario_artifact() -> ModelArtifact {
        let records = vec![
            InteractionRecord::rating(1, 10, 5.0),
            InteractionRecord::rating(1, 20, 3.0),
            InteractionRecord::rating(2, 10, 4.0),
            InteractionRecord::rating(2, 30, 5.0),
        ];
        let built = MatrixBuilder::new(MatrixConfig::default())
            .build(&records)
            .unwrap();
        let model = FactorizationTrainer::new(TrainerConfig::default())
            .train(&built.matrix)
            .unwrap();
        let cache = precompute(&model, &built);
        ModelArtifact::assemble(model, cache, built, 30)
    }

    #[test]
    fn test_assembled_artifact_is_valid() {
        let artifact = scenario_artifact();
        artifact.validate().unwrap();
        assert_eq!(artifact.metadata.n_users, 2);
        assert_eq!(artifact.metadata.n_items, 3);
        assert_eq!(artifact.metadata.interactions_used, 4);
        assert_eq!(artifact.metadata.format_version, FORMAT_VERSION);
    }

    #[test]
    fn test_encoded_artifact_decodes() {
        let artifact = scenario_artifact();
        let bytes = artifact.encode().unwrap();
        assert_eq!(&bytes[..4], b"FREC");
        assert_eq!(ModelArtifact::decode(&bytes).unwrap(), artifact);
    }

    #[test]
    fn test_foreign_bytes_are_incompatible() {
        let err = ModelArtifact::decode(b"PK\x03\x04 not a model").unwrap_err();
        assert!(matches!(err, FactorecError::IncompatibleArtifact(_)));

        let err = ModelArtifact::decode(b"FR").unwrap_err();
        assert!(matches!(err, FactorecError::IncompatibleArtifact(_)));
    }

    #[test]
    fn test_future_version_is_incompatible() {
        let mut bytes = scenario_artifact().encode().unwrap();
        bytes[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        let err = ModelArtifact::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn test_truncated_payload_is_incompatible() {
        let bytes = scenario_artifact().encode().unwrap();
        let err = ModelArtifact::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, FactorecError::IncompatibleArtifact(_)));
    }

    #[test]
    fn test_validate_catches_shape_mismatch() {
        let mut artifact = scenario_artifact();
        artifact.predictions = Array2::zeros((3, 3));
        assert!(matches!(
            artifact.validate(),
            Err(FactorecError::IncompatibleArtifact(_))
        ));
    }
}
