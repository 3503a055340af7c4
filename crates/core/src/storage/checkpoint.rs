use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Partial-progress record for one run. `processed` is a superset of
/// `scores` keys: a ticker can be processed yet filtered out without ever
/// receiving a score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub scores: BTreeMap<String, f64>,
    pub processed: BTreeSet<String>,
}

/// Durable JSON checkpoint at a fixed path. Saves are atomic overwrites;
/// a crashed commit leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn save(&self, state: &CheckpointState) -> Result<()> {
        super::write_json_atomic(&self.path, state).await
    }

    /// None when no checkpoint exists; a present-but-undecodable file is an
    /// error the caller decides about.
    pub async fn load(&self) -> Result<Option<CheckpointState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read checkpoint {}", self.path.display())
                })
            }
        };

        let state = serde_json::from_slice(&bytes).with_context(|| {
            format!("checkpoint {} is not valid JSON", self.path.display())
        })?;
        Ok(Some(state))
    }

    /// Safe to call when no checkpoint exists.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove checkpoint {}", self.path.display())),
        }
    }
}
