//! Artifact → message records.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::BindingConfig;
use crate::error::{BindingError, BindingResult};

/// A message stored behind an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    /// Base64 form of the artifact.
    pub artifact: String,
    /// Entity ID of the party that issued the artifact.
    pub issuer: Option<String>,
    /// Entity ID of the party allowed to resolve it.
    pub relying_party: Option<String>,
    /// Serialized message.
    pub message: Vec<u8>,
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
    /// When the record stops being resolvable.
    pub expires_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Returns true if the record has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Storage for artifact records.
///
/// Shared between concurrent requests. A record is either fully visible or
/// not visible at all.
pub trait ArtifactStore: Send + Sync {
    /// Stores a message under an artifact key.
    ///
    /// Fails with [`BindingError::Storage`] if the key is already in use.
    fn put(
        &self,
        artifact: &str,
        issuer: Option<&str>,
        relying_party: Option<&str>,
        message: Vec<u8>,
    ) -> BindingResult<()>;

    /// Gets the record for an artifact key.
    fn get(&self, artifact: &str) -> BindingResult<Option<Arc<ArtifactRecord>>>;

    /// Removes and returns the record for an artifact key.
    fn remove(&self, artifact: &str) -> BindingResult<Option<Arc<ArtifactRecord>>>;

    /// Returns true if a live record exists for an artifact key.
    fn contains(&self, artifact: &str) -> BindingResult<bool> {
        Ok(self.get(artifact)?.is_some())
    }
}

/// Number of inserts between sweeps of expired records.
const SWEEP_INTERVAL: usize = 64;

/// In-process artifact store with per-record expiry.
///
/// Expired records are evicted when a lookup finds them, and every
/// [`SWEEP_INTERVAL`] inserts the whole map is swept.
#[derive(Debug)]
pub struct InMemoryArtifactStore {
    records: DashMap<String, Arc<ArtifactRecord>>,
    lifetime: TimeDelta,
    inserts: AtomicUsize,
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl InMemoryArtifactStore {
    /// Creates a store whose records expire after `lifetime`.
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            records: DashMap::new(),
            lifetime: TimeDelta::from_std(lifetime).unwrap_or(TimeDelta::MAX),
            inserts: AtomicUsize::new(0),
        }
    }

    /// Creates a store using the configured artifact lifetime.
    #[must_use]
    pub fn from_config(config: &BindingConfig) -> Self {
        Self::new(config.artifact_lifetime())
    }

    /// Removes all expired records, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired_at(now));
        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired artifact records");
        }
        purged
    }

    fn evict_if_expired(&self, artifact: &str, now: DateTime<Utc>) {
        if self
            .records
            .remove_if(artifact, |_, record| record.is_expired_at(now))
            .is_some()
        {
            tracing::debug!("Evicted expired artifact record");
        }
    }

    /// Returns the number of stored records, including expired ones not yet
    /// evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(
        &self,
        artifact: &str,
        issuer: Option<&str>,
        relying_party: Option<&str>,
        message: Vec<u8>,
    ) -> BindingResult<()> {
        if artifact.is_empty() {
            return Err(BindingError::Storage("artifact key is empty".to_string()));
        }

        let now = Utc::now();
        let record = Arc::new(ArtifactRecord {
            artifact: artifact.to_string(),
            issuer: issuer.map(ToString::to_string),
            relying_party: relying_party.map(ToString::to_string),
            message,
            created_at: now,
            expires_at: now
                .checked_add_signed(self.lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        });

        match self.records.entry(artifact.to_string()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_expired_at(now) {
                    tracing::warn!("Rejected duplicate artifact key");
                    return Err(BindingError::Storage(
                        "artifact key is already in use".to_string(),
                    ));
                }
                entry.insert(record);
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
        }

        if self.inserts.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.purge_expired();
        }
        Ok(())
    }

    fn get(&self, artifact: &str) -> BindingResult<Option<Arc<ArtifactRecord>>> {
        let now = Utc::now();
        let record = self.records.get(artifact).map(|r| Arc::clone(r.value()));
        match record {
            Some(record) if record.is_expired_at(now) => {
                self.evict_if_expired(artifact, now);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn remove(&self, artifact: &str) -> BindingResult<Option<Arc<ArtifactRecord>>> {
        let now = Utc::now();
        Ok(self
            .records
            .remove(artifact)
            .map(|(_, record)| record)
            .filter(|r| !r.is_expired_at(now)))
    }
}
