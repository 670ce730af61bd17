use crate::RatingStore;
use anyhow::ensure;
use rankedturbo_core::{player::PlayerIdentity, rating::Rating};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::sleep;

/// A rating store held in memory.
///
/// Clones share the same data, so a test can keep a handle to inspect what a session did. Every
/// request is recorded, including those that fail.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    ratings: HashMap<PlayerIdentity, Rating>,
    // Values returned by reads regardless of what was written.
    overrides: HashMap<PlayerIdentity, Rating>,
    reads: Vec<PlayerIdentity>,
    writes: Vec<(PlayerIdentity, Rating)>,
    offline: bool,
    read_latency: Duration,
    write_latency: Duration,
}

impl MemoryStore {
    pub fn with_rating(self, identity: impl Into<PlayerIdentity>, rating: Rating) -> Self {
        self.lock().ratings.insert(identity.into(), rating);
        self
    }

    /// Make every request fail, as if the service were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delay the response to each read by `latency`.
    pub fn set_read_latency(&self, latency: Duration) {
        self.lock().read_latency = latency;
    }

    /// Delay the effect of each write by `latency`.
    pub fn set_write_latency(&self, latency: Duration) {
        self.lock().write_latency = latency;
    }

    /// Make reads of `identity` return `rating`, as if another writer raced with ours.
    pub fn override_reads(&self, identity: impl Into<PlayerIdentity>, rating: Rating) {
        self.lock().overrides.insert(identity.into(), rating);
    }

    pub fn rating(&self, identity: &PlayerIdentity) -> Option<Rating> {
        self.lock().ratings.get(identity).copied()
    }

    pub fn reads(&self) -> Vec<PlayerIdentity> {
        self.lock().reads.clone()
    }

    pub fn writes(&self) -> Vec<(PlayerIdentity, Rating)> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RatingStore for MemoryStore {
    async fn read(&self, identity: &PlayerIdentity) -> anyhow::Result<Option<Rating>> {
        let (rating, latency) = {
            let mut inner = self.lock();
            inner.reads.push(identity.clone());
            ensure!(!inner.offline, "store offline");
            let rating = inner
                .overrides
                .get(identity)
                .or_else(|| inner.ratings.get(identity))
                .copied();
            (rating, inner.read_latency)
        };
        if !latency.is_zero() {
            sleep(latency).await;
        }
        Ok(rating)
    }

    async fn write(&self, identity: &PlayerIdentity, rating: Rating) -> anyhow::Result<()> {
        let latency = {
            let mut inner = self.lock();
            inner.writes.push((identity.clone(), rating));
            ensure!(!inner.offline, "store offline");
            inner.write_latency
        };
        if !latency.is_zero() {
            sleep(latency).await;
        }
        self.lock().ratings.insert(identity.clone(), rating);
        Ok(())
    }
}
