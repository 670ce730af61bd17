//! Client for the remote key-value service holding each player's rating.

use futures::future::Future;
use rankedturbo_core::{
    player::PlayerIdentity,
    rating::{Rating, BASELINE},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

pub mod http;
pub mod memory;

pub use self::{http::HttpStore, memory::MemoryStore};

/// The raw read/write contract of a rating store.
///
/// Implementations report every failure (transport, status, malformed body) as an error; deciding
/// what a failure means is up to [`StoreClient`].
pub trait RatingStore {
    /// Read the stored rating, or `None` if nothing is stored for `identity`.
    fn read(
        &self,
        identity: &PlayerIdentity,
    ) -> impl Future<Output = anyhow::Result<Option<Rating>>> + Send;

    fn write(
        &self,
        identity: &PlayerIdentity,
        rating: Rating,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Applies the failure policy on top of a [`RatingStore`].
///
/// Nothing here returns an error: failed reads look like missing records, failed writes are logged
/// and dropped, and the bot identity never touches the store. There are no retries and no timeouts.
#[derive(Clone, Debug)]
pub struct StoreClient<S> {
    store: S,
    baseline: Rating,
    reachable: Arc<AtomicBool>,
}

impl<S: RatingStore> StoreClient<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            baseline: BASELINE,
            reachable: Default::default(),
        }
    }

    pub fn with_baseline(mut self, baseline: Rating) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn baseline(&self) -> Rating {
        self.baseline
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn read(&self, identity: &PlayerIdentity) -> Option<Rating> {
        if identity.is_bot() {
            return None;
        }
        match self.store.read(identity).await {
            Ok(rating) => {
                self.succeeded();
                rating
            }
            Err(err) => {
                tracing::warn!(%identity, "store read failed: {err:#}");
                None
            }
        }
    }

    /// Write `rating` for `identity`, returning whether the store accepted it.
    pub async fn write(&self, identity: &PlayerIdentity, rating: Rating) -> bool {
        if identity.is_bot() {
            tracing::debug!("not writing rating for bot");
            return false;
        }
        match self.store.write(identity, rating).await {
            Ok(()) => {
                self.succeeded();
                tracing::debug!(%identity, rating, "stored rating");
                true
            }
            Err(err) => {
                tracing::warn!(%identity, rating, "store write failed: {err:#}");
                false
            }
        }
    }

    /// Read the rating for `identity`, initializing it to the baseline if there is none.
    pub async fn get_or_init(&self, identity: &PlayerIdentity) -> Rating {
        if identity.is_bot() {
            return self.baseline;
        }
        if let Some(rating) = self.read(identity).await {
            return rating;
        }
        tracing::info!(%identity, baseline = self.baseline, "initializing rating");
        self.write(identity, self.baseline).await;
        self.baseline
    }

    fn succeeded(&self) {
        if !self.reachable.swap(true, Ordering::Relaxed) {
            tracing::info!("rating store reachable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn baseline_initialization() {
        let store = MemoryStore::default();
        let client = StoreClient::new(store.clone());
        let id = PlayerIdentity::from("123");

        assert_eq!(client.get_or_init(&id).await, 500);
        assert_eq!(store.writes(), [(id.clone(), 500)]);
        assert_eq!(store.rating(&id), Some(500));

        // Now that it exists it is not written again.
        assert_eq!(client.get_or_init(&id).await, 500);
        assert_eq!(store.writes().len(), 1);
        assert_eq!(store.reads().len(), 2);
    }

    #[tokio::test]
    async fn existing_rating() {
        let store = MemoryStore::default().with_rating("123", 742);
        let client = StoreClient::new(store.clone());
        assert_eq!(client.get_or_init(&"123".into()).await, 742);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn configured_baseline() {
        let client = StoreClient::new(MemoryStore::default()).with_baseline(1200);
        assert_eq!(client.get_or_init(&"9".into()).await, 1200);
        assert_eq!(client.store().rating(&"9".into()), Some(1200));
    }

    #[tokio::test]
    async fn bot_never_touches_store() {
        let store = MemoryStore::default();
        let client = StoreClient::new(store.clone());
        let bot = PlayerIdentity::bot();

        assert_eq!(client.get_or_init(&bot).await, 500);
        assert_eq!(client.read(&bot).await, None);
        assert!(!client.write(&bot, 525).await);
        assert!(store.reads().is_empty());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn offline_store_degrades_to_baseline() {
        let store = MemoryStore::default().with_rating("123", 742);
        store.set_offline(true);
        let client = StoreClient::new(store.clone());

        assert_eq!(client.read(&"123".into()).await, None);
        assert_eq!(client.get_or_init(&"123".into()).await, 500);
        assert!(!client.write(&"123".into(), 800).await);

        // Nothing reached the backing data.
        assert_eq!(store.rating(&"123".into()), Some(742));
    }
}
