use crate::{player::PlayerIdentity, rating::Rating};
use std::collections::{HashMap, HashSet};

/// Last-known ratings for the identities in the current match.
///
/// The cache is the only source the settlement path reads ratings from. Values arrive either from a
/// warm-up fetch or from an optimistic write after settlement; a warm-up result never overwrites a
/// value that is already present.
#[derive(Clone, Debug, Default)]
pub struct RatingCache {
    ratings: HashMap<PlayerIdentity, Rating>,
    warming: HashSet<PlayerIdentity>,
}

impl RatingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &PlayerIdentity) -> Option<Rating> {
        self.ratings.get(identity).copied()
    }

    pub fn set(&mut self, identity: PlayerIdentity, rating: Rating) {
        self.warming.remove(&identity);
        self.ratings.insert(identity, rating);
    }

    /// Select the identities which need to be fetched to warm the cache.
    ///
    /// Bots, identities which are already cached and identities with a fetch already in flight are
    /// skipped, so this is safe to call repeatedly. Each returned identity is marked as in flight
    /// until [`finish_warm`](Self::finish_warm) or [`set`](Self::set) is called for it.
    pub fn begin_warm<'a>(
        &mut self,
        identities: impl IntoIterator<Item = &'a PlayerIdentity>,
    ) -> Vec<PlayerIdentity> {
        let mut missing = vec![];
        for identity in identities {
            if identity.is_bot()
                || self.ratings.contains_key(identity)
                || self.warming.contains(identity)
            {
                continue;
            }
            self.warming.insert(identity.clone());
            missing.push(identity.clone());
        }
        missing
    }

    /// Record the result of a warm-up fetch.
    ///
    /// Returns the value now cached for `identity`, which is the existing value if one was set while
    /// the fetch was in flight.
    pub fn finish_warm(&mut self, identity: PlayerIdentity, rating: Rating) -> Rating {
        self.warming.remove(&identity);
        *self.ratings.entry(identity).or_insert(rating)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}
