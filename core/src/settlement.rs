use crate::{
    cache::RatingCache,
    message::{Notification, SettlementSnapshot},
    opt_in::OptInTracker,
    player::{PlayerIdentity, Roster, Slot, Team},
    rating::{self, Rating},
};
use anyhow::ensure;
use std::collections::HashSet;

/// The rating change applied to one identity at the end of a match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub identity: PlayerIdentity,
    pub slot: Slot,
    pub name: String,
    pub team: Team,
    pub old: Rating,
    pub new: Rating,
    pub doubled: bool,
}

impl Settlement {
    /// The provisional snapshot, published before the store confirms the write.
    pub fn snapshot(&self) -> SettlementSnapshot {
        SettlementSnapshot {
            old: self.old,
            new: self.new,
            name: self.name.clone(),
            team: self.team,
            doubled: self.doubled,
        }
    }

    /// Build the messages confirming the value read back from the store.
    ///
    /// Every slot still mapped to this identity gets a final notification. The refreshed snapshot
    /// uses the live name and team of the first such slot; if the player has left there is nothing
    /// to refresh.
    pub fn verify(&self, roster: &impl Roster, verified: Rating) -> Verification {
        let slots = roster
            .participants()
            .into_iter()
            .filter(|participant| participant.identity == self.identity)
            .collect::<Vec<_>>();
        let snapshot = slots.first().map(|participant| SettlementSnapshot {
            old: self.old,
            new: verified,
            name: participant.name.clone(),
            team: participant.team,
            doubled: self.doubled,
        });
        Verification {
            notifications: slots
                .iter()
                .map(|participant| {
                    (
                        participant.slot,
                        Notification::Final {
                            old: self.old,
                            new: verified,
                        },
                    )
                })
                .collect(),
            snapshot,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub notifications: Vec<(Slot, Notification)>,
    pub snapshot: Option<SettlementSnapshot>,
}

/// Compute and apply the rating change for every distinct rated identity in the match.
///
/// Ratings are read only from `cache` (falling back to `baseline`), and each new rating is written
/// back to `cache` before this returns, so later reads in the same match see the optimistic value
/// whether or not the caller's store write has completed.
pub fn finalize(
    roster: &impl Roster,
    cache: &mut RatingCache,
    opt_in: &OptInTracker,
    winner: Team,
    baseline: Rating,
) -> anyhow::Result<Vec<Settlement>> {
    ensure!(winner.is_playable(), "cannot settle a win for {winner}");

    let mut seen = HashSet::new();
    let mut settlements = vec![];
    for participant in roster.participants() {
        if participant.is_bot() || !seen.insert(participant.identity.clone()) {
            continue;
        }

        let old = cache.get(&participant.identity).unwrap_or(baseline);
        let doubled = opt_in.is_opted_in(participant.slot);
        let new = rating::update(old, doubled, participant.team == winner);
        cache.set(participant.identity.clone(), new);

        tracing::info!(
            identity = %participant.identity,
            slot = %participant.slot,
            old,
            new,
            doubled,
            "settled"
        );
        settlements.push(Settlement {
            identity: participant.identity,
            slot: participant.slot,
            name: participant.name,
            team: participant.team,
            old,
            new,
            doubled,
        });
    }
    Ok(settlements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Participant;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Lobby(BTreeMap<Slot, Participant>);

    impl Lobby {
        fn join(mut self, slot: u32, identity: &str, team: Team) -> Self {
            self.0.insert(
                slot.into(),
                Participant {
                    slot: slot.into(),
                    identity: identity.into(),
                    name: format!("player{slot}"),
                    team,
                },
            );
            self
        }
    }

    impl Roster for Lobby {
        fn participant(&self, slot: Slot) -> Option<Participant> {
            self.0.get(&slot).cloned()
        }
    }

    #[test]
    fn deltas() {
        let lobby = Lobby::default()
            .join(0, "a1", Team::GoodGuys)
            .join(1, "b1", Team::BadGuys);
        let mut cache = RatingCache::new();
        cache.set("a1".into(), 500);
        cache.set("b1".into(), 500);
        let mut opt_in = OptInTracker::new();
        opt_in.record(&lobby, 1.into()).unwrap();

        let settlements = finalize(&lobby, &mut cache, &opt_in, Team::GoodGuys, 500).unwrap();
        assert_eq!(settlements.len(), 2);

        assert_eq!(settlements[0].identity, PlayerIdentity::from("a1"));
        assert_eq!((settlements[0].old, settlements[0].new), (500, 525));
        assert!(!settlements[0].doubled);

        assert_eq!(settlements[1].identity, PlayerIdentity::from("b1"));
        assert_eq!((settlements[1].old, settlements[1].new), (500, 450));
        assert!(settlements[1].doubled);
        assert_eq!(settlements[1].snapshot().team, Team::BadGuys);

        // The optimistic value is visible immediately.
        assert_eq!(cache.get(&"a1".into()), Some(525));
        assert_eq!(cache.get(&"b1".into()), Some(450));
    }

    #[test]
    fn uncached_identity_starts_at_baseline() {
        let lobby = Lobby::default().join(3, "new", Team::BadGuys);
        let mut cache = RatingCache::new();
        let settlements =
            finalize(&lobby, &mut cache, &OptInTracker::new(), Team::GoodGuys, 1000).unwrap();
        assert_eq!((settlements[0].old, settlements[0].new), (1000, 975));
    }

    #[test]
    fn bots_and_duplicates_skipped() {
        let lobby = Lobby::default()
            .join(0, "a1", Team::GoodGuys)
            .join(1, "0", Team::GoodGuys)
            .join(2, "a1", Team::GoodGuys)
            .join(5, "0", Team::BadGuys)
            .join(7, "b1", Team::BadGuys);
        let mut cache = RatingCache::new();
        let settlements =
            finalize(&lobby, &mut cache, &OptInTracker::new(), Team::BadGuys, 500).unwrap();

        let ids = settlements
            .iter()
            .map(|s| s.identity.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["a1", "b1"]);
        assert_eq!(settlements[0].slot, Slot::from(0));
        assert_eq!(settlements[0].new, 475);
        assert_eq!(cache.get(&PlayerIdentity::bot()), None);
    }

    #[test]
    fn unplayable_winner() {
        let lobby = Lobby::default().join(0, "a1", Team::GoodGuys);
        let mut cache = RatingCache::new();
        assert!(finalize(&lobby, &mut cache, &OptInTracker::new(), Team::Neutrals, 500).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn verification_targets_live_slots() {
        let settlement = Settlement {
            identity: "a1".into(),
            slot: 0.into(),
            name: "player0".into(),
            team: Team::GoodGuys,
            old: 500,
            new: 525,
            doubled: true,
        };

        let lobby = Lobby::default()
            .join(4, "a1", Team::GoodGuys)
            .join(6, "b1", Team::BadGuys);
        let verification = settlement.verify(&lobby, 530);
        assert_eq!(
            verification.notifications,
            [(Slot::from(4), Notification::Final { old: 500, new: 530 })]
        );
        let snapshot = verification.snapshot.unwrap();
        assert_eq!((snapshot.old, snapshot.new), (500, 530));
        assert_eq!(snapshot.name, "player4");
        assert!(snapshot.doubled);

        // The player left before verification.
        let verification = settlement.verify(&Lobby::default(), 530);
        assert!(verification.notifications.is_empty());
        assert!(verification.snapshot.is_none());
    }
}
