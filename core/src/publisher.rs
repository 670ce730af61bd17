use crate::{message::SettlementSnapshot, player::PlayerIdentity};
use std::collections::HashMap;

/// A broadcast channel read by the presentation layer, with one slot per identity.
pub trait Presentation {
    /// Overwrite the slot for `identity`.
    fn write(&mut self, identity: &PlayerIdentity, snapshot: &SettlementSnapshot)
        -> anyhow::Result<()>;
}

/// Publishes settlement snapshots without ever failing the caller.
///
/// Each publish overwrites whatever was previously written for the identity; there is no diffing
/// or aggregation, and the last write wins.
#[derive(Debug)]
pub struct ResultPublisher<P> {
    channel: P,
}

impl<P: Presentation> ResultPublisher<P> {
    pub fn new(channel: P) -> Self {
        Self { channel }
    }

    pub fn publish(&mut self, identity: &PlayerIdentity, snapshot: &SettlementSnapshot) {
        match self.channel.write(identity, snapshot) {
            Ok(()) => tracing::info!(
                %identity,
                old = snapshot.old,
                new = snapshot.new,
                team = %snapshot.team,
                doubled = snapshot.doubled,
                "published result"
            ),
            Err(err) => tracing::warn!(%identity, "failed to publish result: {err:#}"),
        }
    }

    pub fn channel(&self) -> &P {
        &self.channel
    }
}

/// An in-memory presentation channel holding the latest snapshot per identity.
#[derive(Clone, Debug, Default)]
pub struct SnapshotBoard {
    slots: HashMap<PlayerIdentity, SettlementSnapshot>,
}

impl SnapshotBoard {
    pub fn get(&self, identity: &PlayerIdentity) -> Option<&SettlementSnapshot> {
        self.slots.get(identity)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Presentation for SnapshotBoard {
    fn write(
        &mut self,
        identity: &PlayerIdentity,
        snapshot: &SettlementSnapshot,
    ) -> anyhow::Result<()> {
        self.slots.insert(identity.clone(), snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Team;
    use anyhow::bail;

    fn snapshot(old: i64, new: i64) -> SettlementSnapshot {
        SettlementSnapshot {
            old,
            new,
            name: "lina".into(),
            team: Team::GoodGuys,
            doubled: false,
        }
    }

    #[test]
    fn last_write_wins() {
        let mut publisher = ResultPublisher::new(SnapshotBoard::default());
        let id = PlayerIdentity::from("a1");
        publisher.publish(&id, &snapshot(500, 525));
        publisher.publish(&id, &snapshot(500, 530));

        assert_eq!(publisher.channel().len(), 1);
        assert_eq!(publisher.channel().get(&id), Some(&snapshot(500, 530)));
    }

    struct Broken;

    impl Presentation for Broken {
        fn write(&mut self, _: &PlayerIdentity, _: &SettlementSnapshot) -> anyhow::Result<()> {
            bail!("channel closed")
        }
    }

    #[test]
    fn failures_are_contained() {
        let mut publisher = ResultPublisher::new(Broken);
        publisher.publish(&"a1".into(), &snapshot(500, 525));
    }
}
