use crate::player::{Participant, Roster, Slot};
use std::collections::HashSet;

/// Tracks which players doubled down in the current match.
#[derive(Clone, Debug, Default)]
pub struct OptInTracker {
    doubled: HashSet<Slot>,
}

impl OptInTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a double down for `slot`.
    ///
    /// Returns the participant if this is a new opt-in by a currently valid player, and `None` if
    /// the slot is invalid or the player had already opted in.
    pub fn record(&mut self, roster: &impl Roster, slot: Slot) -> Option<Participant> {
        let Some(participant) = roster.participant(slot) else {
            tracing::debug!(%slot, "ignoring opt-in from invalid slot");
            return None;
        };
        if !self.doubled.insert(slot) {
            return None;
        }
        tracing::info!(%slot, name = %participant.name, "opted in");
        Some(participant)
    }

    pub fn is_opted_in(&self, slot: Slot) -> bool {
        self.doubled.contains(&slot)
    }

    pub fn reset(&mut self) {
        self.doubled.clear();
    }
}
