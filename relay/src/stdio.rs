//! The engine and presentation adapters used by the relay binary.
//!
//! Input is one JSON object per line: either a roster update or a [`Signal`] for the session. Both
//! go through the session's inbound channel, so a signal always sees the roster as it was when the
//! signal was read. Everything the session writes to the engine or to presentation comes
//! back out as one [`Output`] object per line.

use anyhow::{anyhow, Context};
use crate::Session;
use rankedturbo_core::{
    host::Host,
    message::{Notification, SettlementSnapshot, Signal},
    player::{Participant, PlayerIdentity, Roster, Slot, Team},
    publisher::Presentation,
};
use rankedturbo_store::RatingStore;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::mpsc;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RosterUpdate {
    PlayerConnected {
        slot: Slot,
        identity: PlayerIdentity,
        name: String,
        team: Team,
    },
    PlayerDisconnected {
        slot: Slot,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Roster(RosterUpdate),
    Signal(Signal),
}

impl Input {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        if let Ok(update) = serde_json::from_str(line) {
            return Ok(Self::Roster(update));
        }
        let signal = serde_json::from_str(line).context(format!("unrecognized input: {line}"))?;
        Ok(Self::Signal(signal))
    }

    /// Apply this input to a running session.
    pub fn apply<P, S>(self, session: &mut Session<StdioHost, P, S>)
    where
        P: Presentation,
        S: RatingStore + Clone + Send + Sync + 'static,
    {
        match self {
            Self::Roster(update) => session.host_mut().apply(update),
            Self::Signal(signal) => session.handle(signal),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    DeclareWinner {
        team: Team,
    },
    Announce {
        text: String,
    },
    Notify {
        slot: Slot,
        notification: Notification,
    },
    Result {
        identity: PlayerIdentity,
        snapshot: SettlementSnapshot,
    },
}

/// The set of connected players, shared between the input reader and the session.
#[derive(Clone, Debug, Default)]
pub struct SharedRoster(Arc<Mutex<BTreeMap<Slot, Participant>>>);

impl SharedRoster {
    pub fn apply(&self, update: RosterUpdate) {
        let mut players = self.lock();
        match update {
            RosterUpdate::PlayerConnected {
                slot,
                identity,
                name,
                team,
            } => {
                tracing::info!(%slot, %identity, %name, %team, "player connected");
                players.insert(
                    slot,
                    Participant {
                        slot,
                        identity,
                        name,
                        team,
                    },
                );
            }
            RosterUpdate::PlayerDisconnected { slot } => {
                tracing::info!(%slot, "player disconnected");
                players.remove(&slot);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Slot, Participant>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Roster for SharedRoster {
    fn participant(&self, slot: Slot) -> Option<Participant> {
        self.lock().get(&slot).cloned()
    }
}

#[derive(Clone, Debug)]
pub struct StdioHost {
    roster: SharedRoster,
    output: mpsc::UnboundedSender<Output>,
}

impl StdioHost {
    pub fn new(roster: SharedRoster, output: mpsc::UnboundedSender<Output>) -> Self {
        Self { roster, output }
    }

    pub fn apply(&mut self, update: RosterUpdate) {
        self.roster.apply(update);
    }

    fn send(&self, output: Output) -> anyhow::Result<()> {
        self.output
            .send(output)
            .map_err(|_| anyhow!("output closed"))
    }
}

impl Roster for StdioHost {
    fn participant(&self, slot: Slot) -> Option<Participant> {
        self.roster.participant(slot)
    }
}

impl Host for StdioHost {
    fn declare_winner(&mut self, team: Team) -> anyhow::Result<()> {
        self.send(Output::DeclareWinner { team })
    }

    fn announce(&mut self, text: &str) -> anyhow::Result<()> {
        self.send(Output::Announce { text: text.into() })
    }

    fn notify(&mut self, slot: Slot, notification: Notification) -> anyhow::Result<()> {
        self.send(Output::Notify { slot, notification })
    }
}

#[derive(Clone, Debug)]
pub struct StdioPresentation {
    output: mpsc::UnboundedSender<Output>,
}

impl StdioPresentation {
    pub fn new(output: mpsc::UnboundedSender<Output>) -> Self {
        Self { output }
    }
}

impl Presentation for StdioPresentation {
    fn write(
        &mut self,
        identity: &PlayerIdentity,
        snapshot: &SettlementSnapshot,
    ) -> anyhow::Result<()> {
        self.output
            .send(Output::Result {
                identity: identity.clone(),
                snapshot: snapshot.clone(),
            })
            .map_err(|_| anyhow!("output closed"))
    }
}
