use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

/// Number of match slots scanned when enumerating participants.
pub const MAX_SLOTS: u32 = 24;

/// The stable key of a participant's persistent rating record.
///
/// Identities are derived from the participant's platform account and do not change between
/// matches, unlike [`Slot`]. Bots and unassigned slots all share the sentinel identity `"0"`, which
/// is never rated.
#[derive(
    Clone, Debug, Display, From, FromStr, Into, Deserialize, Serialize, PartialEq, Eq, Hash,
    PartialOrd, Ord,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct PlayerIdentity(String);

impl PlayerIdentity {
    pub const BOT: &'static str = "0";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn bot() -> Self {
        Self(Self::BOT.into())
    }

    /// Whether this is the bot/unassigned sentinel, which is excluded from all rating operations.
    pub fn is_bot(&self) -> bool {
        self.0 == Self::BOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerIdentity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A match-local reference to a participant, valid only while they remain connected.
#[derive(
    Clone, Copy, Debug, Display, From, FromStr, Into, Deserialize, Serialize, PartialEq, Eq, Hash,
    PartialOrd, Ord,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct Slot(u32);

#[derive(Clone, Copy, Debug, Display, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    #[display("good guys")]
    GoodGuys,
    #[display("bad guys")]
    BadGuys,
    #[display("neutrals")]
    Neutrals,
    #[display("no team")]
    NoTeam,
}

impl Team {
    /// Whether players can be on this team, and therefore whether it can win a match.
    pub fn is_playable(self) -> bool {
        matches!(self, Self::GoodGuys | Self::BadGuys)
    }

    /// The team playing against this one, if this is a playable team.
    pub fn opponent(self) -> Option<Self> {
        match self {
            Self::GoodGuys => Some(Self::BadGuys),
            Self::BadGuys => Some(Self::GoodGuys),
            _ => None,
        }
    }
}

/// A connected player, as reported by the engine for a valid slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub slot: Slot,
    pub identity: PlayerIdentity,
    pub name: String,
    pub team: Team,
}

impl Participant {
    pub fn is_bot(&self) -> bool {
        self.identity.is_bot()
    }
}

/// Read access to the engine's view of who is currently in the match.
pub trait Roster {
    /// The participant occupying `slot`, if the slot is currently valid.
    fn participant(&self, slot: Slot) -> Option<Participant>;

    /// Every currently valid participant, in slot order.
    fn participants(&self) -> Vec<Participant> {
        (0..MAX_SLOTS)
            .filter_map(|slot| self.participant(slot.into()))
            .collect()
    }
}
