use crate::{
    player::{Slot, Team},
    rating::Rating,
};
use serde::{Deserialize, Serialize};

/// A named engine event, validated before it reaches the match components.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    /// The engine moved to a new match phase.
    PhaseChanged { phase: Phase },

    /// A player pressed the double down button.
    OptIn { slot: Slot },

    /// An entity was destroyed.
    EntityKilled {
        killed: Entity,
        attacker: Option<Entity>,
    },

    /// The engine declared a winner on its own.
    TeamWin { team: Team },
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    /// Players are loaded and about to start; a new match begins here.
    PreMatch,
    InProgress,
    PostGame,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    #[serde(default)]
    pub name: String,
    pub team: Team,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Building,
    /// A primary combatant controlled by a player. Illusions and clones are reported as units.
    Hero,
    Unit,
}

impl Entity {
    /// Whether destroying this entity ends the match.
    pub fn is_core_structure(&self) -> bool {
        self.kind == EntityKind::Building
            && (self.name.contains("fort") || self.name.contains("ancient"))
    }

    pub fn is_hero(&self) -> bool {
        self.kind == EntityKind::Hero
    }
}

/// A point-to-point message to a single player's client.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The player's rating going into the match.
    Current { mmr: Rating },
    /// The player's verified rating after settlement.
    Final { old: Rating, new: Rating },
}

/// One identity's published result for a match.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SettlementSnapshot {
    pub old: Rating,
    pub new: Rating,
    pub name: String,
    pub team: Team,
    pub doubled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_signals() {
        let signal: Signal = serde_json::from_str(
            r#"{"type":"entity_killed","killed":{"kind":"building","name":"npc_dota_goodguys_fort","team":"good_guys"},"attacker":null}"#,
        )
        .unwrap();
        let Signal::EntityKilled { killed, attacker } = signal else {
            panic!("wrong signal {signal:?}");
        };
        assert!(killed.is_core_structure());
        assert!(attacker.is_none());

        let signal: Signal = serde_json::from_str(r#"{"type":"opt_in","slot":4}"#).unwrap();
        assert_eq!(signal, Signal::OptIn { slot: 4.into() });

        let signal: Signal =
            serde_json::from_str(r#"{"type":"phase_changed","phase":"pre_match"}"#).unwrap();
        assert_eq!(
            signal,
            Signal::PhaseChanged {
                phase: Phase::PreMatch
            }
        );
    }

    #[test]
    fn reject_malformed_signals() {
        assert!(serde_json::from_str::<Signal>(r#"{"type":"team_win","team":7}"#).is_err());
        assert!(serde_json::from_str::<Signal>(r#"{"type":"opt_in"}"#).is_err());
        assert!(serde_json::from_str::<Signal>(r#"{"type":"unknown"}"#).is_err());
    }

    #[test]
    fn core_structures() {
        let fort = |kind, name: &str| Entity {
            kind,
            name: name.into(),
            team: Team::BadGuys,
        };
        assert!(fort(EntityKind::Building, "npc_dota_badguys_fort").is_core_structure());
        assert!(fort(EntityKind::Building, "custom_ancient").is_core_structure());
        assert!(!fort(EntityKind::Building, "npc_dota_badguys_tower1_mid").is_core_structure());
        assert!(!fort(EntityKind::Unit, "npc_dota_badguys_fort").is_core_structure());
    }
}
