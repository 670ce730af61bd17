use crate::{message::Entity, player::Team};
use derive_more::Display;

/// How a match winner was decided.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum WinCause {
    #[display("core structure destroyed")]
    CoreStructure,
    #[display("hero killed")]
    HeroKill,
    #[display("declared by engine")]
    Engine,
}

/// The one decision made per match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub winner: Team,
    pub cause: WinCause,
}

impl Verdict {
    /// Whether the engine must be told about the winner.
    ///
    /// Wins the engine declared itself are already known to it.
    pub fn must_declare(&self) -> bool {
        self.cause != WinCause::Engine
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectorState {
    #[default]
    Idle,
    Decided(Verdict),
    SettlementScheduled(Verdict),
}

/// Decides exactly one winning team per match.
///
/// The first qualifying signal moves the detector out of [`DetectorState::Idle`]; every signal after
/// that is ignored, so a match yields at most one [`Verdict`] no matter how many structures or heroes
/// die in the same tick, or whether the engine also declares the result.
#[derive(Clone, Debug, Default)]
pub struct WinDetector {
    state: DetectorState,
}

impl WinDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_decided(&self) -> bool {
        self.state != DetectorState::Idle
    }

    /// Handle an entity being destroyed.
    ///
    /// The caller must declare the winner to the engine and then call
    /// [`settlement_scheduled`](Self::settlement_scheduled) once the settlement callback is queued.
    pub fn entity_killed(&mut self, killed: &Entity, attacker: Option<&Entity>) -> Option<Verdict> {
        if self.is_decided() {
            return None;
        }

        let verdict = if killed.is_core_structure() {
            Verdict {
                winner: killed.team.opponent()?,
                cause: WinCause::CoreStructure,
            }
        } else if killed.is_hero() {
            let victim_opponent = killed.team.opponent()?;
            let winner = match attacker {
                Some(attacker) if attacker.team.is_playable() && attacker.team != killed.team => {
                    attacker.team
                }
                _ => victim_opponent,
            };
            Verdict {
                winner,
                cause: WinCause::HeroKill,
            }
        } else {
            return None;
        };

        tracing::info!(winner = %verdict.winner, cause = %verdict.cause, "match decided");
        self.state = DetectorState::Decided(verdict);
        Some(verdict)
    }

    /// Handle the engine declaring a winner on its own.
    ///
    /// The returned verdict never needs to be declared back to the engine, and the detector moves
    /// straight to [`DetectorState::SettlementScheduled`].
    pub fn team_win(&mut self, team: Team) -> Option<Verdict> {
        if self.is_decided() {
            return None;
        }
        if !team.is_playable() {
            tracing::warn!(%team, "ignoring engine win for unplayable team");
            return None;
        }

        let verdict = Verdict {
            winner: team,
            cause: WinCause::Engine,
        };
        tracing::info!(winner = %team, cause = %verdict.cause, "match decided");
        self.state = DetectorState::SettlementScheduled(verdict);
        Some(verdict)
    }

    pub fn settlement_scheduled(&mut self) {
        if let DetectorState::Decided(verdict) = self.state {
            self.state = DetectorState::SettlementScheduled(verdict);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::EntityKind;

    fn entity(kind: EntityKind, name: &str, team: Team) -> Entity {
        Entity {
            kind,
            name: name.into(),
            team,
        }
    }

    fn fort(team: Team) -> Entity {
        entity(EntityKind::Building, "npc_dota_goodguys_fort", team)
    }

    fn hero(team: Team) -> Entity {
        entity(EntityKind::Hero, "npc_dota_hero_lina", team)
    }

    #[test]
    fn core_structure_loss() {
        let mut detector = WinDetector::new();
        let verdict = detector.entity_killed(&fort(Team::GoodGuys), None).unwrap();
        assert_eq!(verdict.winner, Team::BadGuys);
        assert_eq!(verdict.cause, WinCause::CoreStructure);
        assert!(verdict.must_declare());
        assert_eq!(detector.state(), DetectorState::Decided(verdict));

        detector.settlement_scheduled();
        assert_eq!(detector.state(), DetectorState::SettlementScheduled(verdict));
    }

    #[test]
    fn hero_kill_by_enemy() {
        let mut detector = WinDetector::new();
        let verdict = detector
            .entity_killed(&hero(Team::BadGuys), Some(&hero(Team::GoodGuys)))
            .unwrap();
        assert_eq!(verdict.winner, Team::GoodGuys);
        assert_eq!(verdict.cause, WinCause::HeroKill);
    }

    #[test]
    fn hero_death_without_enemy_attacker() {
        // Denied by a teammate.
        let mut detector = WinDetector::new();
        let verdict = detector
            .entity_killed(&hero(Team::BadGuys), Some(&hero(Team::BadGuys)))
            .unwrap();
        assert_eq!(verdict.winner, Team::GoodGuys);

        // Killed by the environment.
        let mut detector = WinDetector::new();
        let verdict = detector.entity_killed(&hero(Team::GoodGuys), None).unwrap();
        assert_eq!(verdict.winner, Team::BadGuys);

        // Killed by a neutral creep.
        let mut detector = WinDetector::new();
        let creep = entity(EntityKind::Unit, "npc_dota_neutral_kobold", Team::Neutrals);
        let verdict = detector
            .entity_killed(&hero(Team::GoodGuys), Some(&creep))
            .unwrap();
        assert_eq!(verdict.winner, Team::BadGuys);
    }

    #[test]
    fn irrelevant_kills() {
        let mut detector = WinDetector::new();
        let tower = entity(EntityKind::Building, "npc_dota_goodguys_tower1_top", Team::GoodGuys);
        let creep = entity(EntityKind::Unit, "npc_dota_creep_badguys_melee", Team::BadGuys);
        assert!(detector.entity_killed(&tower, None).is_none());
        assert!(detector
            .entity_killed(&creep, Some(&hero(Team::GoodGuys)))
            .is_none());
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    #[test]
    fn engine_declared_win() {
        let mut detector = WinDetector::new();
        assert!(detector.team_win(Team::Neutrals).is_none());

        let verdict = detector.team_win(Team::BadGuys).unwrap();
        assert_eq!(verdict.winner, Team::BadGuys);
        assert!(!verdict.must_declare());
        assert_eq!(detector.state(), DetectorState::SettlementScheduled(verdict));
    }

    #[test]
    fn at_most_one_verdict() {
        let mut detector = WinDetector::new();
        let signals = [
            Some(fort(Team::BadGuys)),
            Some(hero(Team::GoodGuys)),
            None,
            Some(fort(Team::GoodGuys)),
            None,
        ];
        let verdicts = signals
            .iter()
            .filter_map(|signal| match signal {
                Some(killed) => detector.entity_killed(killed, None),
                None => detector.team_win(Team::BadGuys),
            })
            .collect::<Vec<_>>();
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].winner, Team::GoodGuys);
    }

    #[test]
    fn engine_win_after_kill_is_ignored() {
        let mut detector = WinDetector::new();
        detector.entity_killed(&hero(Team::GoodGuys), None).unwrap();
        assert!(detector.team_win(Team::BadGuys).is_none());
        assert!(detector.team_win(Team::GoodGuys).is_none());
    }
}
