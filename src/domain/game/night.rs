//! Night resolution
//!
//! Resolution is pure: it mutates the game and reports what happened, the
//! engine decides how to announce it.

use std::collections::{HashMap, HashSet};

use super::entity::{Game, UserId};
use super::vote::majority_target;
use super::win::{check_winner, Winner};
use crate::domain::role::{Faction, NightActionKind, RoleKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackSource {
    Mafia,
    Vigilante,
    SerialKiller,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NightEvent {
    Healed {
        target: UserId,
    },
    GuardDied {
        guard: UserId,
        protected: UserId,
    },
    Killed {
        target: UserId,
        role: Option<RoleKey>,
        source: AttackSource,
    },
    Silenced {
        target: UserId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvestigationResult {
    Unavailable,
    Guilty,
    Innocent,
    Signature(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Investigation {
    pub investigator: UserId,
    pub target: UserId,
    pub result: InvestigationResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightReport {
    pub events: Vec<NightEvent>,
    pub investigations: Vec<Investigation>,
    pub winner: Option<Winner>,
}

impl NightReport {
    pub fn deaths(&self) -> Vec<UserId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                NightEvent::Killed { target, .. } => Some(*target),
                NightEvent::GuardDied { guard, .. } => Some(*guard),
                _ => None,
            })
            .collect()
    }
}

/// The target the mafia settled on: the confirmed one, else the majority vote
pub fn mafia_target(game: &Game) -> Option<UserId> {
    game.night
        .mafia_confirmed
        .or_else(|| majority_target(&game.night.mafia_votes))
}

fn can_act(game: &Game, actor: UserId) -> bool {
    game.player(actor).is_some_and(|p| p.alive && !p.blocked)
}

fn acting_picks(game: &Game, kind: NightActionKind) -> Vec<(UserId, UserId)> {
    game.night
        .picks_of(kind)
        .filter(|p| can_act(game, p.actor))
        .map(|p| (p.actor, p.target))
        .collect()
}

fn investigate(game: &Game, investigator: RoleKey, target: UserId) -> InvestigationResult {
    let Some(player) = game.player(target).filter(|p| p.alive) else {
        return InvestigationResult::Unavailable;
    };
    let role = player.role;

    if investigator == RoleKey::Sheriff {
        return match role {
            Some(r) if r.faction() == Faction::Mafia || r == RoleKey::SerialKiller => {
                InvestigationResult::Guilty
            }
            _ => InvestigationResult::Innocent,
        };
    }

    match role {
        Some(r) if !r.undetectable_by_detective() => r
            .detective_signature()
            .map(InvestigationResult::Signature)
            .unwrap_or(InvestigationResult::Innocent),
        _ => InvestigationResult::Innocent,
    }
}

pub fn resolve_night(game: &mut Game) -> NightReport {
    let mut report = NightReport::default();

    // Blocks apply first; a blocked blocker still blocks.
    let blocked: HashSet<UserId> = game
        .night
        .picks_of(NightActionKind::Block)
        .filter(|p| game.is_alive(p.actor))
        .map(|p| p.target)
        .collect();
    for target in &blocked {
        if let Some(p) = game.player_mut(*target) {
            p.blocked = true;
        }
    }

    let mut attacks: Vec<(UserId, AttackSource)> = Vec::new();

    if let Some(target) = mafia_target(game) {
        let has_source = game
            .alive_players()
            .any(|p| !p.blocked && p.role.is_some_and(|r| r.can_carry_mafia_attack()));
        if has_source {
            attacks.push((target, AttackSource::Mafia));
        }
    }

    for (_, target) in acting_picks(game, NightActionKind::VigilanteShot) {
        attacks.push((target, AttackSource::Vigilante));
    }
    for (_, target) in acting_picks(game, NightActionKind::SerialKill) {
        attacks.push((target, AttackSource::SerialKiller));
    }

    let heals: HashSet<UserId> = acting_picks(game, NightActionKind::Heal)
        .into_iter()
        .map(|(_, target)| target)
        .collect();
    let guards: HashMap<UserId, UserId> = acting_picks(game, NightActionKind::Guard)
        .into_iter()
        .map(|(actor, target)| (target, actor))
        .collect();

    for (target, source) in attacks {
        if !game.is_alive(target) {
            continue;
        }

        if heals.contains(&target) {
            report.events.push(NightEvent::Healed { target });
            continue;
        }

        if let Some(&guard) = guards.get(&target) {
            if let Some(g) = game.player_mut(guard).filter(|g| g.alive) {
                g.alive = false;
                report.events.push(NightEvent::GuardDied {
                    guard,
                    protected: target,
                });
                continue;
            }
        }

        if let Some(victim) = game.player_mut(target) {
            victim.alive = false;
            report.events.push(NightEvent::Killed {
                target,
                role: victim.role,
                source,
            });
        }
    }

    for (_, target) in acting_picks(game, NightActionKind::Blackmail) {
        if let Some(victim) = game.player_mut(target).filter(|p| p.alive) {
            victim.silenced = true;
            report.events.push(NightEvent::Silenced { target });
        }
    }

    for (actor, target) in acting_picks(game, NightActionKind::Investigate) {
        let Some(role) = game.player(actor).and_then(|p| p.role) else {
            continue;
        };
        report.investigations.push(Investigation {
            investigator: actor,
            target,
            result: investigate(game, role, target),
        });
    }

    game.night.clear();
    for player in game.players.values_mut() {
        player.blocked = false;
    }
    game.phase_deadline = None;
    game.touch();

    report.winner = check_winner(game);
    report
}
