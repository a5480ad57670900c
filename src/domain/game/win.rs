use serde::Serialize;

use super::entity::Game;
use crate::domain::role::{Faction, RoleKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Town,
    Mafia,
    SerialKiller,
}

pub fn check_winner(game: &Game) -> Option<Winner> {
    let alive_with = |faction: Faction| {
        game.alive_players()
            .filter(|p| p.role.is_some_and(|r| r.faction() == faction))
            .count()
    };

    let mafia = alive_with(Faction::Mafia);
    let town = alive_with(Faction::Town);
    let serial_killer_alive = game
        .alive_players()
        .any(|p| p.role == Some(RoleKey::SerialKiller));

    if mafia == 0 && !serial_killer_alive {
        return Some(Winner::Town);
    }

    if mafia > 0 && mafia >= town {
        return Some(Winner::Mafia);
    }

    if serial_killer_alive && game.alive_count() == 1 {
        return Some(Winner::SerialKiller);
    }

    None
}
