//! Dashboard views of games

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{ChatId, Game, Phase, Player, RoleKey, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub user_id: UserId,
    pub name: String,
    pub alive: bool,
    pub role: Option<RoleKey>,
}

impl PlayerView {
    /// Every role visible
    pub fn admin(player: &Player) -> Self {
        Self {
            user_id: player.user_id,
            name: player.name.clone(),
            alive: player.alive,
            role: player.role,
        }
    }

    /// Roles of living players hidden
    pub fn public(player: &Player) -> Self {
        Self {
            role: player.role.filter(|_| !player.alive),
            ..Self::admin(player)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    pub chat_id: ChatId,
    pub phase: Phase,
    pub host_id: UserId,
    pub night_seconds: i64,
    pub day_seconds: i64,
    pub players: Vec<PlayerView>,
}

impl From<&Game> for GameView {
    fn from(game: &Game) -> Self {
        Self {
            chat_id: game.chat_id,
            phase: game.phase,
            host_id: game.host_id,
            night_seconds: game.night_seconds,
            day_seconds: game.day_seconds,
            players: game.players.values().map(PlayerView::admin).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GamesResponse {
    pub games: Vec<GameView>,
}

/// Public read-only state of a game
#[derive(Debug, Clone, Serialize)]
pub struct GameStateResponse {
    pub chat_id: ChatId,
    pub queried_id: ChatId,
    pub used_id: ChatId,
    pub phase: Phase,
    pub players: Vec<PlayerView>,
    pub night_seconds: i64,
    pub day_seconds: i64,
}

impl GameStateResponse {
    pub fn new(game: &Game, queried_id: ChatId, used_id: ChatId) -> Self {
        Self {
            chat_id: game.chat_id,
            queried_id,
            used_id,
            phase: game.phase,
            players: game.players.values().map(PlayerView::public).collect(),
            night_seconds: game.night_seconds,
            day_seconds: game.day_seconds,
        }
    }
}

/// Phase times in minutes, as posted by the dashboard form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditTimesForm {
    #[serde(default)]
    pub night: Option<String>,
    #[serde(default)]
    pub day: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateTimesRequest {
    pub chat_id: ChatId,
    #[validate(range(min = 1, message = "night_seconds must be positive"))]
    pub night_seconds: Option<i64>,
    #[validate(range(min = 1, message = "day_seconds must be positive"))]
    pub day_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimesResponse {
    pub ok: bool,
    pub chat_id: ChatId,
    pub queried_id: ChatId,
    pub used_id: ChatId,
    pub night_seconds: i64,
    pub day_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OkResponse {
    pub ok: bool,
    pub chat_id: ChatId,
    pub used_id: ChatId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Game {
        let mut game = Game::new(-100, 1);
        game.add_player(1, "Ana").unwrap();
        game.add_player(2, "Bea").unwrap();
        game.player_mut(1).unwrap().role = Some(RoleKey::Doctor);
        let bea = game.player_mut(2).unwrap();
        bea.role = Some(RoleKey::Mafioso);
        bea.alive = false;
        game
    }

    #[test]
    fn test_public_view_hides_living_roles() {
        let state = GameStateResponse::new(&game(), 100, -100);

        assert_eq!(state.players[0].role, None);
        assert_eq!(state.players[1].role, Some(RoleKey::Mafioso));
        assert_eq!(state.used_id, -100);
    }

    #[test]
    fn test_admin_view_serializes_role_keys() {
        let json = serde_json::to_value(GameView::from(&game())).unwrap();

        assert_eq!(json["phase"], "lobby");
        assert_eq!(json["players"][0]["role"], "doctor");
        assert_eq!(json["players"][1]["alive"], false);
    }

    #[test]
    fn test_update_times_validation() {
        let ok = UpdateTimesRequest {
            chat_id: -1,
            night_seconds: Some(300),
            day_seconds: None,
        };
        assert!(ok.validate().is_ok());

        let bad = UpdateTimesRequest {
            chat_id: -1,
            night_seconds: Some(0),
            day_seconds: None,
        };
        assert!(bad.validate().is_err());
    }
}
