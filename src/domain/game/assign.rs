use rand::seq::SliceRandom;
use rand::Rng;

use super::entity::{Game, UserId};
use crate::domain::role::RoleKey;

/// Deal roles to every player according to the game's role configuration.
///
/// The pool is padded with citizens when the configuration has fewer roles
/// than players; surplus roles are left undealt.
pub fn assign_roles<R: Rng + ?Sized>(game: &mut Game, rng: &mut R) {
    let mut ids: Vec<UserId> = game.players.keys().copied().collect();
    ids.shuffle(rng);

    let mut pool: Vec<RoleKey> = game
        .roles_config
        .iter()
        .flat_map(|(role, count)| std::iter::repeat_n(*role, (*count).max(0) as usize))
        .collect();

    while pool.len() < ids.len() {
        pool.push(RoleKey::Citizen);
    }
    pool.shuffle(rng);

    for (user_id, role) in ids.into_iter().zip(pool) {
        if let Some(player) = game.player_mut(user_id) {
            player.role = Some(role);
        }
    }

    game.touch();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game_with_players(n: i64) -> Game {
        let mut game = Game::new(-1, 1);
        for id in 1..=n {
            game.add_player(id, format!("P{}", id)).unwrap();
        }
        game
    }

    fn count_role(game: &Game, role: RoleKey) -> usize {
        game.players.values().filter(|p| p.role == Some(role)).count()
    }

    #[test]
    fn test_default_config_with_four_players() {
        let mut game = game_with_players(4);
        let mut rng = StdRng::seed_from_u64(7);

        assign_roles(&mut game, &mut rng);

        assert_eq!(count_role(&game, RoleKey::Mafioso), 1);
        assert_eq!(count_role(&game, RoleKey::Citizen), 3);
    }

    #[test]
    fn test_pads_with_citizens() {
        let mut game = game_with_players(6);
        let mut rng = StdRng::seed_from_u64(1);

        assign_roles(&mut game, &mut rng);

        assert!(game.players.values().all(|p| p.role.is_some()));
        assert_eq!(count_role(&game, RoleKey::Mafioso), 1);
        assert_eq!(count_role(&game, RoleKey::Citizen), 5);
    }

    #[test]
    fn test_surplus_roles_are_dropped() {
        let mut game = game_with_players(4);
        game.roles_config.clear();
        game.roles_config.insert(RoleKey::Doctor, 3);
        game.roles_config.insert(RoleKey::Mafioso, 3);
        let mut rng = StdRng::seed_from_u64(3);

        assign_roles(&mut game, &mut rng);

        assert_eq!(
            count_role(&game, RoleKey::Doctor) + count_role(&game, RoleKey::Mafioso),
            4
        );
    }

    #[test]
    fn test_negative_counts_contribute_nothing() {
        let mut game = game_with_players(4);
        game.roles_config.clear();
        game.roles_config.insert(RoleKey::Vigilante, -2);
        let mut rng = StdRng::seed_from_u64(11);

        assign_roles(&mut game, &mut rng);

        assert_eq!(count_role(&game, RoleKey::Citizen), 4);
    }
}
