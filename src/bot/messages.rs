//! User-facing texts
//!
//! The bot speaks Spanish. Texts sent with Markdown escape player names;
//! plain texts never need escaping.

use crate::domain::game::{Game, InvestigationResult, NightEvent, NightReport, Phase, Winner};
use crate::domain::RoleKey;

/// Escape characters that carry meaning in Telegram's legacy Markdown
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Lobby => "lobby",
        Phase::Night => "noche",
        Phase::Day => "día",
        Phase::Voting => "votación",
        Phase::Inactive => "terminada",
    }
}

// Commands

pub const CREATE_IN_GROUP: &str = "Crea la partida en un grupo.";
pub const GAME_EXISTS: &str = "Ya existe una partida en este grupo.";
pub const NO_GAME_CREATE_HINT: &str = "No hay partida en este grupo. Crea una con /crearpartida.";
pub const NO_GAME: &str = "No hay partida.";
pub const NO_GAME_HERE: &str = "No hay partida en este grupo.";
pub const ALREADY_JOINED: &str = "Ya estabas en la partida.";
pub const JOIN_CLOSED: &str = "La partida ya ha comenzado; no se admiten nuevos jugadores.";
pub const CANNOT_LEAVE: &str = "No puedes salir una vez que la partida ha empezado.";
pub const LEFT: &str = "Te has salido de la partida.";
pub const NOT_IN_GAME: &str = "No estabas en la partida.";
pub const ALREADY_STARTED: &str = "La partida ya ha comenzado.";
pub const NOTHING_IN_DB: &str = "No hay partida en la base de datos para este grupo.";
pub const DELETE_FORBIDDEN: &str =
    "Solo un administrador o el creador del grupo puede borrar la partida.";
pub const DELETED: &str = "Partida borrada (memoria y base de datos).";
pub const RATE_LIMITED: &str = "⏳ Demasiadas acciones rápidas. Espera un momento.";
pub const INTERNAL_ERROR: &str = "⚠️ Error interno. Inténtalo más tarde.";

pub const HELP: &str = "Comandos disponibles:\n\
/crearpartida - crea una partida en este grupo\n\
/unirme - únete a la partida\n\
/salirme - sal de la partida (solo en el lobby)\n\
/estado - fase y jugadores vivos\n\
/empezar - reparte los roles y empieza la noche\n\
/resyncpartida - recarga la partida desde la base de datos\n\
/borrarpartida - borra la partida (administradores)\n\
/ayuda - muestra esta ayuda";

pub fn game_created(host: &str) -> String {
    format!("Partida creada por {}. Usa /unirme para entrar.", host)
}

pub fn joined(name: &str) -> String {
    format!("{} se ha unido a la partida.", name)
}

pub fn need_players(min: usize) -> String {
    format!("Se necesitan al menos {} jugadores.", min)
}

pub fn already_loaded(phase: Phase) -> String {
    format!("La partida ya está cargada en memoria. Fase: {}", phase)
}

pub fn rehydrated(phase: Phase) -> String {
    format!("Partida rehidratada desde la base de datos. Fase: {}", phase)
}

pub fn status(game: &Game) -> String {
    let mut lines = vec![
        format!("Partida en chat {} - fase: {}", game.chat_id, game.phase),
        String::new(),
        "Jugadores vivos:".to_string(),
    ];

    for player in game.alive_players() {
        if player.silenced {
            lines.push(format!("- {} (silenciado)", player.name));
        } else {
            lines.push(format!("- {}", player.name));
        }
    }

    lines.join("\n")
}

// Game start

pub const NIGHT_STARTED: &str =
    "🌙 Empieza la noche. Los jugadores con habilidades recibirán un DM.";

pub fn role_dm(role: RoleKey) -> String {
    format!("Tu rol: *{}*\n{}", role.name(), role.description())
}

pub fn dm_failed(name: &str) -> String {
    format!("No pude enviar DM a {}; pídeles que inicien chat con el bot.", name)
}

pub fn resend_role(name: &str, role: RoleKey) -> String {
    format!(
        "⚠️ {}, no recibiste tu rol en privado.\nTu rol es: *{}*\n{}",
        escape_markdown(name),
        role.name(),
        role.description()
    )
}

// Night prompts and button presses

pub fn night_prompt(role: RoleKey) -> String {
    format!("🌙 Noche: *{}*. Elige objetivo:", role.name())
}

pub fn night_no_targets(role: RoleKey) -> String {
    format!("🌙 Noche: *{}*. No hay objetivos disponibles.", role.name())
}

pub const INVALID_ACTION: &str = "Acción inválida.";
pub const INVALID_TARGET: &str = "Target inválido.";
pub const EXPIRED_OR_INVALID: &str = "Acción expirada o no válida.";
pub const GAME_NOT_FOUND: &str = "Partida no encontrada.";
pub const EXPIRED: &str = "Esta acción ha expirado.";
pub const NOT_AUTHORIZED: &str = "No autorizado para pulsar este botón.";
pub const WRONG_PHASE: &str = "Esta acción ya no está disponible en esta fase.";
pub const TARGET_UNAVAILABLE: &str = "Ese jugador ya no está disponible.";
pub const DEAD_CANNOT_ACT: &str = "Los jugadores muertos no pueden actuar.";
pub const ONLY_MAFIA: &str = "Solo la mafia puede confirmar este objetivo.";
pub const ONLY_ALIVE_VOTE: &str = "Solo los jugadores vivos pueden votar.";
pub const CONFIRM_BUTTON: &str = "Confirmar objetivo";
pub const VOTE_PROMPT: &str = "Pulsa para votar:";

pub fn mafia_vote_recorded(target: &str) -> String {
    format!("Tu voto de mafia ha sido registrado: {}", target)
}

pub fn confirmations(count: usize) -> String {
    format!("Has confirmado. Confirmaciones: {}", count)
}

pub fn target_confirmed(target: &str) -> String {
    format!("Objetivo confirmado: {}", target)
}

pub fn heal_chosen(target: &str) -> String {
    format!("Has elegido curar a {}.", target)
}

pub fn block_chosen(target: &str) -> String {
    format!("Has elegido bloquear a {}.", target)
}

pub fn guard_chosen(target: &str) -> String {
    format!("Has elegido proteger a {}.", target)
}

pub fn attack_chosen(target: &str) -> String {
    format!("Has elegido atacar a {}.", target)
}

pub fn investigate_chosen(target: &str) -> String {
    format!("Has investigado a {}. Resultado llegará por DM.", target)
}

pub fn blackmail_chosen(target: &str) -> String {
    format!("Has chantajeado a {}.", target)
}

pub fn voted(target: &str) -> String {
    format!("Has votado por {}.", target)
}

pub fn mafia_proposal(target: &str) -> String {
    format!(
        "La mafia propone matar a *{}*. Pulsa confirmar.",
        escape_markdown(target)
    )
}

pub fn mafia_majority_applied(target: &str) -> String {
    format!(
        "✅ La Mafia no confirmó por unanimidad. Se aplica la mayoría: objetivo {}.",
        target
    )
}

// Night resolution

pub fn investigation(result: &InvestigationResult) -> String {
    let verdict = match result {
        InvestigationResult::Unavailable => "No válido (jugador no disponible).".to_string(),
        InvestigationResult::Guilty => "CULPABLE".to_string(),
        InvestigationResult::Innocent => "INOCENTE".to_string(),
        InvestigationResult::Signature(signature) => format!("Firma: {}", signature),
    };
    format!("🔎 Resultado de investigación: {}", verdict)
}

/// Night summary for the group; player names are escaped
pub fn night_summary(game: &Game, report: &NightReport) -> String {
    let name = |id| escape_markdown(&game.player_name(id));

    let mut lines: Vec<String> = report
        .events
        .iter()
        .map(|event| match event {
            NightEvent::Healed { target } => {
                format!("- {} fue curado/a y sobrevivió a un ataque.", name(*target))
            }
            NightEvent::GuardDied { guard, protected } => format!(
                "- {} (Guardaespaldas) murió protegiendo a {}.",
                name(*guard),
                name(*protected)
            ),
            NightEvent::Killed { target, role, .. } => format!(
                "- {} fue asesinado/a. Era *{}*.",
                name(*target),
                role.map(|r| r.name()).unwrap_or("?")
            ),
            NightEvent::Silenced { target } => format!(
                "- {} fue chantajeado/a y estará silenciado durante el día.",
                name(*target)
            ),
        })
        .collect();

    if lines.is_empty() {
        lines.push("Esta noche no hubo muertes.".to_string());
    }

    format!("*Resumen de la noche:*\n{}", lines.join("\n"))
}

pub fn winner(winner: Winner) -> &'static str {
    match winner {
        Winner::Town => "🎉 ¡El Pueblo gana!",
        Winner::Mafia => "😈 ¡La Mafia gana!",
        Winner::SerialKiller => "🔪 El Asesino en Serie ha ganado.",
    }
}

// Day and voting

pub const DAY_STARTED: &str = "🌞 Se hace de día. Discusión.";
pub const VOTING_STARTED: &str = "🗳️ Fin del día. Por favor votad con los botones.";
pub const NO_VOTES: &str = "No hubo votos. No se lincha a nadie.";
pub const TIE: &str = "Empate en la votación. No se lincha a nadie.";
pub const NIGHT_RETURNS: &str = "🌙 Vuelve la noche.";
pub const NIGHT_BEGINS: &str = "🌙 Comienza la noche.";

pub fn lynched(name: &str, role: Option<RoleKey>) -> String {
    format!(
        "⚖️ El pueblo linchó a {}. Era *{}*.",
        escape_markdown(name),
        role.map(|r| r.name()).unwrap_or("?")
    )
}

pub fn reminder(phase: Phase, alive: usize) -> String {
    format!(
        "⏳ Recordatorio: fase *{}*. Jugadores vivos: {}",
        phase_label(phase),
        alive
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game::AttackSource;

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("jose_luis *pro*"), "jose\\_luis \\*pro\\*");
        assert_eq!(escape_markdown("[x]`y`"), "\\[x]\\`y\\`");
        assert_eq!(escape_markdown("Ana"), "Ana");
    }

    #[test]
    fn test_status_marks_silenced_players() {
        let mut game = Game::new(-1, 1);
        game.add_player(1, "Ana").unwrap();
        game.add_player(2, "Luis").unwrap();
        game.add_player(3, "Eva").unwrap();
        game.player_mut(2).unwrap().silenced = true;
        game.player_mut(3).unwrap().alive = false;

        let text = status(&game);

        assert!(text.starts_with("Partida en chat -1 - fase: lobby"));
        assert!(text.contains("- Ana"));
        assert!(text.contains("- Luis (silenciado)"));
        assert!(!text.contains("Eva"));
    }

    #[test]
    fn test_night_summary_lines() {
        let mut game = Game::new(-1, 1);
        game.add_player(1, "Ana_B").unwrap();
        game.add_player(2, "Luis").unwrap();

        let report = NightReport {
            events: vec![
                NightEvent::Killed {
                    target: 1,
                    role: Some(RoleKey::Doctor),
                    source: AttackSource::Mafia,
                },
                NightEvent::Silenced { target: 2 },
            ],
            ..Default::default()
        };

        let text = night_summary(&game, &report);
        assert!(text.starts_with("*Resumen de la noche:*"));
        assert!(text.contains("- Ana\\_B fue asesinado/a. Era *Doctor*."));
        assert!(text.contains("Luis fue chantajeado/a"));

        let quiet = night_summary(&game, &NightReport::default());
        assert!(quiet.ends_with("Esta noche no hubo muertes."));
    }

    #[test]
    fn test_investigation_texts() {
        assert_eq!(
            investigation(&InvestigationResult::Guilty),
            "🔎 Resultado de investigación: CULPABLE"
        );
        assert_eq!(
            investigation(&InvestigationResult::Signature("Perfume")),
            "🔎 Resultado de investigación: Firma: Perfume"
        );
    }
}
