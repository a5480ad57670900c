//! Role catalogue
//!
//! Roles are stored and exchanged with their Spanish keys
//! (`ciudadano`, `mafia`, ...), which is also what group hosts write in
//! role configurations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DomainError;

/// Side a role plays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Town,
    Mafia,
    Neutral,
}

/// What a role does when night falls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NightActionKind {
    MafiaPick,
    Heal,
    Block,
    Guard,
    VigilanteShot,
    SerialKill,
    Investigate,
    Blackmail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleKey {
    #[serde(rename = "ciudadano")]
    Citizen,
    #[serde(rename = "mafia")]
    Mafioso,
    #[serde(rename = "padrino")]
    Godfather,
    #[serde(rename = "consorte")]
    Consort,
    #[serde(rename = "chantajeador")]
    Blackmailer,
    #[serde(rename = "doctor")]
    Doctor,
    #[serde(rename = "escort")]
    Escort,
    #[serde(rename = "guardaespaldas")]
    Bodyguard,
    #[serde(rename = "vigilante")]
    Vigilante,
    #[serde(rename = "detective")]
    Detective,
    #[serde(rename = "sheriff")]
    Sheriff,
    #[serde(rename = "asesino")]
    SerialKiller,
}

impl RoleKey {
    pub const ALL: [RoleKey; 12] = [
        RoleKey::Citizen,
        RoleKey::Mafioso,
        RoleKey::Godfather,
        RoleKey::Consort,
        RoleKey::Blackmailer,
        RoleKey::Doctor,
        RoleKey::Escort,
        RoleKey::Bodyguard,
        RoleKey::Vigilante,
        RoleKey::Detective,
        RoleKey::Sheriff,
        RoleKey::SerialKiller,
    ];

    /// Storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "ciudadano",
            Self::Mafioso => "mafia",
            Self::Godfather => "padrino",
            Self::Consort => "consorte",
            Self::Blackmailer => "chantajeador",
            Self::Doctor => "doctor",
            Self::Escort => "escort",
            Self::Bodyguard => "guardaespaldas",
            Self::Vigilante => "vigilante",
            Self::Detective => "detective",
            Self::Sheriff => "sheriff",
            Self::SerialKiller => "asesino",
        }
    }

    /// Display name shown to players
    pub fn name(&self) -> &'static str {
        match self {
            Self::Citizen => "Ciudadano",
            Self::Mafioso => "Mafioso",
            Self::Godfather => "Padrino",
            Self::Consort => "Consorte",
            Self::Blackmailer => "Chantajeador",
            Self::Doctor => "Doctor",
            Self::Escort => "Escort",
            Self::Bodyguard => "Guardaespaldas",
            Self::Vigilante => "Vigilante",
            Self::Detective => "Detective",
            Self::Sheriff => "Sheriff",
            Self::SerialKiller => "Asesino en Serie",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Citizen => {
                "No tienes habilidades nocturnas. Descubre a la Mafia y vota con cabeza."
            }
            Self::Mafioso => "Cada noche votas con la Mafia a quién eliminar.",
            Self::Godfather => {
                "Lideras a la Mafia y votas a quién eliminar. El Detective no puede descubrirte."
            }
            Self::Consort => {
                "Trabajas para la Mafia: cada noche bloqueas la habilidad de un jugador."
            }
            Self::Blackmailer => {
                "Trabajas para la Mafia: cada noche silencias a un jugador durante el día."
            }
            Self::Doctor => "Cada noche eliges a un jugador para curarle de cualquier ataque.",
            Self::Escort => "Cada noche bloqueas la habilidad de un jugador.",
            Self::Bodyguard => {
                "Cada noche proteges a un jugador; si le atacan, mueres en su lugar."
            }
            Self::Vigilante => "Cada noche puedes disparar a un jugador sospechoso.",
            Self::Detective => "Cada noche investigas a un jugador y recibes la firma de su rol.",
            Self::Sheriff => {
                "Cada noche investigas a un jugador y sabes si es culpable o inocente."
            }
            Self::SerialKiller => {
                "Juegas solo. Cada noche matas a un jugador. Ganas si quedas el último."
            }
        }
    }

    pub fn faction(&self) -> Faction {
        match self {
            Self::Mafioso | Self::Godfather | Self::Consort | Self::Blackmailer => Faction::Mafia,
            Self::SerialKiller => Faction::Neutral,
            _ => Faction::Town,
        }
    }

    pub fn night_action(&self) -> Option<NightActionKind> {
        match self {
            Self::Citizen => None,
            Self::Mafioso | Self::Godfather => Some(NightActionKind::MafiaPick),
            Self::Consort | Self::Escort => Some(NightActionKind::Block),
            Self::Blackmailer => Some(NightActionKind::Blackmail),
            Self::Doctor => Some(NightActionKind::Heal),
            Self::Bodyguard => Some(NightActionKind::Guard),
            Self::Vigilante => Some(NightActionKind::VigilanteShot),
            Self::Detective | Self::Sheriff => Some(NightActionKind::Investigate),
            Self::SerialKiller => Some(NightActionKind::SerialKill),
        }
    }

    /// What a detective learns when investigating this role
    pub fn detective_signature(&self) -> Option<&'static str> {
        match self {
            Self::Citizen | Self::Godfather => None,
            Self::Mafioso | Self::Bodyguard | Self::Vigilante => Some("Armas de fuego"),
            Self::Consort | Self::Escort => Some("Perfume"),
            Self::Blackmailer => Some("Papeles comprometedores"),
            Self::Doctor => Some("Material médico"),
            Self::Detective | Self::Sheriff => Some("Placa y lupa"),
            Self::SerialKiller => Some("Manchas de sangre"),
        }
    }

    pub fn undetectable_by_detective(&self) -> bool {
        matches!(self, Self::Godfather)
    }

    /// Roles that take part in the collective mafia kill vote
    pub fn is_mafia_voter(&self) -> bool {
        self.night_action() == Some(NightActionKind::MafiaPick)
    }

    /// Roles that can source the mafia attack
    pub fn can_carry_mafia_attack(&self) -> bool {
        matches!(self, Self::Mafioso | Self::Godfather | Self::Consort)
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RoleKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();

        Self::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == key)
            .ok_or_else(|| DomainError::validation(format!("Unknown role '{}'", s)))
    }
}
