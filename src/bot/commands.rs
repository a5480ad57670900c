//! Slash command parsing

use std::fmt;

/// Commands understood in group chats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    CreateGame,
    Join,
    Leave,
    Status,
    Start,
    Resync,
    Delete,
    Help,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateGame => "crearpartida",
            Self::Join => "unirme",
            Self::Leave => "salirme",
            Self::Status => "estado",
            Self::Start => "empezar",
            Self::Resync => "resyncpartida",
            Self::Delete => "borrarpartida",
            Self::Help => "ayuda",
        }
    }

    /// Parse the first word of a message, accepting the `/cmd@BotName` form
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(cmd, _)| cmd);

        match name.to_lowercase().as_str() {
            "crearpartida" => Some(Self::CreateGame),
            "unirme" => Some(Self::Join),
            "salirme" => Some(Self::Leave),
            "estado" => Some(Self::Status),
            "empezar" => Some(Self::Start),
            "resyncpartida" => Some(Self::Resync),
            "borrarpartida" => Some(Self::Delete),
            "ayuda" | "help" | "start" => Some(Self::Help),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}
