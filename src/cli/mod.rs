//! CLI module for the mafia bot
//!
//! Provides subcommands for running in different modes:
//! - `serve`: Telegram bot, dashboard and timers (default)
//! - `dashboard`: dashboard only, no polling and no timers
//! - `migrate`: apply database migrations and exit

pub mod dashboard;
pub mod migrate;
mod runtime;
pub mod serve;

use clap::{Parser, Subcommand};

/// Telegram mafia game bot
#[derive(Parser)]
#[command(name = "mafiabot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the bot, the dashboard and the game timers (default mode)
    Serve,

    /// Run the dashboard only
    Dashboard(dashboard::DashboardArgs),

    /// Apply database migrations and exit
    Migrate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["mafiabot", "dashboard"]);
        assert_eq!(
            cli.command,
            Some(Command::Dashboard(dashboard::DashboardArgs { in_memory: false }))
        );

        let cli = Cli::parse_from(["mafiabot", "dashboard", "--in-memory"]);
        assert_eq!(
            cli.command,
            Some(Command::Dashboard(dashboard::DashboardArgs { in_memory: true }))
        );

        let cli = Cli::parse_from(["mafiabot", "migrate"]);
        assert_eq!(cli.command, Some(Command::Migrate));
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::parse_from(["mafiabot"]);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(Cli::try_parse_from(["mafiabot", "api"]).is_err());
    }
}
