use clap::Parser;
use mafiabot::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => cli::serve::run().await,
        Command::Dashboard(args) => cli::dashboard::run(args).await,
        Command::Migrate => cli::migrate::run().await,
    }
}
