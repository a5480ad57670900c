//! Migrate command - apply pending migrations and exit

use tracing::info;

use super::runtime;

pub async fn run() -> anyhow::Result<()> {
    let (config, _log_guard) = runtime::bootstrap();

    runtime::open_storage(&config).await?;
    info!("Migrations applied");

    Ok(())
}
