//! Long-polling update loop

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use super::client::TelegramClient;
use super::types::Update;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Receives every update the poller fetches
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, update: Update);
}

/// Next back-off delay after a failed poll
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    handler: Arc<dyn UpdateHandler>,
    timeout_secs: u64,
}

impl UpdatePoller {
    pub fn new(
        client: Arc<TelegramClient>,
        handler: Arc<dyn UpdateHandler>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            handler,
            timeout_secs,
        }
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut offset: Option<i64> = None;
        let mut backoff = INITIAL_BACKOFF;

        info!(timeout_secs = self.timeout_secs, "Telegram polling started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let poll = tokio::select! {
                result = self.client.get_updates(offset, self.timeout_secs) => result,
                _ = shutdown.changed() => break,
            };

            match poll {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;

                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let handler = Arc::clone(&self.handler);
                        tokio::spawn(async move {
                            handler.handle(update).await;
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_in_secs = backoff.as_secs(), "Polling failed");

                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => break,
                    }
                    backoff = next_backoff(backoff);
                }
            }
        }

        info!("Telegram polling stopped");
    }
}
