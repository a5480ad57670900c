//! Shared dashboard state

use std::sync::Arc;

use crate::infrastructure::services::{GameEngine, GameManager};

#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<GameEngine>,
    /// Secret every protected route expects
    pub dash_token: Arc<str>,
}

impl AppState {
    pub fn new(engine: Arc<GameEngine>, dash_token: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            dash_token: dash_token.into(),
        }
    }

    pub fn games(&self) -> &Arc<GameManager> {
        self.engine.games()
    }
}
