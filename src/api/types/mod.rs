//! Dashboard request and response types

pub mod error;
pub mod game;
pub mod json;

pub use error::{ApiError, ApiErrorResponse};
pub use game::{
    EditTimesForm, GameStateResponse, GameView, GamesResponse, OkResponse, PlayerView,
    TimesResponse, UpdateTimesRequest,
};
pub use json::Json;
