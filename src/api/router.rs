use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::dashboard;
use super::health;
use super::middleware::{dash_auth_middleware, logging_middleware, security_headers_middleware};
use super::state::AppState;

/// Routes behind the dashboard token
fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::home))
        .route("/admin/list_games", get(dashboard::list_games))
        .route("/admin/update_times", post(dashboard::update_times))
        .route("/edit/{chat_id}", post(dashboard::edit_times))
        .route("/force_resolve/{chat_id}", post(dashboard::force_resolve))
        .route("/reset_lobby/{chat_id}", post(dashboard::reset_lobby))
        .route(
            "/resend_role/{chat_id}/{user_id}",
            get(dashboard::resend_role),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            dash_auth_middleware,
        ))
}

/// Create the dashboard router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .route("/game/{chat_id}/estado", get(dashboard::game_state))
        .merge(protected_routes(&state))
        .with_state(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::game::{unix_now, Game};
    use crate::domain::messenger::mock::RecordingMessenger;
    use crate::domain::{GameRepository, Phase, RoleKey};
    use crate::infrastructure::scheduler::JobScheduler;
    use crate::infrastructure::services::{
        EngineSettings, GameEngine, GameManager, PendingActionService,
    };
    use crate::infrastructure::storage::{InMemoryGameRepository, InMemoryPendingActionRepository};

    const TOKEN: &str = "s3cret";

    struct TestApp {
        router: Router,
        repo: Arc<InMemoryGameRepository>,
        messenger: Arc<RecordingMessenger>,
        engine: Arc<GameEngine>,
    }

    fn app() -> TestApp {
        let pending = Arc::new(InMemoryPendingActionRepository::new());
        let repo = Arc::new(InMemoryGameRepository::with_pending_actions(pending.clone()));
        let messenger = Arc::new(RecordingMessenger::new());
        let engine = Arc::new(
            GameEngine::new(
                Arc::new(GameManager::new(repo.clone())),
                Arc::new(PendingActionService::new(pending, 3600)),
                messenger.clone(),
                Arc::new(JobScheduler::new()),
                EngineSettings::default(),
            )
            .with_seed(3),
        );

        TestApp {
            router: create_router(AppState::new(engine.clone(), TOKEN)),
            repo,
            messenger,
            engine,
        }
    }

    async fn seed(app: &TestApp, phase: Phase) {
        let mut game = Game::new(-100, 1);
        let roles = [
            RoleKey::Mafioso,
            RoleKey::Doctor,
            RoleKey::Citizen,
            RoleKey::Citizen,
        ];
        for (i, role) in roles.iter().enumerate() {
            let id = i as i64 + 1;
            game.add_player(id, format!("P{}", id)).unwrap();
            game.player_mut(id).unwrap().role = Some(*role);
        }
        game.player_mut(4).unwrap().alive = false;
        game.enter_phase(phase, Some(unix_now() + 300));
        app.repo.save(&game).await.unwrap();
        app.engine.games().load_all().await.unwrap();
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, String) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn form_req(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json(body: &str) -> Value {
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints_are_public() {
        let app = app();

        assert_eq!(send(&app, get_req("/health")).await.0, StatusCode::OK);
        assert_eq!(send(&app, get_req("/live")).await.0, StatusCode::OK);
        let (status, body) = send(&app, get_req("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "healthy");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = app();

        let (status, body) = send(&app, get_req("/admin/list_games")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json(&body)["error"]["message"], "Unauthorized");

        let (status, _) = send(&app, get_req("/?token=wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_sources() {
        let app = app();

        let query = get_req("/admin/list_games?token=s3cret");
        assert_eq!(send(&app, query).await.0, StatusCode::OK);

        let header = Request::builder()
            .uri("/admin/list_games")
            .header("x-dash-token", "\"s3cret\"")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, header).await.0, StatusCode::OK);

        let bearer = Request::builder()
            .uri("/admin/list_games")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, bearer).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_home_renders_html_with_security_headers() {
        let app = app();
        seed(&app, Phase::Night).await;

        let response = app
            .router
            .clone()
            .oneshot(get_req("/?token=s3cret"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["cache-control"], "no-store");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("Chat -100 (url id=100) - fase: night"));
    }

    #[tokio::test]
    async fn test_public_state_hides_living_roles() {
        let app = app();
        seed(&app, Phase::Day).await;

        let (status, body) = send(&app, get_req("/game/100/estado")).await;
        assert_eq!(status, StatusCode::OK);

        let state = json(&body);
        assert_eq!(state["queried_id"], 100);
        assert_eq!(state["used_id"], -100);
        assert_eq!(state["phase"], "day");
        let players = state["players"].as_array().unwrap();
        assert!(players[0]["role"].is_null());
        assert_eq!(players[3]["role"], "ciudadano");
    }

    #[tokio::test]
    async fn test_public_state_unknown_game() {
        let app = app();

        let (status, body) = send(&app, get_req("/game/55/estado")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error = json(&body);
        assert_eq!(error["error"]["message"], "no game");
        assert_eq!(error["error"]["queried_id"], 55);
    }

    #[tokio::test]
    async fn test_list_games_includes_roles() {
        let app = app();
        seed(&app, Phase::Lobby).await;

        let (status, body) = send(&app, get_req("/admin/list_games?token=s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        let games = json(&body)["games"].as_array().unwrap().clone();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0]["players"][0]["role"], "mafia");
    }

    #[tokio::test]
    async fn test_edit_times_with_form_token() {
        let app = app();
        seed(&app, Phase::Lobby).await;

        let (status, body) = send(&app, form_req("/edit/100", "token=s3cret&night=5&day=")).await;
        assert_eq!(status, StatusCode::OK);

        let result = json(&body);
        assert_eq!(result["ok"], true);
        assert_eq!(result["used_id"], -100);
        assert_eq!(result["night_seconds"], 300);
        assert_eq!(result["day_seconds"], 600);
        assert_eq!(app.repo.find(-100).await.unwrap().unwrap().night_seconds, 300);
    }

    #[tokio::test]
    async fn test_edit_times_rejects_bad_values() {
        let app = app();
        seed(&app, Phase::Lobby).await;

        let (status, body) = send(&app, form_req("/edit/100", "token=s3cret")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"]["message"], "no_values_provided");

        let (status, body) = send(&app, form_req("/edit/100", "token=s3cret&day=mucho")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"]["message"], "invalid_numeric_value");
    }

    #[tokio::test]
    async fn test_update_times_json() {
        let app = app();
        seed(&app, Phase::Lobby).await;

        let request = Request::builder()
            .method("POST")
            .uri("/admin/update_times")
            .header("x-dash-token", TOKEN)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"chat_id": -100, "day_seconds": 30}"#))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let result = json(&body);
        assert_eq!(result["night_seconds"], 300);
        assert_eq!(result["day_seconds"], 120);
    }

    #[tokio::test]
    async fn test_update_times_unknown_game() {
        let app = app();

        let request = Request::builder()
            .method("POST")
            .uri("/admin/update_times")
            .header("x-dash-token", TOKEN)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"chat_id": 9, "night_seconds": 600}"#))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["error"]["queried_id"], 9);
    }

    #[tokio::test]
    async fn test_force_resolve_requires_night() {
        let app = app();
        seed(&app, Phase::Day).await;

        let (status, _) = send(&app, form_req("/force_resolve/100", "token=s3cret")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_lobby() {
        let app = app();
        seed(&app, Phase::Day).await;

        let (status, body) = send(&app, form_req("/reset_lobby/100", "token=s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["chat_id"], -100);

        let stored = app.repo.find(-100).await.unwrap().unwrap();
        assert_eq!(stored.phase, Phase::Lobby);
    }

    #[tokio::test]
    async fn test_resend_role_posts_to_group() {
        let app = app();
        seed(&app, Phase::Night).await;

        let (status, _) = send(&app, get_req("/resend_role/100/2?token=s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.messenger.texts_to(-100).len(), 1);

        let (status, _) = send(&app, get_req("/resend_role/100/42?token=s3cret")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
