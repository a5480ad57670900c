//! Operator dashboard: game listing, phase times and recovery actions
//!
//! Ids in dashboard URLs may carry either sign; group chats are negative but
//! the page links use the absolute value.

use axum::{
    extract::{rejection::FormRejection, Path, State},
    response::Html,
    Form,
};
use tracing::info;
use validator::Validate;

use super::state::AppState;
use super::types::{
    ApiError, EditTimesForm, GameStateResponse, GameView, GamesResponse, Json, OkResponse,
    TimesResponse, UpdateTimesRequest,
};
use crate::domain::{ChatId, DomainError, Game, UserId};
use crate::infrastructure::services::TimesUpdated;

/// `GET /` - HTML overview of every game in memory
pub async fn home(State(state): State<AppState>) -> Html<String> {
    let games = state.games().snapshot().await;
    Html(render_home(&games, &state.dash_token))
}

/// `GET /game/{chat_id}/estado` - public state, roles of the living hidden
pub async fn game_state(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<GameStateResponse>, ApiError> {
    let (used_id, shared) = state
        .games()
        .get_either_sign(chat_id)
        .await?
        .ok_or_else(|| ApiError::not_found("no game").with_queried_id(chat_id))?;

    let game = shared.lock().await;
    Ok(Json(GameStateResponse::new(&game, chat_id, used_id)))
}

/// `GET /admin/list_games`
pub async fn list_games(State(state): State<AppState>) -> Json<GamesResponse> {
    let games = state.games().snapshot().await;

    Json(GamesResponse {
        games: games.iter().map(GameView::from).collect(),
    })
}

/// Minutes from a form field; blank counts as absent
fn parse_minutes(raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    raw.parse::<i64>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .map(Some)
        .ok_or_else(|| ApiError::bad_request("invalid_numeric_value"))
}

fn times_response(updated: TimesUpdated, queried_id: ChatId) -> TimesResponse {
    TimesResponse {
        ok: true,
        chat_id: updated.chat_id,
        queried_id,
        used_id: updated.used_id,
        night_seconds: updated.night_seconds,
        day_seconds: updated.day_seconds,
    }
}

fn for_game(err: DomainError, queried_id: ChatId) -> ApiError {
    ApiError::from(err).with_queried_id(queried_id)
}

/// `POST /edit/{chat_id}` - form with `night` and/or `day` in minutes
pub async fn edit_times(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
    form: Result<Form<EditTimesForm>, FormRejection>,
) -> Result<Json<TimesResponse>, ApiError> {
    let Form(form) = form.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let night = parse_minutes(form.night.as_deref())?;
    let day = parse_minutes(form.day.as_deref())?;
    if night.is_none() && day.is_none() {
        return Err(ApiError::bad_request("no_values_provided"));
    }

    let updated = state
        .engine
        .update_times(chat_id, night, day)
        .await
        .map_err(|e| for_game(e, chat_id))?;

    info!(chat_id = updated.chat_id, "Phase times edited from dashboard");
    Ok(Json(times_response(updated, chat_id)))
}

/// `POST /admin/update_times` - JSON body with seconds
pub async fn update_times(
    State(state): State<AppState>,
    Json(request): Json<UpdateTimesRequest>,
) -> Result<Json<TimesResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let updated = state
        .engine
        .update_times(request.chat_id, request.night_seconds, request.day_seconds)
        .await
        .map_err(|e| for_game(e, request.chat_id))?;

    Ok(Json(times_response(updated, request.chat_id)))
}

/// `POST /force_resolve/{chat_id}` - resolve the night now
pub async fn force_resolve(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<OkResponse>, ApiError> {
    let used_id = state
        .engine
        .force_resolve_night(chat_id)
        .await
        .map_err(|e| for_game(e, chat_id))?;

    Ok(Json(OkResponse {
        ok: true,
        chat_id: used_id,
        used_id,
    }))
}

/// `POST /reset_lobby/{chat_id}`
pub async fn reset_lobby(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<OkResponse>, ApiError> {
    let used_id = state
        .engine
        .reset_to_lobby(chat_id)
        .await
        .map_err(|e| for_game(e, chat_id))?;

    Ok(Json(OkResponse {
        ok: true,
        chat_id: used_id,
        used_id,
    }))
}

/// `GET /resend_role/{chat_id}/{user_id}` - post a role to the group
pub async fn resend_role(
    State(state): State<AppState>,
    Path((chat_id, user_id)): Path<(ChatId, UserId)>,
) -> Result<Json<OkResponse>, ApiError> {
    let used_id = state
        .engine
        .resend_role(chat_id, user_id)
        .await
        .map_err(|e| for_game(e, chat_id))?;

    Ok(Json(OkResponse {
        ok: true,
        chat_id: used_id,
        used_id,
    }))
}

// HTML

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Relative link carrying the token as a query parameter
fn link_with_token(path: &str, token: &str) -> String {
    let base = format!("http://dashboard{}", path);
    match reqwest::Url::parse_with_params(&base, [("token", token)]) {
        Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or_default()),
        Err(_) => path.to_string(),
    }
}

fn token_input(token: &str) -> String {
    format!(
        r#"<input type="hidden" name="token" value="{}">"#,
        escape_html(token)
    )
}

fn render_game(game: &Game, token: &str) -> String {
    let url_id = game.chat_id.unsigned_abs();
    let mut players = String::new();

    for player in game.players.values() {
        let resend = if !player.dm_sent_ok && player.role.is_some() {
            let path = format!("/resend_role/{}/{}", url_id, player.user_id);
            let href = link_with_token(&path, token);
            format!(
                r#" ⚠️ <a href="{}">Reenviar rol al grupo</a>"#,
                escape_html(&href)
            )
        } else {
            String::new()
        };

        players.push_str(&format!(
            "<li>{} - {} - rol: {}{}</li>\n",
            escape_html(&player.name),
            if player.alive { "VIVO" } else { "MUERTO" },
            player.role.map(|r| r.as_str()).unwrap_or("?"),
            resend
        ));
    }

    format!(
        r#"<div style="border:1px solid #ccc;padding:10px;margin:10px;">
<h3>Chat {chat_id} (url id={url_id}) - fase: {phase}</h3>
<p>Host: {host} | Noche: {night}m | Día: {day}m</p>
<ul>
{players}</ul>
<form method="post" action="/edit/{url_id}">
{token}
Night(min): <input name="night" value="{night}">
Day(min): <input name="day" value="{day}">
<input type="submit" value="Actualizar">
</form>
<form method="post" action="/force_resolve/{url_id}">
{token}
<input type="submit" value="Forzar resolución de noche">
</form>
<form method="post" action="/reset_lobby/{url_id}">
{token}
<input type="submit" value="Resetear a Lobby">
</form>
</div>
"#,
        chat_id = game.chat_id,
        url_id = url_id,
        phase = game.phase,
        host = game.host_id,
        night = game.night_seconds / 60,
        day = game.day_seconds / 60,
        players = players,
        token = token_input(token),
    )
}

pub fn render_home(games: &[Game], token: &str) -> String {
    let mut page = String::from(
        "<!doctype html>\n<title>Mafia Dashboard</title>\n<h1>Partidas activas</h1>\n\
         <p>Protegido con token: env MAFIA_DASH_TOKEN</p>\n",
    );

    if games.is_empty() {
        page.push_str("<p>No hay partidas.</p>\n");
    }
    for game in games {
        page.push_str(&render_game(game, token));
    }

    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoleKey;

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes(Some("5")).unwrap(), Some(300));
        assert_eq!(parse_minutes(Some(" 2 ")).unwrap(), Some(120));
        assert_eq!(parse_minutes(Some("")).unwrap(), None);
        assert_eq!(parse_minutes(None).unwrap(), None);
        assert!(parse_minutes(Some("cinco")).is_err());
        assert!(parse_minutes(Some(&i64::MAX.to_string())).is_err());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Ana" & 'Bea'</b>"#),
            "&lt;b&gt;&quot;Ana&quot; &amp; &#39;Bea&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_link_with_token_encodes() {
        assert_eq!(
            link_with_token("/resend_role/5/7", "a+b/c="),
            "/resend_role/5/7?token=a%2Bb%2Fc%3D"
        );
    }

    #[test]
    fn test_render_home_lists_players() {
        let mut game = Game::new(-100, 1);
        game.add_player(1, "<Ana>").unwrap();
        game.add_player(2, "Bea").unwrap();
        game.player_mut(1).unwrap().role = Some(RoleKey::Doctor);
        let bea = game.player_mut(2).unwrap();
        bea.role = Some(RoleKey::Mafioso);
        bea.alive = false;
        bea.dm_sent_ok = true;

        let html = render_home(&[game], "tok");

        assert!(html.contains("Chat -100 (url id=100) - fase: lobby"));
        assert!(html.contains("&lt;Ana&gt; - VIVO - rol: doctor"));
        assert!(html.contains("Bea - MUERTO - rol: mafia</li>"));
        assert!(html.contains(r#"href="/resend_role/100/1?token=tok""#));
        assert!(!html.contains("/resend_role/100/2"));
        assert!(html.contains(r#"action="/edit/100""#));
        assert!(html.contains(r#"value="5""#));
    }

    #[test]
    fn test_render_home_empty() {
        assert!(render_home(&[], "tok").contains("No hay partidas."));
    }
}
