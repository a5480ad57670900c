//! Dashboard token check
//!
//! The token is read from, in order: the `token` query parameter, a `token`
//! form field, the `X-DASH-TOKEN` header and the `Authorization` header
//! (with or without `Bearer `). Surrounding quotes are ignored.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Query, State},
    http::{header, HeaderMap, Method, Request, Uri},
    middleware::Next,
    response::Response,
    Form,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;

const MAX_FORM_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Deserialize)]
struct TokenField {
    #[serde(default)]
    token: Option<String>,
}

/// Strip a `Bearer ` prefix, whitespace and one pair of matching quotes
pub fn clean_token(raw: &str) -> Option<String> {
    let raw = raw.strip_prefix("Bearer ").unwrap_or(raw);
    let trimmed = raw.trim();

    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);

    (!unquoted.is_empty()).then(|| unquoted.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn query_token(uri: &Uri) -> Option<String> {
    let Query(field) = Query::<TokenField>::try_from_uri(uri).ok()?;
    non_empty(field.token)
}

async fn form_token(bytes: &Bytes) -> Option<String> {
    let request = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(bytes.clone()))
        .ok()?;

    let Form(field) = Form::<TokenField>::from_request(request, &()).await.ok()?;
    non_empty(field.token)
}

fn header_token(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Reject requests that do not carry the dashboard token
pub async fn dash_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let mut supplied = query_token(&parts.uri);

    let body = if is_form(&parts.headers) {
        let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
            .await
            .map_err(|_| ApiError::bad_request("Form body too large"))?;
        if supplied.is_none() {
            supplied = form_token(&bytes).await;
        }
        Body::from(bytes)
    } else {
        body
    };

    let supplied = supplied
        .or_else(|| header_token(&parts.headers, "x-dash-token"))
        .or_else(|| header_token(&parts.headers, header::AUTHORIZATION))
        .and_then(|raw| clean_token(&raw));

    if supplied.as_deref() != Some(&*state.dash_token) {
        warn!(
            path = %parts.uri.path(),
            token_present = supplied.is_some(),
            "Dashboard request rejected"
        );
        return Err(ApiError::unauthorized("Unauthorized"));
    }

    debug!(path = %parts.uri.path(), "Dashboard request authorized");
    Ok(next.run(Request::from_parts(parts, body)).await)
}
