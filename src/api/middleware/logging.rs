//! Request logging with the dashboard token redacted

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Uri},
    middleware::Next,
    response::Response,
};
use tracing::info;

/// Log each request and its outcome.
/// `TraceLayer` already opens the span; this only adds events.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = redact_uri(request.uri());
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    info!(method = %method, path = %path, uri = %uri, "Incoming request");

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

/// Path and query with any `token` value replaced
fn redact_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let redacted: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if name.eq_ignore_ascii_case("token") => {
                format!("{}=[REDACTED]", name)
            }
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), redacted.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_uri() {
        let uri: Uri = "/edit/5?token=abc&x=1".parse().unwrap();
        assert_eq!(redact_uri(&uri), "/edit/5?token=[REDACTED]&x=1");

        let uri: Uri = "/game/5/estado".parse().unwrap();
        assert_eq!(redact_uri(&uri), "/game/5/estado");

        let uri: Uri = "/?flag".parse().unwrap();
        assert_eq!(redact_uri(&uri), "/?flag");
    }
}
