use axum::http::HeaderMap;

pub fn actor_of(headers: &HeaderMap) -> String {
    headers
        .get("X-Actor")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

pub fn correlation_id_of(headers: &HeaderMap) -> Option<String> {
    headers.get("X-Correlation-Id").and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}
