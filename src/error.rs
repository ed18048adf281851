use anyhow::anyhow;
use reqwest::StatusCode;
use serde_json::Value;

/// Error payload returned by the platform, e.g.
/// `{"message":"invalid_token","error":"not_found","status":401,"cause":[]}`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<u16>,
    #[serde(default)]
    pub(crate) cause: Vec<Value>,
}

/// Builds the error for a non-success response. Status and raw body are always part of the message.
pub(crate) fn format_api_error(status: StatusCode, url: &str, body: &str) -> anyhow::Error {
    let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
    let Some(e) = parsed else {
        return anyhow!("HTTP {} at {} - body: {}", status.as_u16(), url, body);
    };

    let message = e.message.as_deref().unwrap_or("");
    let code = e.error.as_deref().unwrap_or("");
    let status_in_body = e.status.unwrap_or(status.as_u16());
    let cause = if e.cause.is_empty() {
        String::new()
    } else {
        format!(
            "\ncause: {}",
            e.cause.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
        )
    };

    if code == "invalid_grant" {
        return anyhow!(
            "Token refresh rejected (HTTP {}): the refresh token is expired, revoked or was already used.\n- Authorize the application again and store the new ML_REFRESH_TOKEN in your .env\n\nServer message: {}{}\nrequest: {}\nbody: {}",
            status_in_body,
            message,
            cause,
            url,
            body
        );
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "Authentication/authorization failed (HTTP {}).\n- Check ML_CLIENT_ID / ML_CLIENT_SECRET in your .env\n- Make sure the order or pack belongs to the seller that authorized the application\n\nServer message: {} ({}){}\nrequest: {}\nbody: {}",
            status_in_body,
            message,
            code,
            cause,
            url,
            body
        );
    }

    anyhow!(
        "HTTP {} at {} - {} ({}){}\nbody: {}",
        status_in_body,
        url,
        message,
        code,
        cause,
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_body_keeps_status_and_body() {
        let err = format_api_error(StatusCode::BAD_GATEWAY, "https://api.test/x", "upstream down");
        let s = err.to_string();
        assert!(s.contains("HTTP 502"), "{s}");
        assert!(s.contains("upstream down"), "{s}");
        assert!(s.contains("https://api.test/x"), "{s}");
    }

    #[test]
    fn invalid_grant_explains_refresh_token() {
        let body = r#"{"message":"invalid_grant","error":"invalid_grant","status":400,"cause":[]}"#;
        let s = format_api_error(StatusCode::BAD_REQUEST, "https://api.test/oauth/token", body)
            .to_string();
        assert!(s.contains("refresh token"), "{s}");
        assert!(s.contains("HTTP 400"), "{s}");
        assert!(s.contains(body), "{s}");
    }

    #[test]
    fn unauthorized_includes_hint_and_body() {
        let body = r#"{"message":"invalid access token","error":"unauthorized","status":401,"cause":["expired"]}"#;
        let s = format_api_error(StatusCode::UNAUTHORIZED, "https://api.test/orders/1", body)
            .to_string();
        assert!(s.contains("HTTP 401"), "{s}");
        assert!(s.contains("invalid access token"), "{s}");
        assert!(s.contains("\"expired\""), "{s}");
        assert!(s.contains(body), "{s}");
    }

    #[test]
    fn not_found_payload_is_generic() {
        let body = r#"{"message":"Order not found","error":"not_found","status":404}"#;
        let s = format_api_error(StatusCode::NOT_FOUND, "https://api.test/orders/1", body)
            .to_string();
        assert!(s.starts_with("HTTP 404 at https://api.test/orders/1 - Order not found (not_found)"), "{s}");
    }
}
