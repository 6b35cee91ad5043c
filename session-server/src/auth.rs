// session-server/src/auth.rs
use actix_web::{HttpRequest, HttpResponse};
use common::validate_session_token;
use serde_json::json;
use uuid::Uuid;

/// Check the request carries the wallet-bound token issued when the
/// session was opened. Returns the wallet address on success so
/// handlers can log it.
pub fn authorize_session(
    req: &HttpRequest,
    secret: &[u8],
    session_id: Uuid,
) -> Result<String, HttpResponse> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok());

    let Some(token) = header.and_then(|value| value.strip_prefix("Bearer ")) else {
        tracing::warn!("Request for session {} without bearer token", session_id);
        return Err(HttpResponse::Unauthorized().json(json!({
            "error": "Missing session token"
        })));
    };

    match validate_session_token(token, secret) {
        Ok((token_session, wallet)) if token_session == session_id => Ok(wallet),
        Ok((token_session, _)) => {
            tracing::warn!(
                "Session token mismatch: token for {}, request for {}",
                token_session,
                session_id
            );
            Err(HttpResponse::Forbidden().json(json!({
                "error": "Token does not match session"
            })))
        }
        Err(e) => {
            tracing::warn!("Invalid session token for {}: {}", session_id, e);
            Err(HttpResponse::Unauthorized().json(json!({
                "error": "Invalid session token"
            })))
        }
    }
}
