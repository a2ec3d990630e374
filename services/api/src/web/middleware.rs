//! services/api/src/web/middleware.rs
//!
//! Identifies the caller on every protected route.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};

pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller's identity, placed in request extensions by [`require_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Middleware that reads the `x-user-id` header.
///
/// Identity is established upstream; this only rejects requests that carry none
/// with 400 Bad Request.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, (StatusCode, String)> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("{} header is required", USER_ID_HEADER),
            )
        })?;

    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}
