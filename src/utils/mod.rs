//! Small helpers shared by the HTTP handlers.

use axum::Extension;
use bookstore_http::{AppError, AppResult, CurrentUser};

/// Identifiers are store-assigned and start at 1.
pub fn validate_id(id: i64) -> AppResult<()> {
    if id < 1 {
        return Err(AppError::bad_request(format!("invalid id {id}")));
    }
    Ok(())
}

/// Subject of the caller, for log lines. `anonymous` when writes are not
/// guarded.
pub fn actor(user: &Option<Extension<CurrentUser>>) -> &str {
    match user {
        Some(Extension(CurrentUser(claims))) => &claims.sub,
        None => "anonymous",
    }
}

/// Reject a payload whose validation produced any findings.
pub fn reject_invalid(details: Vec<serde_json::Value>) -> AppResult<()> {
    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(details, "request data was incomplete"))
    }
}
