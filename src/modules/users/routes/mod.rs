//! HTTP handlers for `/api/users`.

use axum::{extract::State, routing::post, Json, Router};
use bookstore_auth::LoginOutcome;
use bookstore_http::{AppError, AppResult};
use utoipa::OpenApi;

use super::models::{LoginRequest, TokenResponse};
use super::UsersState;

#[derive(OpenApi)]
#[openapi(
    paths(login),
    components(schemas(LoginRequest, TokenResponse)),
    tags((name = "Users", description = "Authentication"))
)]
pub struct UsersApi;

pub fn router() -> Router<UsersState> {
    Router::new().route("/login", post(login))
}

/// Exchange a username and password for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed bearer token", body = TokenResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login(
    State(state): State<UsersState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    match state.login.login(&request.username, &request.password).await? {
        LoginOutcome::Authenticated(issued) => Ok(Json(issued.into())),
        LoginOutcome::Rejected => Err(AppError::unauthorized("Invalid username or password")),
    }
}
