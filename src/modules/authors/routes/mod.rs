//! HTTP handlers for `/api/authors`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use bookstore_http::{AppResult, CurrentUser};
use utoipa::OpenApi;

use super::models::{Author, AuthorCreate, AuthorUpdate};
use super::AuthorsState;
use crate::modules::books::models::Book;
use crate::modules::records;
use crate::utils::{actor, reject_invalid};

#[derive(OpenApi)]
#[openapi(
    paths(list_authors, get_author, create_author, update_author, delete_author),
    components(schemas(Author, AuthorCreate, AuthorUpdate, Book)),
    tags((name = "Authors", description = "Authors in the book store"))
)]
pub struct AuthorsApi;

pub fn router() -> Router<AuthorsState> {
    Router::new()
        .route("/", get(list_authors).post(create_author))
        .route(
            "/{id}",
            get(get_author).put(update_author).delete(delete_author),
        )
}

/// Get all authors
#[utoipa::path(
    get,
    path = "/",
    tag = "Authors",
    responses(
        (status = 200, description = "List of authors", body = [Author]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_authors(State(state): State<AuthorsState>) -> AppResult<Json<Vec<Author>>> {
    tracing::info!("attempted get all authors");
    let authors = state.authors.find_all().await?;
    tracing::info!(count = authors.len(), "successfully got all authors");
    Ok(Json(authors))
}

/// Get a single author, with their books
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Authors",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "The author", body = Author),
        (status = 404, description = "No such author"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_author(
    State(state): State<AuthorsState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Author>> {
    tracing::info!(id, "attempted get author");
    let mut author = records::get(state.authors.as_ref(), id).await?;
    author.books = state.books.find_by("author_id", Some(id).into()).await?;
    tracing::info!(id, books = author.books.len(), "successfully got author");
    Ok(Json(author))
}

/// Create an author
#[utoipa::path(
    post,
    path = "/",
    tag = "Authors",
    request_body = AuthorCreate,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 401, description = "Missing or invalid token"),
        (status = 409, description = "Nothing was written"),
        (status = 422, description = "Incomplete author data"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_author(
    State(state): State<AuthorsState>,
    user: Option<Extension<CurrentUser>>,
    Json(payload): Json<AuthorCreate>,
) -> AppResult<(StatusCode, Json<Author>)> {
    tracing::info!(by = actor(&user), "author submission attempted");
    reject_invalid(payload.validate())?;

    let author = records::create(state.authors.as_ref(), payload.into_author()).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// Replace an author
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Authors",
    params(("id" = i64, Path, description = "Author id")),
    request_body = AuthorUpdate,
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Author updated"),
        (status = 400, description = "Bad or mismatched id"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such author"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_author(
    State(state): State<AuthorsState>,
    Path(id): Path<i64>,
    user: Option<Extension<CurrentUser>>,
    Json(payload): Json<AuthorUpdate>,
) -> AppResult<StatusCode> {
    tracing::info!(id, by = actor(&user), "author update initialized");
    reject_invalid(payload.validate())?;

    records::update(state.authors.as_ref(), id, payload.into_author()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an author. Refused while books still reference them.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Authors",
    params(("id" = i64, Path, description = "Author id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Author deleted"),
        (status = 400, description = "Bad id"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such author"),
        (status = 409, description = "Author still has books"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_author(
    State(state): State<AuthorsState>,
    Path(id): Path<i64>,
    user: Option<Extension<CurrentUser>>,
) -> AppResult<StatusCode> {
    tracing::info!(id, by = actor(&user), "author delete attempted");
    records::delete(state.authors.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
