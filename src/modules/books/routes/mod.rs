//! HTTP handlers for `/api/books`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use bookstore_http::{AppResult, CurrentUser};
use utoipa::OpenApi;

use super::models::{Book, BookCreate, BookUpdate};
use super::BooksState;
use crate::modules::records;
use crate::utils::{actor, reject_invalid};

#[derive(OpenApi)]
#[openapi(
    paths(list_books, get_book, create_book, update_book, delete_book),
    components(schemas(Book, BookCreate, BookUpdate)),
    tags((name = "Books", description = "Books in the book store"))
)]
pub struct BooksApi;

pub fn router() -> Router<BooksState> {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Books",
    responses(
        (status = 200, description = "List of books", body = [Book]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_books(State(state): State<BooksState>) -> AppResult<Json<Vec<Book>>> {
    tracing::info!("attempted get all books");
    let books = state.books.find_all().await?;
    tracing::info!(count = books.len(), "successfully got all books");
    Ok(Json(books))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Books",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = Book),
        (status = 404, description = "No such book"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_book(State(state): State<BooksState>, Path(id): Path<i64>) -> AppResult<Json<Book>> {
    tracing::info!(id, "attempted get book");
    let book = records::get(state.books.as_ref(), id).await?;
    Ok(Json(book))
}

/// Create a book. An unknown `authorId` or a taken `isbn` is a conflict.
#[utoipa::path(
    post,
    path = "/",
    tag = "Books",
    request_body = BookCreate,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 401, description = "Missing or invalid token"),
        (status = 409, description = "Duplicate isbn or unknown author"),
        (status = 422, description = "Incomplete book data"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_book(
    State(state): State<BooksState>,
    user: Option<Extension<CurrentUser>>,
    Json(payload): Json<BookCreate>,
) -> AppResult<(StatusCode, Json<Book>)> {
    tracing::info!(by = actor(&user), "book submission attempted");
    reject_invalid(payload.validate())?;

    let book = records::create(state.books.as_ref(), payload.into_book()).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Books",
    params(("id" = i64, Path, description = "Book id")),
    request_body = BookUpdate,
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Book updated"),
        (status = 400, description = "Bad or mismatched id"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such book"),
        (status = 409, description = "Duplicate isbn or unknown author"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_book(
    State(state): State<BooksState>,
    Path(id): Path<i64>,
    user: Option<Extension<CurrentUser>>,
    Json(payload): Json<BookUpdate>,
) -> AppResult<StatusCode> {
    tracing::info!(id, by = actor(&user), "book update initialized");
    reject_invalid(payload.validate())?;

    records::update(state.books.as_ref(), id, payload.into_book()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Books",
    params(("id" = i64, Path, description = "Book id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 400, description = "Bad id"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such book"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_book(
    State(state): State<BooksState>,
    Path(id): Path<i64>,
    user: Option<Extension<CurrentUser>>,
) -> AppResult<StatusCode> {
    tracing::info!(id, by = actor(&user), "book delete attempted");
    records::delete(state.books.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
