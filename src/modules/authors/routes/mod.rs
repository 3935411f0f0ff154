//! HTTP handlers for `/api/authors`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bookshelf_db::Database;
use bookshelf_http::error::AppError;

use super::models::{AuthorDto, AuthorId, BookDto, BookId};
use super::service::{AuthorService, BookService};
use crate::utils;

/// Services shared by every handler of the module.
#[derive(Clone)]
pub struct AuthorsState {
    pub authors: AuthorService,
    pub books: BookService,
}

impl AuthorsState {
    pub fn new(db: &Database) -> Self {
        Self {
            authors: AuthorService::new(db.clone()),
            books: BookService::new(db.clone()),
        }
    }
}

/// Routes relative to the module mount point.
pub fn router(state: AuthorsState) -> Router {
    tracing::debug!(target: "project.routes", prefix = %utils::log_prefix("authors"), "registering routes");

    Router::new()
        .route("/", get(list_authors).post(create_author))
        .route("/health", get(health_check))
        .route("/{id}", get(get_author).delete(delete_author))
        .route(
            "/{id}/books",
            get(list_books_for_author).post(create_book_for_author),
        )
        .route("/{id}/books/{book_id}", get(get_book_for_author))
        .with_state(state)
}

fn author_not_found(id: AuthorId) -> AppError {
    AppError::not_found(format!("Author with id: '{id}' not found!"))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "authors module is healthy"
}

async fn get_author(
    State(state): State<AuthorsState>,
    path: Result<Path<AuthorId>, PathRejection>,
) -> Result<Json<AuthorDto>, AppError> {
    let Path(id) = path?;
    let author = state
        .authors
        .find_by_id(id)
        .await?
        .ok_or_else(|| author_not_found(id))?;

    Ok(Json(author))
}

async fn list_authors(State(state): State<AuthorsState>) -> Result<Json<Vec<AuthorDto>>, AppError> {
    Ok(Json(state.authors.find_all().await?))
}

async fn create_author(
    State(state): State<AuthorsState>,
    payload: Result<Json<AuthorDto>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(dto) = payload?;
    if dto.id.is_some() {
        return Err(AppError::bad_request(
            "Inserting ID with POST request is not allowed!",
        ));
    }

    let author = state.authors.save(dto).await?;
    let location = format!("/api/authors/{}", author.id.unwrap_or_default());

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(author),
    ))
}

async fn delete_author(
    State(state): State<AuthorsState>,
    path: Result<Path<AuthorId>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    if state.authors.delete_by_id(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(author_not_found(id))
    }
}

async fn list_books_for_author(
    State(state): State<AuthorsState>,
    path: Result<Path<AuthorId>, PathRejection>,
) -> Result<Json<Vec<BookDto>>, AppError> {
    let Path(id) = path?;
    Ok(Json(state.books.find_all_books_for_author_with_id(id).await?))
}

async fn create_book_for_author(
    State(state): State<AuthorsState>,
    path: Result<Path<AuthorId>, PathRejection>,
    payload: Result<Json<BookDto>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let Json(dto) = payload?;
    if dto.id.is_some() {
        return Err(AppError::bad_request(
            "Inserting ID with POST request is not allowed!",
        ));
    }

    let book = state
        .books
        .save_book_for_author_with_id(dto, id)
        .await?
        .ok_or_else(|| author_not_found(id))?;
    let location = format!("/api/authors/{id}/books/{}", book.id.unwrap_or_default());

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(book),
    ))
}

async fn get_book_for_author(
    State(state): State<AuthorsState>,
    path: Result<Path<(AuthorId, BookId)>, PathRejection>,
) -> Result<Json<BookDto>, AppError> {
    let Path((id, book_id)) = path?;
    let book = state
        .books
        .find_book_for_author(id, book_id)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!(
                "Book with id: '{book_id}' not found for author '{id}'!"
            ))
        })?;

    Ok(Json(book))
}
