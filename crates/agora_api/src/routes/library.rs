//! `/api/authors`, `/api/books` and `/api/libraries`. Reads are public;
//! writes need a staff token.

use super::{library_service, page_request};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;
use agora_core::model::library::{
    Author, AuthorDetail, AuthorId, Book, BookFilter, BookId, BookInput, BookOrdering, BookPatch,
    Librarian, Library, LibraryDetail, LibraryId,
};
use agora_core::model::page::Page;
use agora_core::{ServiceError, ValidationError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/authors", get(list_authors).post(create_author))
        .route(
            "/authors/{id}",
            get(get_author)
                .put(update_author)
                .patch(update_author)
                .delete(delete_author),
        )
        .route("/books", get(list_books).post(create_book))
        .route("/books/by-author", get(books_by_author))
        .route(
            "/books/{id}",
            get(get_book)
                .put(update_book)
                .patch(update_book)
                .delete(delete_book),
        )
        .route("/libraries", get(list_libraries).post(create_library))
        .route("/libraries/{id}", get(get_library))
        .route("/libraries/{id}/books", post(add_book))
        .route("/libraries/{id}/books/{book_id}", delete(remove_book))
        .route("/libraries/{id}/librarian", put(assign_librarian))
}

#[derive(Debug, Deserialize)]
struct NameBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct HoldingBody {
    book_id: BookId,
}

#[derive(Debug, Default, Deserialize)]
struct BookListParams {
    author_id: Option<AuthorId>,
    title: Option<String>,
    search: Option<String>,
    min_year: Option<i32>,
    max_year: Option<i32>,
    ordering: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

impl BookListParams {
    fn filter(&self) -> Result<BookFilter, ApiError> {
        let ordering = match self.ordering.as_deref() {
            None => BookOrdering::default(),
            Some(value) => BookOrdering::parse(value).ok_or_else(|| {
                ApiError::Service(ServiceError::Validation(ValidationError::new(
                    "ordering",
                    format!("unsupported ordering: {value}"),
                )))
            })?,
        };
        Ok(BookFilter {
            author_id: self.author_id,
            title: non_blank(self.title.as_deref()),
            search: non_blank(self.search.as_deref()),
            min_year: self.min_year,
            max_year: self.max_year,
            ordering,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AuthorNameParams {
    name: String,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

async fn list_authors(State(state): State<AppState>) -> ApiResult<Json<Vec<Author>>> {
    let authors = state
        .run(|conn| library_service(conn)?.list_authors())
        .await?;
    Ok(Json(authors))
}

async fn create_author(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NameBody>,
) -> ApiResult<(StatusCode, Json<Author>)> {
    let author = state
        .run(move |conn| library_service(conn)?.create_author(&user, &body.name))
        .await?;
    Ok((StatusCode::CREATED, Json(author)))
}

async fn get_author(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AuthorId>,
) -> ApiResult<Json<AuthorDetail>> {
    let author = state
        .run(move |conn| library_service(conn)?.get_author(id))
        .await?;
    Ok(Json(author))
}

async fn update_author(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<AuthorId>,
    ApiJson(body): ApiJson<NameBody>,
) -> ApiResult<Json<Author>> {
    let author = state
        .run(move |conn| library_service(conn)?.update_author(&user, id, &body.name))
        .await?;
    Ok(Json(author))
}

async fn delete_author(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<AuthorId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |conn| library_service(conn)?.delete_author(&user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_books(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<BookListParams>,
) -> ApiResult<Json<Page<Book>>> {
    let filter = params.filter()?;
    let page = page_request(params.page, params.page_size);
    let books = state
        .run(move |conn| library_service(conn)?.list_books(&filter, &page))
        .await?;
    Ok(Json(books))
}

async fn books_by_author(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<AuthorNameParams>,
) -> ApiResult<Json<Vec<Book>>> {
    let books = state
        .run(move |conn| library_service(conn)?.books_by_author(&params.name))
        .await?;
    Ok(Json(books))
}

async fn create_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<BookInput>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let book = state
        .run(move |conn| library_service(conn)?.create_book(&user, input))
        .await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn get_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookId>,
) -> ApiResult<Json<Book>> {
    let book = state
        .run(move |conn| library_service(conn)?.get_book(id))
        .await?;
    Ok(Json(book))
}

async fn update_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<BookId>,
    ApiJson(patch): ApiJson<BookPatch>,
) -> ApiResult<Json<Book>> {
    let book = state
        .run(move |conn| library_service(conn)?.update_book(&user, id, patch))
        .await?;
    Ok(Json(book))
}

async fn delete_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<BookId>,
) -> ApiResult<StatusCode> {
    state
        .run(move |conn| library_service(conn)?.delete_book(&user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_libraries(State(state): State<AppState>) -> ApiResult<Json<Vec<Library>>> {
    let libraries = state
        .run(|conn| library_service(conn)?.list_libraries())
        .await?;
    Ok(Json(libraries))
}

async fn create_library(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NameBody>,
) -> ApiResult<(StatusCode, Json<Library>)> {
    let library = state
        .run(move |conn| library_service(conn)?.create_library(&user, &body.name))
        .await?;
    Ok((StatusCode::CREATED, Json(library)))
}

async fn get_library(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<LibraryId>,
) -> ApiResult<Json<LibraryDetail>> {
    let library = state
        .run(move |conn| library_service(conn)?.get_library(id))
        .await?;
    Ok(Json(library))
}

async fn add_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<LibraryId>,
    ApiJson(body): ApiJson<HoldingBody>,
) -> ApiResult<Json<LibraryDetail>> {
    let library = state
        .run(move |conn| library_service(conn)?.add_book(&user, id, body.book_id))
        .await?;
    Ok(Json(library))
}

async fn remove_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((id, book_id)): ApiPath<(LibraryId, BookId)>,
) -> ApiResult<Json<LibraryDetail>> {
    let library = state
        .run(move |conn| library_service(conn)?.remove_book(&user, id, book_id))
        .await?;
    Ok(Json(library))
}

async fn assign_librarian(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<LibraryId>,
    ApiJson(body): ApiJson<NameBody>,
) -> ApiResult<Json<Librarian>> {
    let librarian = state
        .run(move |conn| library_service(conn)?.assign_librarian(&user, id, &body.name))
        .await?;
    Ok(Json(librarian))
}
