use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use readlog_http::error::AppError;
use readlog_kernel::settings::PatchPolicy;

use super::models::{BookBody, BookList, BookRecord, BookUpdate, BookUpdateFinish};
use super::store::{BookStore, StoreError};
use crate::utils;

/// State shared by the books handlers.
#[derive(Clone)]
pub struct BooksState {
    pub store: BookStore,
    pub policy: PatchPolicy,
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::NotFound(_) => AppError::not_found("Book wasn't find. Not on database"),
            StoreError::Conflict(_) => AppError::conflict(message),
            StoreError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

pub async fn list_books(State(state): State<BooksState>) -> Result<Json<BookList>, AppError> {
    let books = state.store.list_all().await?;
    Ok(Json(BookList { books }))
}

pub async fn get_book(
    State(state): State<BooksState>,
    Path(title): Path<String>,
) -> Result<Json<BookRecord>, AppError> {
    let book = state.store.find_by_title(&title).await?;
    Ok(Json(book))
}

pub async fn add_reading(
    State(state): State<BooksState>,
    Json(body): Json<BookBody>,
) -> Result<(StatusCode, Json<&'static str>), AppError> {
    let book = body.into_new_book(state.policy, utils::today()?);
    let created = state.store.create(book).await?;

    tracing::info!(id = created.id, title = %created.title, "reading recorded");
    Ok((StatusCode::CREATED, Json("OK")))
}

pub async fn delete_book(
    State(state): State<BooksState>,
    Path(title): Path<String>,
) -> Result<StatusCode, AppError> {
    let removed = state.store.remove(&title).await?;

    tracing::info!(id = removed.id, title = %removed.title, "reading deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_book(
    State(state): State<BooksState>,
    Path(title): Path<String>,
    Json(patch): Json<BookUpdate>,
) -> Result<StatusCode, AppError> {
    let policy = state.policy;
    let today = utils::today()?;
    let updated = state
        .store
        .modify(&title, |book| book.apply_update(&patch, policy, &today))
        .await?;

    tracing::info!(id = updated.id, title = %updated.title, "reading updated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn finish_book(
    State(state): State<BooksState>,
    Path(title): Path<String>,
    Json(patch): Json<BookUpdateFinish>,
) -> Result<StatusCode, AppError> {
    let policy = state.policy;
    let today = utils::today()?;
    let updated = state
        .store
        .modify(&title, |book| book.apply_finish(&patch, policy, &today))
        .await?;

    tracing::info!(
        id = updated.id,
        title = %updated.title,
        finished = updated.is_finished(),
        score = updated.score,
        "reading finished"
    );
    Ok(StatusCode::NO_CONTENT)
}
