use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use super::SearchQuery;
use crate::{
    error::{ApiResult, AppError},
    extractors::{Page, Pagination, ValidatedJson},
    filters,
    middleware::{AuthUser, StaffUser},
    models::genre::{Genre, GenreForm, GenrePatch},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/genres", get(list_genres).post(create_genre))
        .route(
            "/genres/{id}",
            get(get_genre)
                .put(update_genre)
                .patch(patch_genre)
                .delete(delete_genre),
        )
}

pub async fn list_genres(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    pagination: Pagination,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Page<Genre>>> {
    let search = filters::search_pattern(params.search.as_deref());
    let (genres, count) = Genre::list(
        &state.db.pool,
        search.as_deref(),
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(pagination.into_page(genres, count)))
}

pub async fn get_genre(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Genre>> {
    let genre = Genre::find(&state.db.pool, id)
        .await?
        .ok_or(AppError::not_found("Genre", id))?;
    Ok(Json(genre))
}

pub async fn create_genre(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    ValidatedJson(form): ValidatedJson<GenreForm>,
) -> ApiResult<(StatusCode, Json<Genre>)> {
    let genre = Genre::create(&state.db.pool, &form).await?;
    tracing::info!("Genre {} created", genre.id);
    Ok((StatusCode::CREATED, Json(genre)))
}

pub async fn update_genre(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<GenreForm>,
) -> ApiResult<Json<Genre>> {
    let genre = Genre::update(&state.db.pool, id, &form)
        .await?
        .ok_or(AppError::not_found("Genre", id))?;
    Ok(Json(genre))
}

pub async fn patch_genre(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(patch): ValidatedJson<GenrePatch>,
) -> ApiResult<Json<Genre>> {
    let current = Genre::find(&state.db.pool, id)
        .await?
        .ok_or(AppError::not_found("Genre", id))?;
    let form = patch.merge(current);
    let genre = Genre::update(&state.db.pool, id, &form)
        .await?
        .ok_or(AppError::not_found("Genre", id))?;
    Ok(Json(genre))
}

pub async fn delete_genre(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !Genre::delete(&state.db.pool, id).await? {
        return Err(AppError::not_found("Genre", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
