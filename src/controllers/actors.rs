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
    models::actor::{Actor, ActorForm, ActorPatch},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/actors", get(list_actors).post(create_actor))
        .route(
            "/actors/{id}",
            get(get_actor)
                .put(update_actor)
                .patch(patch_actor)
                .delete(delete_actor),
        )
}

/// `?search=` matches first or last name.
pub async fn list_actors(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    pagination: Pagination,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Page<Actor>>> {
    let search = filters::search_pattern(params.search.as_deref());
    let (actors, count) = Actor::list(
        &state.db.pool,
        search.as_deref(),
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    Ok(Json(pagination.into_page(actors, count)))
}

pub async fn get_actor(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Actor>> {
    Actor::find(&state.db.pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Actor", id))
}

pub async fn create_actor(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    ValidatedJson(form): ValidatedJson<ActorForm>,
) -> ApiResult<(StatusCode, Json<Actor>)> {
    let actor = Actor::create(&state.db.pool, &form).await?;
    tracing::info!("Actor {} ({}) created", actor.id, actor.full_name());
    Ok((StatusCode::CREATED, Json(actor)))
}

pub async fn update_actor(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(form): ValidatedJson<ActorForm>,
) -> ApiResult<Json<Actor>> {
    Actor::update(&state.db.pool, id, &form)
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Actor", id))
}

pub async fn patch_actor(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidatedJson(patch): ValidatedJson<ActorPatch>,
) -> ApiResult<Json<Actor>> {
    let current = Actor::find(&state.db.pool, id)
        .await?
        .ok_or(AppError::not_found("Actor", id))?;
    Actor::update(&state.db.pool, id, &patch.merge(current))
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Actor", id))
}

pub async fn delete_actor(
    State(state): State<Arc<AppState>>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    match Actor::delete(&state.db.pool, id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(AppError::not_found("Actor", id)),
    }
}
